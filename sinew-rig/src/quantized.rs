//! Quantized matrix storage.
//!
//! Rig data (kernel centers, RBF coefficients, reduced bases) is stored as
//! column-major matrices of 8- or 16-bit signed integers with a leading
//! dimension (`stride`) padded to the SIMD lane width. Values are
//! decompressed on the fly by multiplying with externally supplied per-row
//! or per-column scale factors; there is no global quantization constant.
//!
//! # Layout
//! ```text
//! element (r, c) = data[c * stride + r]
//! stride >= rows, stride % lane_width == 0
//! data[c * stride + r] == 0 for all r in rows..stride (padding rows)
//! ```
//!
//! The zero-padding requirement lets batched kernels run over the full
//! stride without masking the tail.

use bytemuck::Pod;

use crate::error::RigError;

/// Signed integer scalar usable as quantized matrix storage.
pub trait QuantScalar: Pod + Copy + PartialEq + Send + Sync + 'static {
    /// Smallest representable value, as f32.
    const MIN_F32: f32;
    /// Largest representable value, as f32.
    const MAX_F32: f32;

    /// Widen to f32 (exact for both i8 and i16).
    fn to_f32(self) -> f32;

    /// Round-to-nearest conversion from f32, saturating at the type's range.
    fn from_f32_saturating(value: f32) -> Self;

    /// Zero value.
    fn zero() -> Self;
}

impl QuantScalar for i8 {
    const MIN_F32: f32 = i8::MIN as f32;
    const MAX_F32: f32 = i8::MAX as f32;

    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }

    #[inline]
    fn from_f32_saturating(value: f32) -> Self {
        value.round().clamp(Self::MIN_F32, Self::MAX_F32) as i8
    }

    #[inline]
    fn zero() -> Self {
        0
    }
}

impl QuantScalar for i16 {
    const MIN_F32: f32 = i16::MIN as f32;
    const MAX_F32: f32 = i16::MAX as f32;

    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }

    #[inline]
    fn from_f32_saturating(value: f32) -> Self {
        value.round().clamp(Self::MIN_F32, Self::MAX_F32) as i16
    }

    #[inline]
    fn zero() -> Self {
        0
    }
}

/// Decompress a quantized value with its scale factor.
#[inline]
pub fn dequantize<T: QuantScalar>(value: T, scale: f32) -> f32 {
    value.to_f32() * scale
}

/// Compress a value to the quantized representation (round-to-nearest,
/// saturating). `scale` is the same factor later passed to [`dequantize`].
#[inline]
pub fn quantize<T: QuantScalar>(value: f32, scale: f32) -> T {
    T::from_f32_saturating(value / scale)
}

/// Column-major quantized matrix with a padded leading dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantMatrix<T> {
    rows: usize,
    cols: usize,
    stride: usize,
    data: Vec<T>,
}

impl<T: QuantScalar> QuantMatrix<T> {
    /// Create a matrix from raw column-major storage.
    ///
    /// Validates the stride/length relationship and the zero-padding
    /// requirement. Stride *alignment* to a specific lane width is checked
    /// later, when a rig is bound to a compute backend, via
    /// [`QuantMatrix::check_lane_alignment`].
    pub fn new(
        rows: usize,
        cols: usize,
        stride: usize,
        data: Vec<T>,
        context: &'static str,
    ) -> Result<Self, RigError> {
        if stride < rows {
            return Err(RigError::StrideTooSmall {
                context,
                stride,
                rows,
            });
        }
        if data.len() != stride * cols {
            return Err(RigError::BadDataLength {
                context,
                len: data.len(),
                stride,
                cols,
            });
        }
        for c in 0..cols {
            for r in rows..stride {
                if data[c * stride + r] != T::zero() {
                    return Err(RigError::NonZeroPadding {
                        context,
                        row: r,
                        col: c,
                    });
                }
            }
        }
        Ok(Self {
            rows,
            cols,
            stride,
            data,
        })
    }

    /// Create an empty matrix (zero rows and columns). Used for degenerate
    /// patches, which are valid but contribute nothing.
    pub fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            stride: 0,
            data: Vec::new(),
        }
    }

    /// Quantize a dense column-major f32 matrix, padding the leading
    /// dimension to `stride`. The scale for element `(r, c)` is produced by
    /// `scale_of(r, c)` and must match the scale used at decompression.
    pub fn from_f32(
        values: &[f32],
        rows: usize,
        cols: usize,
        stride: usize,
        mut scale_of: impl FnMut(usize, usize) -> f32,
        context: &'static str,
    ) -> Result<Self, RigError> {
        if values.len() != rows * cols {
            return Err(RigError::BadDataLength {
                context,
                len: values.len(),
                stride: rows,
                cols,
            });
        }
        let mut data = vec![T::zero(); stride * cols];
        for c in 0..cols {
            for r in 0..rows {
                data[c * stride + r] = quantize(values[c * rows + r], scale_of(r, c));
            }
        }
        Self::new(rows, cols, stride, data, context)
    }

    /// Number of logical rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Leading dimension (padded row count).
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw column-major storage, length `stride * cols`.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// One full column including padding rows, length `stride`.
    #[inline]
    pub fn col(&self, c: usize) -> &[T] {
        &self.data[c * self.stride..(c + 1) * self.stride]
    }

    /// Element access (row, column).
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> T {
        self.data[c * self.stride + r]
    }

    /// True when the matrix holds no data at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Check that the stride is compatible with a backend batching `lanes`
    /// scalars at a time. Empty matrices are trivially aligned.
    pub fn check_lane_alignment(
        &self,
        lanes: usize,
        context: &'static str,
    ) -> Result<(), RigError> {
        if !self.is_empty() && self.stride % lanes != 0 {
            return Err(RigError::MisalignedStride {
                context,
                stride: self.stride,
                lanes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let m = QuantMatrix::<i8>::new(3, 2, 4, vec![1, 2, 3, 0, 4, 5, 6, 0], "test").unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.stride(), 4);
        assert_eq!(m.get(0, 0), 1);
        assert_eq!(m.get(2, 1), 6);
        assert_eq!(m.col(1), &[4, 5, 6, 0]);
    }

    #[test]
    fn test_new_rejects_short_stride() {
        let err = QuantMatrix::<i8>::new(5, 1, 4, vec![0; 4], "test").unwrap_err();
        assert!(matches!(err, RigError::StrideTooSmall { stride: 4, rows: 5, .. }));
    }

    #[test]
    fn test_new_rejects_bad_length() {
        let err = QuantMatrix::<i8>::new(3, 2, 4, vec![0; 7], "test").unwrap_err();
        assert!(matches!(err, RigError::BadDataLength { len: 7, .. }));
    }

    #[test]
    fn test_new_rejects_nonzero_padding() {
        let err = QuantMatrix::<i8>::new(3, 1, 4, vec![1, 2, 3, 9], "test").unwrap_err();
        assert!(matches!(err, RigError::NonZeroPadding { row: 3, col: 0, .. }));
    }

    #[test]
    fn test_lane_alignment() {
        let m = QuantMatrix::<i8>::new(3, 1, 8, vec![1, 2, 3, 0, 0, 0, 0, 0], "test").unwrap();
        assert!(m.check_lane_alignment(4, "test").is_ok());
        assert!(m.check_lane_alignment(8, "test").is_ok());

        let m = QuantMatrix::<i8>::new(3, 1, 4, vec![1, 2, 3, 0], "test").unwrap();
        assert!(m.check_lane_alignment(4, "test").is_ok());
        assert!(matches!(
            m.check_lane_alignment(8, "test"),
            Err(RigError::MisalignedStride { stride: 4, lanes: 8, .. })
        ));
    }

    #[test]
    fn test_quantize_roundtrip_i8() {
        // Every representable i8 value must survive dequantize -> quantize.
        let scale = 0.037_f32;
        for raw in i8::MIN..=i8::MAX {
            let value = dequantize(raw, scale);
            let back: i8 = quantize(value, scale);
            assert_eq!(back, raw, "roundtrip failed for {raw}");
        }
    }

    #[test]
    fn test_quantize_roundtrip_i16() {
        let scale = 1.7e-4_f32;
        for raw in (i16::MIN..=i16::MAX).step_by(17) {
            let value = dequantize(raw, scale);
            let back: i16 = quantize(value, scale);
            assert_eq!(back, raw, "roundtrip failed for {raw}");
        }
    }

    #[test]
    fn test_quantize_saturates() {
        let q: i8 = quantize(1000.0, 1.0);
        assert_eq!(q, i8::MAX);
        let q: i8 = quantize(-1000.0, 1.0);
        assert_eq!(q, i8::MIN);
    }

    #[test]
    fn test_from_f32_pads_and_quantizes() {
        // 2x2 dense values, padded to stride 4.
        let m = QuantMatrix::<i8>::from_f32(
            &[1.0, -2.0, 3.0, -4.0],
            2,
            2,
            4,
            |_, _| 1.0,
            "test",
        )
        .unwrap();
        assert_eq!(m.col(0), &[1, -2, 0, 0]);
        assert_eq!(m.col(1), &[3, -4, 0, 0]);
    }
}
