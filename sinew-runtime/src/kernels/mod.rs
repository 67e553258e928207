//! Quantized compute kernels.
//!
//! Three primitives cover every hot loop of the corrective evaluator:
//!
//! - squared-distance accumulation against i8 kernel centers, finished with
//!   the stabilized square root;
//! - an i16 matrix-vector product (RBF interpolation);
//! - an i8 matrix-vector product with a strided input gather (reduced-basis
//!   expansion; the stride handles the per-axis tensor layout).
//!
//! All kernels run over the full padded stride of their matrix and write
//! raw, unscaled accumulations; per-row output scales are applied by the
//! caller over the logical rows only. Padding rows hold zero data, so the
//! extra lanes are harmless.
//!
//! Dispatch happens on [`Backend`], selected once at deformer creation.

use sinew_rig::QuantMatrix;

use crate::backend::Backend;

mod scalar;

#[cfg(target_arch = "x86_64")]
mod avx2;

/// Stabilizer for the reciprocal-square-root distance identity
/// `dist = x * rsqrt(x + eps)`.
///
/// Small enough (<= 1e-37) that no legitimate nonzero distance collapses,
/// while a true zero distance stays exactly zero instead of dividing by
/// zero. Kept just above the smallest normal f32: hardware rsqrt flushes
/// subnormal inputs to zero, which would turn the zero-distance case into
/// `0 * inf`.
pub const DISTANCE_EPSILON: f32 = 1.5e-38;

/// Accumulate squared distances between the restricted pose `local` and
/// every dequantized kernel center, then apply the stabilized square root.
///
/// `dist[r] = sqrt*( sum_c (local[c] - center_scale[c] * centers[r, c])^2 )`
/// for all `r` in `0..stride`. `dist` must be at least `stride` long.
pub fn kernel_distances(
    backend: Backend,
    centers: &QuantMatrix<i8>,
    center_scale: &[f32],
    local: &[f32],
    dist: &mut [f32],
) {
    match backend {
        Backend::Scalar => scalar::kernel_distances(centers, center_scale, local, dist),
        #[cfg(target_arch = "x86_64")]
        // Safety: deformer construction rejects the Avx2 backend on CPUs
        // without avx2+fma, and rejects strides not padded to 8 lanes.
        Backend::Avx2 => unsafe { avx2::kernel_distances(centers, center_scale, local, dist) },
        #[cfg(not(target_arch = "x86_64"))]
        Backend::Avx2 => unreachable!("AVX2 backend on non-x86_64 target"),
    }
}

/// Raw i16 matrix-vector product: `out[r] = sum_c mat[r, c] * x[c]` for all
/// `r` in `0..stride`. `x` must cover `mat.cols()`, `out` at least `stride`.
pub fn matvec_i16(backend: Backend, mat: &QuantMatrix<i16>, x: &[f32], out: &mut [f32]) {
    match backend {
        Backend::Scalar => scalar::matvec_i16(mat, x, out),
        #[cfg(target_arch = "x86_64")]
        // Safety: see kernel_distances.
        Backend::Avx2 => unsafe { avx2::matvec_i16(mat, x, out) },
        #[cfg(not(target_arch = "x86_64"))]
        Backend::Avx2 => unreachable!("AVX2 backend on non-x86_64 target"),
    }
}

/// Raw i8 matrix-vector product with a strided input gather:
/// `out[r] = sum_c mat[r, c] * x[x_base + c * x_step]`.
///
/// `x_step = 1, x_base = 0` is the plain product; the tensor expansion uses
/// `x_step = 3` with `x_base` selecting the axis.
pub fn matvec_i8_strided(
    backend: Backend,
    mat: &QuantMatrix<i8>,
    x: &[f32],
    x_base: usize,
    x_step: usize,
    out: &mut [f32],
) {
    match backend {
        Backend::Scalar => scalar::matvec_i8_strided(mat, x, x_base, x_step, out),
        #[cfg(target_arch = "x86_64")]
        // Safety: see kernel_distances.
        Backend::Avx2 => unsafe { avx2::matvec_i8_strided(mat, x, x_base, x_step, out) },
        #[cfg(not(target_arch = "x86_64"))]
        Backend::Avx2 => unreachable!("AVX2 backend on non-x86_64 target"),
    }
}
