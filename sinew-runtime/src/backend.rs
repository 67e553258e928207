//! Compute backend selection.
//!
//! The quantized kernels exist in two implementations behind one interface:
//! a portable scalar fallback and an AVX2 path. The backend is chosen once,
//! from detected hardware capability, when a deformer is created - never
//! per element at runtime.

/// Quantized-kernel implementation to run a rig with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Portable scalar implementation; requires strides padded to 4 lanes.
    Scalar,
    /// AVX2 + FMA implementation; requires strides padded to 8 lanes and
    /// uses the hardware reciprocal-square-root approximation (~1e-3
    /// relative error) for kernel distances.
    Avx2,
}

impl Backend {
    /// Pick the widest backend the current CPU supports.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::arch::is_x86_feature_detected!("avx2")
                && std::arch::is_x86_feature_detected!("fma")
            {
                return Backend::Avx2;
            }
        }
        Backend::Scalar
    }

    /// True when this backend can run on the current CPU.
    pub fn is_supported(self) -> bool {
        match self {
            Backend::Scalar => true,
            Backend::Avx2 => Self::detect() == Backend::Avx2,
        }
    }

    /// Number of f32 lanes processed per batch; quantized-matrix strides
    /// must be a multiple of this.
    #[inline]
    pub fn lanes(self) -> usize {
        match self {
            Backend::Scalar => 4,
            Backend::Avx2 => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes() {
        assert_eq!(Backend::Scalar.lanes(), 4);
        assert_eq!(Backend::Avx2.lanes(), 8);
    }

    #[test]
    fn test_scalar_always_supported() {
        assert!(Backend::Scalar.is_supported());
    }

    #[test]
    fn test_detect_is_supported() {
        assert!(Backend::detect().is_supported());
    }
}
