//! AVX2 + FMA kernels.
//!
//! Processes 8 f32 lanes per step over the padded stride; callers guarantee
//! `stride % 8 == 0` (validated when a rig is bound to the Avx2 backend).
//! Distances use the hardware `rsqrt` approximation, keeping the ~1e-3
//! relative error the engine accepts for throughput.

use std::arch::x86_64::*;

use sinew_rig::QuantMatrix;

use super::DISTANCE_EPSILON;

/// Load 8 i8 values and widen to f32 lanes.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load_i8x8_ps(ptr: *const i8) -> __m256 {
    unsafe {
        let raw = _mm_loadl_epi64(ptr.cast());
        _mm256_cvtepi32_ps(_mm256_cvtepi8_epi32(raw))
    }
}

/// Load 8 i16 values and widen to f32 lanes.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load_i16x8_ps(ptr: *const i16) -> __m256 {
    unsafe {
        let raw = _mm_loadu_si128(ptr.cast());
        _mm256_cvtepi32_ps(_mm256_cvtepi16_epi32(raw))
    }
}

/// # Safety
/// Requires avx2+fma and `centers.stride() % 8 == 0`; `dist` must cover the
/// stride, `center_scale`/`local` must cover `centers.cols()`.
#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn kernel_distances(
    centers: &QuantMatrix<i8>,
    center_scale: &[f32],
    local: &[f32],
    dist: &mut [f32],
) {
    let stride = centers.stride();
    debug_assert_eq!(stride % 8, 0);
    debug_assert!(dist.len() >= stride);

    unsafe {
        let zero = _mm256_setzero_ps();
        for r in (0..stride).step_by(8) {
            _mm256_storeu_ps(dist.as_mut_ptr().add(r), zero);
        }

        for c in 0..centers.cols() {
            let col = centers.col(c).as_ptr();
            let lv = _mm256_set1_ps(local[c]);
            let sc = _mm256_set1_ps(center_scale[c]);
            for r in (0..stride).step_by(8) {
                let q = load_i8x8_ps(col.add(r));
                // d = local - scale * center
                let d = _mm256_fnmadd_ps(sc, q, lv);
                let acc = _mm256_loadu_ps(dist.as_ptr().add(r));
                let acc = _mm256_fmadd_ps(d, d, acc);
                _mm256_storeu_ps(dist.as_mut_ptr().add(r), acc);
            }
        }

        // dist = x * rsqrt(x + eps); exact zero stays zero.
        let eps = _mm256_set1_ps(DISTANCE_EPSILON);
        for r in (0..stride).step_by(8) {
            let x = _mm256_loadu_ps(dist.as_ptr().add(r));
            let rs = _mm256_rsqrt_ps(_mm256_add_ps(x, eps));
            _mm256_storeu_ps(dist.as_mut_ptr().add(r), _mm256_mul_ps(x, rs));
        }
    }
}

/// # Safety
/// Requires avx2+fma and `mat.stride() % 8 == 0`; `x` must cover
/// `mat.cols()`, `out` the stride.
#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn matvec_i16(mat: &QuantMatrix<i16>, x: &[f32], out: &mut [f32]) {
    let stride = mat.stride();
    debug_assert_eq!(stride % 8, 0);
    debug_assert!(out.len() >= stride);

    unsafe {
        let zero = _mm256_setzero_ps();
        for r in (0..stride).step_by(8) {
            _mm256_storeu_ps(out.as_mut_ptr().add(r), zero);
        }
        for c in 0..mat.cols() {
            let col = mat.col(c).as_ptr();
            let xv = _mm256_set1_ps(x[c]);
            for r in (0..stride).step_by(8) {
                let q = load_i16x8_ps(col.add(r));
                let acc = _mm256_loadu_ps(out.as_ptr().add(r));
                let acc = _mm256_fmadd_ps(q, xv, acc);
                _mm256_storeu_ps(out.as_mut_ptr().add(r), acc);
            }
        }
    }
}

/// # Safety
/// Requires avx2+fma and `mat.stride() % 8 == 0`; the gather
/// `x[x_base + c * x_step]` must be in bounds for every column, `out` must
/// cover the stride.
#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn matvec_i8_strided(
    mat: &QuantMatrix<i8>,
    x: &[f32],
    x_base: usize,
    x_step: usize,
    out: &mut [f32],
) {
    let stride = mat.stride();
    debug_assert_eq!(stride % 8, 0);
    debug_assert!(out.len() >= stride);

    unsafe {
        let zero = _mm256_setzero_ps();
        for r in (0..stride).step_by(8) {
            _mm256_storeu_ps(out.as_mut_ptr().add(r), zero);
        }
        for c in 0..mat.cols() {
            let col = mat.col(c).as_ptr();
            let xv = _mm256_set1_ps(x[x_base + c * x_step]);
            for r in (0..stride).step_by(8) {
                let q = load_i8x8_ps(col.add(r));
                let acc = _mm256_loadu_ps(out.as_ptr().add(r));
                let acc = _mm256_fmadd_ps(q, xv, acc);
                _mm256_storeu_ps(out.as_mut_ptr().add(r), acc);
            }
        }
    }
}
