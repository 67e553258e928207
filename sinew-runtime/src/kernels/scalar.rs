//! Portable scalar kernels.
//!
//! Same contracts as the AVX2 path; the stabilized square root uses an
//! exact reciprocal square root, so this path is the numeric reference.

use sinew_rig::QuantMatrix;

use super::DISTANCE_EPSILON;

/// `x * rsqrt(x + eps)`: zero at exactly zero, ~sqrt(x) everywhere else.
#[inline]
fn stabilized_sqrt(x: f32) -> f32 {
    x / (x + DISTANCE_EPSILON).sqrt()
}

pub fn kernel_distances(
    centers: &QuantMatrix<i8>,
    center_scale: &[f32],
    local: &[f32],
    dist: &mut [f32],
) {
    let stride = centers.stride();
    let dist = &mut dist[..stride];
    dist.fill(0.0);
    for c in 0..centers.cols() {
        let col = centers.col(c);
        let scale = center_scale[c];
        let lv = local[c];
        for (acc, &q) in dist.iter_mut().zip(col) {
            let d = lv - scale * f32::from(q);
            *acc += d * d;
        }
    }
    for acc in dist.iter_mut() {
        *acc = stabilized_sqrt(*acc);
    }
}

pub fn matvec_i16(mat: &QuantMatrix<i16>, x: &[f32], out: &mut [f32]) {
    let stride = mat.stride();
    let out = &mut out[..stride];
    out.fill(0.0);
    for c in 0..mat.cols() {
        let col = mat.col(c);
        let xv = x[c];
        for (acc, &q) in out.iter_mut().zip(col) {
            *acc += f32::from(q) * xv;
        }
    }
}

pub fn matvec_i8_strided(
    mat: &QuantMatrix<i8>,
    x: &[f32],
    x_base: usize,
    x_step: usize,
    out: &mut [f32],
) {
    let stride = mat.stride();
    let out = &mut out[..stride];
    out.fill(0.0);
    for c in 0..mat.cols() {
        let col = mat.col(c);
        let xv = x[x_base + c * x_step];
        for (acc, &q) in out.iter_mut().zip(col) {
            *acc += f32::from(q) * xv;
        }
    }
}
