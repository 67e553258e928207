//! Patch corrective evaluation.
//!
//! Per patch and per frame: restrict the pose, evaluate the RBF kernel
//! layer, interpolate into the subspace and expand to a displacement field.
//! The expansion branches once on the rig's [`CorrectiveType`]; the three
//! variants are free functions behind a single `match`, since the set is
//! closed and the branch sits outside the hot loops.
//!
//! Displacement layouts:
//! - FullSpace / EigenSkin: interleaved `[x y z | x y z | ..]` per
//!   influenced vertex;
//! - TensorSkin: planar `[x.. | y.. | z..]`, one plane per axis, with the
//!   basis row stride as the plane stride.

use sinew_rig::{CorrectiveType, Patch};

use crate::backend::Backend;
use crate::kernels;

/// Per-patch mutable scratch, owned by the session and reused every frame.
/// Patches only ever touch their own scratch, which is what makes the
/// correctives stage trivially parallel across patches.
#[derive(Debug, Clone)]
pub(crate) struct PatchScratch {
    /// Restricted weighted pose, length = local pose dimension.
    pub local: Vec<f32>,
    /// Kernel outputs over the padded stride plus the bias slot.
    pub phi: Vec<f32>,
    /// Subspace coefficients (or the displacement itself for FullSpace).
    pub sub: Vec<f32>,
    /// Expanded displacement for EigenSkin/TensorSkin.
    pub disp: Vec<f32>,
    /// Plane stride of the planar tensor layout (0 otherwise).
    pub plane_stride: usize,
}

impl PatchScratch {
    pub fn for_patch(ty: CorrectiveType, patch: &Patch) -> Self {
        if patch.is_degenerate() {
            return Self {
                local: Vec::new(),
                phi: Vec::new(),
                sub: Vec::new(),
                disp: Vec::new(),
                plane_stride: 0,
            };
        }
        let basis_stride = patch.basis.as_ref().map_or(0, |b| b.stride());
        let (disp_len, plane_stride) = match ty {
            CorrectiveType::FullSpace => (0, 0),
            CorrectiveType::EigenSkin => (basis_stride, 0),
            CorrectiveType::TensorSkin => (3 * basis_stride, basis_stride),
        };
        Self {
            local: vec![0.0; patch.local_dim()],
            phi: vec![0.0; patch.centers.stride() + 1],
            sub: vec![0.0; patch.rbf_coeffs.stride()],
            disp: vec![0.0; disp_len],
            plane_stride,
        }
    }

    /// The patch's displacement series in its native layout.
    #[inline]
    pub fn displacement(&self, ty: CorrectiveType) -> &[f32] {
        match ty {
            CorrectiveType::FullSpace => &self.sub,
            CorrectiveType::EigenSkin | CorrectiveType::TensorSkin => &self.disp,
        }
    }
}

/// Evaluate one patch's corrective displacement into its scratch.
///
/// Degenerate patches (zero kernels) are skipped; their scratch stays
/// all-zero, so they contribute nothing anywhere downstream.
pub(crate) fn evaluate_patch(
    backend: Backend,
    ty: CorrectiveType,
    patch: &Patch,
    pose: &[f32],
    scratch: &mut PatchScratch,
) {
    if patch.is_degenerate() {
        return;
    }

    // 1. Restricted weighted pose.
    for (i, local) in scratch.local.iter_mut().enumerate() {
        let p = pose[patch.pose_indices[i] as usize];
        *local = patch.pose_scale[i] * p + patch.pose_shift[i];
    }

    // 2. Kernel layer: stabilized distances, per-kernel scale, bias slot.
    kernels::kernel_distances(
        backend,
        &patch.centers,
        &patch.center_scale,
        &scratch.local,
        &mut scratch.phi,
    );
    let k = patch.num_kernels();
    for (phi, &scale) in scratch.phi[..k].iter_mut().zip(&patch.kernel_scale) {
        *phi *= scale;
    }
    scratch.phi[k] = patch.kernel_scale[k];

    // 3. RBF interpolation into the subspace.
    kernels::matvec_i16(backend, &patch.rbf_coeffs, &scratch.phi, &mut scratch.sub);
    for (s, &scale) in scratch.sub.iter_mut().zip(&patch.coeff_scale) {
        *s *= scale;
    }

    // 4. Expansion.
    match ty {
        CorrectiveType::FullSpace => {
            // The subspace vector is the interleaved displacement.
        }
        CorrectiveType::EigenSkin => {
            let Some(basis) = patch.basis.as_ref() else {
                return;
            };
            kernels::matvec_i8_strided(backend, basis, &scratch.sub, 0, 1, &mut scratch.disp);
            for (d, &scale) in scratch.disp.iter_mut().zip(&patch.vertex_scale) {
                *d *= scale;
            }
        }
        CorrectiveType::TensorSkin => {
            let Some(basis) = patch.basis.as_ref() else {
                return;
            };
            let plane = basis.stride();
            for axis in 0..3 {
                let out = &mut scratch.disp[axis * plane..(axis + 1) * plane];
                kernels::matvec_i8_strided(backend, basis, &scratch.sub, axis, 3, out);
                for (d, &scale) in out.iter_mut().zip(&patch.vertex_scale) {
                    *d *= scale;
                }
            }
        }
    }
}

/// Fused accumulation for the single-worker TensorSkin path: scatter a
/// patch's planar displacement straight into the shared shape buffer.
///
/// This performs unsynchronized scattered writes and is only sound when at
/// most one worker runs the pipeline; the parallel policy never calls it.
pub(crate) fn scatter_add_tensor(patch: &Patch, scratch: &PatchScratch, shape: &mut [f32]) {
    let plane = scratch.plane_stride;
    for (li, &v) in patch.vertices.iter().enumerate() {
        let base = 3 * v as usize;
        shape[base] += scratch.disp[li];
        shape[base + 1] += scratch.disp[plane + li];
        shape[base + 2] += scratch.disp[2 * plane + li];
    }
}
