//! Corrective patches.
//!
//! A patch is one localized corrective unit: it reads a restricted slice of
//! the pose vector, evaluates an RBF kernel layer against quantized kernel
//! centers, interpolates into a low-dimensional subspace, and expands that
//! subspace into displacements for the subset of rig vertices it influences.
//!
//! All three quantized matrices store the batched dimension in rows:
//!
//! ```text
//! centers     (i8)  - rows = kernels,        cols = restricted pose length
//! rbf_coeffs  (i16) - rows = output dim,     cols = kernels + 1 (bias)
//! basis       (i8)  - rows = output scalars, cols = subspace dim
//! ```

use crate::error::RigError;
use crate::quantized::QuantMatrix;

/// Correctives representation used by a rig.
///
/// A closed set: evaluation dispatches on this once per patch with a plain
/// `match`, not virtual dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectiveType {
    /// The RBF interpolation output is the displacement itself
    /// (interleaved XYZ per vertex); no reduced basis.
    FullSpace,
    /// RBF output is a subspace coefficient vector; one reduced-basis
    /// product yields the interleaved displacement series.
    EigenSkin,
    /// Subspace coefficients come in per-axis triples; three independent
    /// basis products produce a planar XXX..YYY..ZZZ layout.
    TensorSkin,
}

/// One corrective unit of a rig.
#[derive(Debug, Clone)]
pub struct Patch {
    /// Rig-vertex indices this patch influences.
    pub vertices: Vec<u32>,
    /// Pose-vector indices forming the restricted local pose.
    pub pose_indices: Vec<u32>,
    /// Per-entry scale applied to the selected pose values.
    pub pose_scale: Vec<f32>,
    /// Per-entry shift applied after scaling.
    pub pose_shift: Vec<f32>,
    /// Quantized kernel centers, rows = kernels, cols = restricted pose dim.
    pub centers: QuantMatrix<i8>,
    /// Dequantization scale per restricted-pose dimension (centers column).
    pub center_scale: Vec<f32>,
    /// Per-kernel output scale, length `kernels + 1`; the final entry is the
    /// constant bias term of phi.
    pub kernel_scale: Vec<f32>,
    /// Quantized RBF coefficients, rows = output dim, cols = kernels + 1.
    pub rbf_coeffs: QuantMatrix<i16>,
    /// Per-row output scale for the RBF interpolation.
    pub coeff_scale: Vec<f32>,
    /// Quantized reduced basis (absent for FullSpace).
    pub basis: Option<QuantMatrix<i8>>,
    /// Per-row output scale for the basis expansion (empty for FullSpace).
    pub vertex_scale: Vec<f32>,
}

impl Patch {
    /// Number of RBF kernels (zero for a degenerate patch).
    #[inline]
    pub fn num_kernels(&self) -> usize {
        self.centers.rows()
    }

    /// Restricted local pose dimension.
    #[inline]
    pub fn local_dim(&self) -> usize {
        self.pose_indices.len()
    }

    /// RBF interpolation output dimension (subspace dimension, or the full
    /// displacement length for FullSpace).
    #[inline]
    pub fn subspace_dim(&self) -> usize {
        self.rbf_coeffs.rows()
    }

    /// Number of influenced vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// A patch with zero kernel rows is a valid no-op and is skipped by the
    /// evaluator without error.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.num_kernels() == 0
    }

    /// Validate shape invariants against the rig's corrective type.
    pub fn validate(&self, ty: CorrectiveType, patch: usize) -> Result<(), RigError> {
        if self.is_degenerate() {
            log::debug!("patch {patch} has zero kernels, will be skipped at runtime");
            return Ok(());
        }

        let d = self.local_dim();
        check(patch, "pose_scale length", d, self.pose_scale.len())?;
        check(patch, "pose_shift length", d, self.pose_shift.len())?;
        check(patch, "kernel-center columns", d, self.centers.cols())?;
        check(patch, "center_scale length", d, self.center_scale.len())?;

        let k = self.num_kernels();
        check(patch, "kernel_scale length", k + 1, self.kernel_scale.len())?;
        check(patch, "rbf-coefficient columns", k + 1, self.rbf_coeffs.cols())?;

        let m = self.subspace_dim();
        check(patch, "coeff_scale length", m, self.coeff_scale.len())?;

        let nv = self.vertex_count();
        match ty {
            CorrectiveType::FullSpace => {
                check(patch, "full-space output rows", 3 * nv, m)?;
                if self.basis.is_some() {
                    return Err(RigError::PatchShapeMismatch {
                        patch,
                        context: "full-space basis (must be absent)",
                        expected: 0,
                        actual: 1,
                    });
                }
            }
            CorrectiveType::EigenSkin => {
                let basis = self.require_basis(patch)?;
                check(patch, "eigen basis columns", m, basis.cols())?;
                check(patch, "eigen basis rows", 3 * nv, basis.rows())?;
                check(patch, "vertex_scale length", 3 * nv, self.vertex_scale.len())?;
            }
            CorrectiveType::TensorSkin => {
                let basis = self.require_basis(patch)?;
                check(patch, "tensor subspace rows", 3 * basis.cols(), m)?;
                check(patch, "tensor basis rows", nv, basis.rows())?;
                check(patch, "vertex_scale length", nv, self.vertex_scale.len())?;
            }
        }
        Ok(())
    }

    fn require_basis(&self, patch: usize) -> Result<&QuantMatrix<i8>, RigError> {
        self.basis.as_ref().ok_or(RigError::PatchShapeMismatch {
            patch,
            context: "reduced basis (must be present)",
            expected: 1,
            actual: 0,
        })
    }
}

fn check(
    patch: usize,
    context: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), RigError> {
    if expected != actual {
        return Err(RigError::PatchShapeMismatch {
            patch,
            context,
            expected,
            actual,
        });
    }
    Ok(())
}
