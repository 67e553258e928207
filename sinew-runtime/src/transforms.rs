//! Relative joint transforms.
//!
//! World-space joint transforms are converted to transforms relative to
//! the precomputed rest pose: `relative = world * rest_pose_inverse`,
//! composed homogeneously and truncated back to 3x4. Pure and stateless
//! per joint, which makes it the natural unit of parallelism for this
//! stage.

use glam::Affine3A;
use sinew_rig::JointMatrix;

/// Compute `relative[j] = world[j] * rest_inverse[j]` for every joint.
///
/// `out` must have one slot per joint; existing contents are overwritten.
pub(crate) fn compute_relative(
    world: &[JointMatrix],
    rest_inverse: &[JointMatrix],
    out: &mut [Affine3A],
) {
    for ((rel, w), inv) in out.iter_mut().zip(world).zip(rest_inverse) {
        *rel = relative_transform(w, inv);
    }
}

/// Single-joint relative transform.
#[inline]
pub(crate) fn relative_transform(world: &JointMatrix, rest_inverse: &JointMatrix) -> Affine3A {
    world.to_affine() * rest_inverse.to_affine()
}
