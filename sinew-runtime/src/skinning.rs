//! Linear blend skinning.
//!
//! For each vertex, the relative joint transforms are blended by the
//! vertex's sparse weight run into one affine transform, which is then
//! applied to the corrected pre-skinning position. Data-parallel over
//! vertices; weight sums are not normalized here (a mismatched sum simply
//! scales the result, by contract).

use glam::{Affine3A, Mat3A, Vec3A};
use sinew_rig::VertexWeights;

/// Skin a contiguous vertex range. `shape` and `out` are the xyz
/// sub-slices for exactly that range.
pub(crate) fn skin_range(
    weights: &VertexWeights,
    relative: &[Affine3A],
    first_vertex: usize,
    shape: &[f32],
    out: &mut [f32],
) {
    for (i, (src, dst)) in shape.chunks_exact(3).zip(out.chunks_exact_mut(3)).enumerate() {
        let vertex = first_vertex + i;
        let (joints, vertex_weights) = weights.influences(vertex);

        let mut matrix = Mat3A::ZERO;
        let mut translation = Vec3A::ZERO;
        for (&joint, &weight) in joints.iter().zip(vertex_weights) {
            let rel = &relative[usize::from(joint)];
            matrix += rel.matrix3 * weight;
            translation += rel.translation * weight;
        }

        let p = Vec3A::new(src[0], src[1], src[2]);
        let skinned = matrix * p + translation;
        dst[0] = skinned.x;
        dst[1] = skinned.y;
        dst[2] = skinned.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use sinew_rig::VertexWeights;

    #[test]
    fn test_identity_transform_weight_one_is_noop() {
        let weights = VertexWeights::new(vec![0, 1], vec![0], vec![1.0], 1).unwrap();
        let relative = [Affine3A::IDENTITY];
        let shape = [1.5, -2.5, 3.5];
        let mut out = [0.0; 3];
        skin_range(&weights, &relative, 0, &shape, &mut out);
        assert_eq!(out, shape);
    }

    #[test]
    fn test_two_joint_blend() {
        // Two translations blended 50/50.
        let weights =
            VertexWeights::new(vec![0, 2], vec![0, 1], vec![0.5, 0.5], 2).unwrap();
        let relative = [
            Affine3A::from_translation(Vec3::new(2.0, 0.0, 0.0)),
            Affine3A::from_translation(Vec3::new(0.0, 4.0, 0.0)),
        ];
        let shape = [1.0, 1.0, 1.0];
        let mut out = [0.0; 3];
        skin_range(&weights, &relative, 0, &shape, &mut out);
        assert_eq!(out, [2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_output_linear_in_weights() {
        // Scaling every weight of a vertex scales the whole output affine,
        // hence the output point, by the same factor.
        let relative = [
            Affine3A::from_rotation_translation(
                glam::Quat::from_rotation_y(0.3),
                Vec3::new(0.5, 0.0, -1.0),
            ),
            Affine3A::from_translation(Vec3::new(0.0, 2.0, 0.0)),
        ];
        let shape = [0.7, -0.3, 1.1];

        let base =
            VertexWeights::new(vec![0, 2], vec![0, 1], vec![0.6, 0.4], 2).unwrap();
        let scaled =
            VertexWeights::new(vec![0, 2], vec![0, 1], vec![1.2, 0.8], 2).unwrap();

        let mut out_base = [0.0; 3];
        let mut out_scaled = [0.0; 3];
        skin_range(&base, &relative, 0, &shape, &mut out_base);
        skin_range(&scaled, &relative, 0, &shape, &mut out_scaled);

        for axis in 0..3 {
            assert!(
                (out_scaled[axis] - 2.0 * out_base[axis]).abs() < 1e-5,
                "axis {axis}: {} vs {}",
                out_scaled[axis],
                out_base[axis]
            );
        }
    }

    #[test]
    fn test_vertex_without_influences_collapses_to_origin() {
        // No influences means a zero blended transform; the output is the
        // zero point, not the input. Rigs that want identity must say so
        // with weights.
        let weights = VertexWeights::new(vec![0, 0], vec![], vec![], 1).unwrap();
        let relative = [Affine3A::IDENTITY];
        let shape = [5.0, 6.0, 7.0];
        let mut out = [9.0; 3];
        skin_range(&weights, &relative, 0, &shape, &mut out);
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }
}
