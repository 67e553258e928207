//! The immutable rig asset.
//!
//! A `RigAsset` is built once from externally decoded data and validated in
//! full at construction; after that it is read-only and can be shared
//! (`Arc`) between deformation sessions. Decoding from any on-disk format
//! is a collaborator's responsibility, so the constructor takes plain Rust
//! values.

use hashbrown::HashMap;

use crate::error::RigError;
use crate::matrix::JointMatrix;
use crate::patch::{CorrectiveType, Patch};
use crate::pose::{self, PoseVector};
use crate::skinning::SkinningData;

/// Raw rig description handed to [`RigAsset::new`].
#[derive(Debug, Clone)]
pub struct RigData {
    /// Rest shape, flat xyz triples (length `3 * vertex_count`).
    pub rest_shape: Vec<f32>,
    /// Rest local joint transforms, one per joint.
    pub rest_local: Vec<JointMatrix>,
    /// Rest world joint transforms, one per joint.
    pub rest_world: Vec<JointMatrix>,
    /// Joint names, one per joint.
    pub joint_names: Vec<String>,
    /// Rest values for the extra scalar pose parameters.
    pub rest_extras: Vec<f32>,
    /// Ordered corrective patches.
    pub patches: Vec<Patch>,
    /// Skinning block.
    pub skinning: SkinningData,
    /// Correctives representation shared by every patch.
    pub corrective_type: CorrectiveType,
}

/// Immutable description of a character rig.
#[derive(Debug, Clone)]
pub struct RigAsset {
    rest_shape: Vec<f32>,
    rest_local: Vec<JointMatrix>,
    rest_world: Vec<JointMatrix>,
    joint_names: Vec<String>,
    name_to_joint: HashMap<String, u16>,
    rest_extras: Vec<f32>,
    patches: Vec<Patch>,
    skinning: SkinningData,
    corrective_type: CorrectiveType,
}

impl RigAsset {
    /// Validate and freeze a rig description.
    ///
    /// This performs every setup-time check the runtime depends on: joint
    /// array consistency, patch shape invariants, vertex/pose index ranges
    /// and weight structure. A rig that passes here runs without per-frame
    /// data errors.
    pub fn new(data: RigData) -> Result<Self, RigError> {
        if data.rest_shape.len() % 3 != 0 {
            return Err(RigError::RigShapeMismatch {
                context: "rest shape length (must be a multiple of 3)",
                expected: data.rest_shape.len() / 3 * 3,
                actual: data.rest_shape.len(),
            });
        }
        let vertex_count = data.rest_shape.len() / 3;
        let joint_count = data.rest_local.len();

        check_rig("rest world transform count", joint_count, data.rest_world.len())?;
        check_rig("joint name count", joint_count, data.joint_names.len())?;
        check_rig(
            "rest-pose-inverse count",
            joint_count,
            data.skinning.rest_inverse.len(),
        )?;
        check_rig(
            "skinning weight columns",
            vertex_count,
            data.skinning.weights.vertex_count(),
        )?;
        if joint_count > usize::from(u16::MAX) {
            return Err(RigError::RigShapeMismatch {
                context: "joint count (must fit in u16)",
                expected: usize::from(u16::MAX),
                actual: joint_count,
            });
        }

        let pose_len = pose::pose_len(data.rest_extras.len(), joint_count);
        for (i, patch) in data.patches.iter().enumerate() {
            patch.validate(data.corrective_type, i)?;
            for &v in &patch.vertices {
                if v as usize >= vertex_count {
                    return Err(RigError::PatchVertexOutOfRange {
                        patch: i,
                        index: v,
                        vertex_count,
                    });
                }
            }
            for &p in &patch.pose_indices {
                if p as usize >= pose_len {
                    return Err(RigError::PatchPoseIndexOutOfRange {
                        patch: i,
                        index: p,
                        pose_len,
                    });
                }
            }
        }

        let name_to_joint = data
            .joint_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u16))
            .collect();

        Ok(Self {
            rest_shape: data.rest_shape,
            rest_local: data.rest_local,
            rest_world: data.rest_world,
            joint_names: data.joint_names,
            name_to_joint,
            rest_extras: data.rest_extras,
            patches: data.patches,
            skinning: data.skinning,
            corrective_type: data.corrective_type,
        })
    }

    /// Number of rig vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.rest_shape.len() / 3
    }

    /// Number of joints.
    #[inline]
    pub fn joint_count(&self) -> usize {
        self.rest_local.len()
    }

    /// Declared pose-vector length for this rig.
    #[inline]
    pub fn pose_len(&self) -> usize {
        pose::pose_len(self.rest_extras.len(), self.joint_count())
    }

    /// Rest shape as flat xyz triples.
    #[inline]
    pub fn rest_shape(&self) -> &[f32] {
        &self.rest_shape
    }

    /// Rest local joint transforms.
    #[inline]
    pub fn rest_local(&self) -> &[JointMatrix] {
        &self.rest_local
    }

    /// Rest world joint transforms.
    #[inline]
    pub fn rest_world(&self) -> &[JointMatrix] {
        &self.rest_world
    }

    /// Joint names in joint order.
    #[inline]
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    /// Look up a joint index by name.
    #[inline]
    pub fn joint_index(&self, name: &str) -> Option<u16> {
        self.name_to_joint.get(name).copied()
    }

    /// Rest values of the extra pose parameters.
    #[inline]
    pub fn rest_extras(&self) -> &[f32] {
        &self.rest_extras
    }

    /// Ordered corrective patches.
    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Skinning block.
    #[inline]
    pub fn skinning(&self) -> &SkinningData {
        &self.skinning
    }

    /// Correctives representation shared by every patch.
    #[inline]
    pub fn corrective_type(&self) -> CorrectiveType {
        self.corrective_type
    }

    /// Assemble the rest pose (rest extras + rest local transforms).
    pub fn rest_pose(&self) -> PoseVector {
        PoseVector::from_parts(&self.rest_extras, &self.rest_local)
    }
}

fn check_rig(context: &'static str, expected: usize, actual: usize) -> Result<(), RigError> {
    if expected != actual {
        return Err(RigError::RigShapeMismatch {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skinning::VertexWeights;

    fn minimal_rig_data() -> RigData {
        RigData {
            rest_shape: vec![0.0; 6],
            rest_local: vec![JointMatrix::IDENTITY],
            rest_world: vec![JointMatrix::IDENTITY],
            joint_names: vec!["root".to_string()],
            rest_extras: vec![0.0],
            patches: Vec::new(),
            skinning: SkinningData {
                rest_inverse: vec![JointMatrix::IDENTITY],
                weights: VertexWeights::new(vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0], 1)
                    .unwrap(),
            },
            corrective_type: CorrectiveType::FullSpace,
        }
    }

    #[test]
    fn test_minimal_rig() {
        let rig = RigAsset::new(minimal_rig_data()).unwrap();
        assert_eq!(rig.vertex_count(), 2);
        assert_eq!(rig.joint_count(), 1);
        assert_eq!(rig.pose_len(), 13);
        assert_eq!(rig.joint_index("root"), Some(0));
        assert_eq!(rig.joint_index("missing"), None);
        assert_eq!(rig.rest_pose().len(), 13);
    }

    #[test]
    fn test_rejects_joint_count_mismatch() {
        let mut data = minimal_rig_data();
        data.rest_world.clear();
        let err = RigAsset::new(data).unwrap_err();
        assert!(matches!(err, RigError::RigShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_weight_column_mismatch() {
        let mut data = minimal_rig_data();
        data.skinning.weights =
            VertexWeights::new(vec![0, 1], vec![0], vec![1.0], 1).unwrap();
        let err = RigAsset::new(data).unwrap_err();
        assert!(matches!(err, RigError::RigShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_ragged_rest_shape() {
        let mut data = minimal_rig_data();
        data.rest_shape.push(1.0);
        let err = RigAsset::new(data).unwrap_err();
        assert!(matches!(err, RigError::RigShapeMismatch { .. }));
    }
}
