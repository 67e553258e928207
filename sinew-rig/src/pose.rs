//! Pose vector assembly.
//!
//! A pose vector is the concatenation of the rig's extra scalar parameters
//! followed by per-joint local transforms, each flattened as 3 rows x 4
//! columns in column-major order:
//!
//! ```text
//! [extra_0 .. extra_{e-1} | joint_0 (12 floats) | joint_1 (12 floats) | ..]
//! ```
//!
//! The engine works in a right-handed convention; joint transforms supplied
//! in the conventional left-handed skeletal convention are mirrored across
//! the YZ plane here, at the boundary, so the rest of the pipeline never
//! sees handedness.

use crate::matrix::JointMatrix;

/// Number of pose-vector entries per joint (3x4 column-major transform).
pub const JOINT_POSE_STRIDE: usize = 12;

/// Dense pose vector consumed by the corrective evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseVector {
    values: Vec<f32>,
    num_extras: usize,
}

impl PoseVector {
    /// Create a zeroed pose vector for the given layout.
    pub fn new(num_extras: usize, num_joints: usize) -> Self {
        Self {
            values: vec![0.0; num_extras + num_joints * JOINT_POSE_STRIDE],
            num_extras,
        }
    }

    /// Assemble a pose from extra parameters and left-handed joint local
    /// transforms. The handedness flip is applied here.
    pub fn from_parts(extras: &[f32], local_joints: &[JointMatrix]) -> Self {
        let mut pose = Self::new(extras.len(), local_joints.len());
        pose.values[..extras.len()].copy_from_slice(extras);
        for (j, m) in local_joints.iter().enumerate() {
            pose.write_joint(j, m);
        }
        pose
    }

    /// Overwrite one extra parameter.
    #[inline]
    pub fn set_extra(&mut self, index: usize, value: f32) {
        debug_assert!(index < self.num_extras);
        self.values[index] = value;
    }

    /// Overwrite one joint's local transform (left-handed input; the
    /// handedness flip is applied here).
    pub fn set_joint(&mut self, joint: usize, local: &JointMatrix) {
        self.write_joint(joint, local);
    }

    fn write_joint(&mut self, joint: usize, local: &JointMatrix) {
        let flipped = local.flip_handedness();
        let base = self.num_extras + joint * JOINT_POSE_STRIDE;
        self.values[base..base + JOINT_POSE_STRIDE].copy_from_slice(&flipped.to_cols_array());
    }

    /// Total pose length.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the pose holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of leading extra parameters.
    #[inline]
    pub fn num_extras(&self) -> usize {
        self.num_extras
    }

    /// Number of joints encoded after the extras.
    #[inline]
    pub fn num_joints(&self) -> usize {
        (self.values.len() - self.num_extras) / JOINT_POSE_STRIDE
    }

    /// Flat pose values in evaluation order.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Pose length for a rig layout.
#[inline]
pub const fn pose_len(num_extras: usize, num_joints: usize) -> usize {
    num_extras + num_joints * JOINT_POSE_STRIDE
}
