//! Sparse skinning weights and rest-pose data.
//!
//! Weights are column-compressed: columns are vertices, rows are joints.
//! Each vertex owns a contiguous run of (joint, weight) pairs. Weight sums
//! near 1 are conventional but not enforced; a mismatched sum simply scales
//! the skinned displacement.

use crate::error::RigError;
use crate::matrix::JointMatrix;

/// Column-compressed sparse skinning weight matrix.
#[derive(Debug, Clone)]
pub struct VertexWeights {
    /// Per-vertex run boundaries, length `vertex_count + 1`.
    offsets: Vec<u32>,
    /// Influencing joints, concatenated per vertex.
    joints: Vec<u16>,
    /// Weights parallel to `joints`.
    weights: Vec<f32>,
}

impl VertexWeights {
    /// Build from raw compressed-column storage, validating structure.
    pub fn new(
        offsets: Vec<u32>,
        joints: Vec<u16>,
        weights: Vec<f32>,
        joint_count: usize,
    ) -> Result<Self, RigError> {
        if offsets.is_empty() {
            return Err(RigError::InvalidWeights {
                reason: "offsets array is empty".to_string(),
            });
        }
        if offsets[0] != 0 {
            return Err(RigError::InvalidWeights {
                reason: format!("offsets must start at 0, got {}", offsets[0]),
            });
        }
        if !offsets.is_sorted() {
            return Err(RigError::InvalidWeights {
                reason: "offsets are not monotonically non-decreasing".to_string(),
            });
        }
        let total = *offsets.last().unwrap() as usize;
        if joints.len() != total || weights.len() != total {
            return Err(RigError::InvalidWeights {
                reason: format!(
                    "offsets end at {total} but joints has {} and weights has {} entries",
                    joints.len(),
                    weights.len()
                ),
            });
        }
        for &j in &joints {
            if usize::from(j) >= joint_count {
                return Err(RigError::WeightJointOutOfRange {
                    index: j,
                    joint_count,
                });
            }
        }
        Ok(Self {
            offsets,
            joints,
            weights,
        })
    }

    /// Number of vertex columns.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// The (joints, weights) run influencing `vertex`.
    #[inline]
    pub fn influences(&self, vertex: usize) -> (&[u16], &[f32]) {
        let start = self.offsets[vertex] as usize;
        let end = self.offsets[vertex + 1] as usize;
        (&self.joints[start..end], &self.weights[start..end])
    }

    /// Total number of stored (joint, weight) pairs.
    #[inline]
    pub fn influence_count(&self) -> usize {
        self.joints.len()
    }
}

/// Skinning block of a rig: rest-pose-inverse joint matrices plus the
/// sparse weight matrix.
#[derive(Debug, Clone)]
pub struct SkinningData {
    /// One 3x4 rest-pose-inverse matrix per joint.
    pub rest_inverse: Vec<JointMatrix>,
    /// Sparse per-vertex joint weights.
    pub weights: VertexWeights,
}
