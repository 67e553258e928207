//! Setup-time validation errors for rig data.

use thiserror::Error;

/// Errors raised while constructing or validating rig data.
///
/// All of these are fatal setup errors: a rig that fails validation is
/// never handed to the runtime, so the per-frame pipeline has no error
/// paths of its own for malformed data.
#[derive(Debug, Error)]
pub enum RigError {
    /// Quantized matrix stride is smaller than its row count.
    #[error("{context}: stride {stride} is smaller than row count {rows}")]
    StrideTooSmall {
        context: &'static str,
        stride: usize,
        rows: usize,
    },

    /// Quantized matrix stride is not a multiple of the SIMD lane width.
    #[error("{context}: stride {stride} is not a multiple of {lanes} lanes")]
    MisalignedStride {
        context: &'static str,
        stride: usize,
        lanes: usize,
    },

    /// Quantized matrix backing storage has the wrong length.
    #[error("{context}: data length {len} does not match stride {stride} x cols {cols}")]
    BadDataLength {
        context: &'static str,
        len: usize,
        stride: usize,
        cols: usize,
    },

    /// Padding rows between `rows` and `stride` must hold zeros so that
    /// batched kernels can run over the full stride.
    #[error("{context}: non-zero value in padding row {row} of column {col}")]
    NonZeroPadding {
        context: &'static str,
        row: usize,
        col: usize,
    },

    /// A dimension of some rig component disagrees with the rig layout.
    #[error("patch {patch}: {context}: expected {expected}, got {actual}")]
    PatchShapeMismatch {
        patch: usize,
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A patch references a vertex outside the rig's rest shape.
    #[error("patch {patch}: vertex index {index} out of range (rig has {vertex_count} vertices)")]
    PatchVertexOutOfRange {
        patch: usize,
        index: u32,
        vertex_count: usize,
    },

    /// A patch references a pose entry outside the rig's pose vector.
    #[error("patch {patch}: pose index {index} out of range (pose length is {pose_len})")]
    PatchPoseIndexOutOfRange {
        patch: usize,
        index: u32,
        pose_len: usize,
    },

    /// Top-level rig arrays disagree on a count.
    #[error("rig: {context}: expected {expected}, got {actual}")]
    RigShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Sparse skinning weights are structurally invalid.
    #[error("skinning weights: {reason}")]
    InvalidWeights { reason: String },

    /// Skinning weights reference a joint the rig does not have.
    #[error("skinning weights: joint index {index} out of range (rig has {joint_count} joints)")]
    WeightJointOutOfRange { index: u16, joint_count: usize },
}
