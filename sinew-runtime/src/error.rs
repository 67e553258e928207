//! Runtime error types.

use thiserror::Error;

use crate::backend::Backend;
use sinew_rig::RigError;

/// Errors from deformer construction and per-frame boundary validation.
///
/// Everything here is caught before any pipeline stage runs; once a frame
/// starts it is a deterministic pure function of its inputs and cannot
/// fail.
#[derive(Debug, Error)]
pub enum DeformError {
    /// The requested backend cannot run on this CPU.
    #[error("backend {backend:?} is not supported on this CPU")]
    BackendUnavailable { backend: Backend },

    /// Rig data is incompatible with the chosen backend (stride alignment)
    /// or otherwise failed validation at bind time.
    #[error(transparent)]
    Rig(#[from] RigError),

    /// Supplied pose vector does not match the rig's declared pose length.
    #[error("pose length {actual} does not match rig pose length {expected}")]
    PoseLengthMismatch { expected: usize, actual: usize },

    /// Supplied world transforms do not cover the rig's joints.
    #[error("got {actual} world joint transforms, rig has {expected} joints")]
    JointCountMismatch { expected: usize, actual: usize },

    /// Output buffer disagrees with the correspondence map.
    #[error("output buffer holds {actual} vertices, correspondence map covers {expected}")]
    TargetLengthMismatch { expected: usize, actual: usize },

    /// `begin_frame` was called again before `finish_frame`.
    #[error("a frame is already in flight")]
    FrameInFlight,

    /// The background worker thread is gone.
    #[error("background worker thread terminated unexpectedly")]
    WorkerLost,

    /// The background worker thread could not be spawned.
    #[error("failed to spawn background worker")]
    WorkerSpawn(#[source] std::io::Error),

    /// The rayon pool for the parallel policy could not be built.
    #[error("failed to build worker pool")]
    PoolBuild(#[source] rayon::ThreadPoolBuildError),
}
