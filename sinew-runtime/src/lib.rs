//! Real-time corrective deformation runtime.
//!
//! Takes a validated [`sinew_rig::RigAsset`] and animates it: per frame,
//! quantized RBF patch correctives displace the rest shape, then linear
//! blend skinning carries the corrected shape into world space.
//!
//! Pipeline layout:
//!
//! ```text
//! pose ──> correctives (per patch) ──> accumulate (per vertex) ──┐
//!                                                                v
//! world ─> relative transforms (per joint) ──────> skinning (per vertex)
//! ```
//!
//! [`Deformer`] owns all per-frame state and schedules the stages under an
//! [`ExecutionPolicy`]; [`register`] maps an external mesh's vertices onto
//! rig vertices once at setup so frame output can be scattered into the
//! caller's vertex order.

mod accumulate;
mod backend;
mod corrective;
mod deformer;
mod error;
mod kernels;
mod registration;
mod skinning;
mod transforms;

pub use backend::Backend;
pub use deformer::{Deformer, ExecutionPolicy, ParallelConfig};
pub use error::DeformError;
pub use registration::{
    register, CorrespondenceMap, RegistrationError, UnmatchedPoint, UNMATCHED,
};
