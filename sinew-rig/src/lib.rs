//! Rig data model for the Sinew corrective deformation engine.
//!
//! This crate holds the immutable description of a skeletally-driven
//! character rig: quantized corrective data, skinning weights and the pose
//! vector layout. The per-frame pipeline that consumes it lives in
//! `sinew-runtime`.
//!
//! # Modules
//!
//! - [`quantized`] - Column-major i8/i16 matrices with padded strides
//! - [`matrix`] - 3x4 affine joint matrices
//! - [`pose`] - Pose vector layout and assembly
//! - [`patch`] - Corrective patches and their shape invariants
//! - [`skinning`] - Sparse skinning weights and rest-pose data
//! - [`rig`] - The validated, shareable rig asset

pub mod error;
pub mod matrix;
pub mod patch;
pub mod pose;
pub mod quantized;
pub mod rig;
pub mod skinning;

pub use error::RigError;
pub use matrix::JointMatrix;
pub use patch::{CorrectiveType, Patch};
pub use pose::{JOINT_POSE_STRIDE, PoseVector, pose_len};
pub use quantized::{QuantMatrix, QuantScalar, dequantize, quantize};
pub use rig::{RigAsset, RigData};
pub use skinning::{SkinningData, VertexWeights};
