//! End-to-end pipeline tests.
//!
//! The three correctives representations can encode the same displacement
//! field when it has rank one per patch; these tests build one rig per
//! representation around the identical field and require bit-identical
//! frame output, then check that every execution policy agrees with the
//! synchronous one and that registration scatter re-orders frames
//! correctly.

use std::sync::Arc;

use glam::Vec3;
use sinew_rig::{
    CorrectiveType, JointMatrix, Patch, QuantMatrix, RigAsset, RigData, SkinningData,
    VertexWeights,
};
use sinew_runtime::{register, Backend, Deformer, ExecutionPolicy, ParallelConfig};

const REST_SHAPE: [f32; 6] = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];

/// The displacement every test rig encodes: per-axis coefficients
/// (1, 2, 3) times per-vertex weights (1, 2), interleaved.
const EXPECTED_DISP: [f32; 6] = [1.0, 2.0, 3.0, 2.0, 4.0, 6.0];

/// Scaffold shared by all representations: two vertices fully bound to one
/// identity joint, one extra pose parameter, one kernel whose center sits
/// exactly on the rest pose so only the bias column of the RBF
/// coefficients survives.
fn rig_with_patch(ty: CorrectiveType, patch: Patch) -> Arc<RigAsset> {
    Arc::new(
        RigAsset::new(RigData {
            rest_shape: REST_SHAPE.to_vec(),
            rest_local: vec![JointMatrix::IDENTITY],
            rest_world: vec![JointMatrix::IDENTITY],
            joint_names: vec!["root".to_string()],
            rest_extras: vec![0.0],
            patches: vec![patch],
            skinning: SkinningData {
                rest_inverse: vec![JointMatrix::IDENTITY],
                weights: VertexWeights::new(vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0], 1)
                    .unwrap(),
            },
            corrective_type: ty,
        })
        .unwrap(),
    )
}

fn base_patch() -> Patch {
    Patch {
        vertices: vec![0, 1],
        pose_indices: vec![0],
        pose_scale: vec![1.0],
        pose_shift: vec![0.0],
        // One kernel centered on the rest value of extra 0.
        centers: QuantMatrix::new(1, 1, 8, vec![0i8; 8], "centers").unwrap(),
        center_scale: vec![1.0],
        kernel_scale: vec![1.0, 1.0],
        rbf_coeffs: QuantMatrix::empty(),
        coeff_scale: Vec::new(),
        basis: None,
        vertex_scale: Vec::new(),
    }
}

fn coeff_matrix(bias_column: &[i16]) -> QuantMatrix<i16> {
    let rows = bias_column.len();
    let stride = 8;
    let mut data = vec![0i16; stride * 2];
    data[stride..stride + rows].copy_from_slice(bias_column);
    QuantMatrix::new(rows, 2, stride, data, "coeffs").unwrap()
}

fn basis_matrix(column: &[i8]) -> QuantMatrix<i8> {
    let rows = column.len();
    let stride = 8;
    let mut data = vec![0i8; stride];
    data[..rows].copy_from_slice(column);
    QuantMatrix::new(rows, 1, stride, data, "basis").unwrap()
}

fn full_space_rig() -> Arc<RigAsset> {
    let mut patch = base_patch();
    patch.rbf_coeffs = coeff_matrix(&[1, 2, 3, 2, 4, 6]);
    patch.coeff_scale = vec![1.0; 6];
    rig_with_patch(CorrectiveType::FullSpace, patch)
}

fn eigen_skin_rig() -> Arc<RigAsset> {
    let mut patch = base_patch();
    // One subspace coefficient; the basis column carries the whole field.
    patch.rbf_coeffs = coeff_matrix(&[1]);
    patch.coeff_scale = vec![1.0];
    patch.basis = Some(basis_matrix(&[1, 2, 3, 2, 4, 6]));
    patch.vertex_scale = vec![1.0; 6];
    rig_with_patch(CorrectiveType::EigenSkin, patch)
}

fn tensor_skin_rig() -> Arc<RigAsset> {
    let mut patch = base_patch();
    // Per-axis coefficients (1, 2, 3) over a per-vertex basis (1, 2).
    patch.rbf_coeffs = coeff_matrix(&[1, 2, 3]);
    patch.coeff_scale = vec![1.0; 3];
    patch.basis = Some(basis_matrix(&[1, 2]));
    patch.vertex_scale = vec![1.0; 2];
    rig_with_patch(CorrectiveType::TensorSkin, patch)
}

fn run_frame(rig: &Arc<RigAsset>, policy: ExecutionPolicy) -> Vec<f32> {
    let mut deformer = Deformer::with_backend(rig.clone(), policy, Backend::Scalar).unwrap();
    let pose = rig.rest_pose();
    deformer
        .deform(&pose, &[JointMatrix::IDENTITY])
        .unwrap()
        .to_vec()
}

fn expected_positions() -> Vec<f32> {
    REST_SHAPE
        .iter()
        .zip(&EXPECTED_DISP)
        .map(|(r, d)| r + d)
        .collect()
}

#[test]
fn test_full_space_frame() {
    assert_eq!(
        run_frame(&full_space_rig(), ExecutionPolicy::Synchronous),
        expected_positions()
    );
}

#[test]
fn test_eigen_skin_frame() {
    assert_eq!(
        run_frame(&eigen_skin_rig(), ExecutionPolicy::Synchronous),
        expected_positions()
    );
}

#[test]
fn test_tensor_skin_frame() {
    assert_eq!(
        run_frame(&tensor_skin_rig(), ExecutionPolicy::Synchronous),
        expected_positions()
    );
}

#[test]
fn test_representations_agree() {
    let a = run_frame(&full_space_rig(), ExecutionPolicy::Synchronous);
    let b = run_frame(&eigen_skin_rig(), ExecutionPolicy::Synchronous);
    let c = run_frame(&tensor_skin_rig(), ExecutionPolicy::Synchronous);
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn test_policies_agree_on_tensor_rig() {
    // TensorSkin takes the fused scatter path under single-worker policies
    // and the inverted-index path under the parallel one; results must be
    // identical either way.
    let rig = tensor_skin_rig();
    let sync = run_frame(&rig, ExecutionPolicy::Synchronous);
    let background = run_frame(&rig, ExecutionPolicy::Background);
    let parallel = run_frame(
        &rig,
        ExecutionPolicy::Parallel(ParallelConfig {
            threads: Some(2),
            ..ParallelConfig::default()
        }),
    );
    assert_eq!(sync, background);
    assert_eq!(sync, parallel);
}

#[test]
fn test_policies_agree_on_full_space_rig() {
    let rig = full_space_rig();
    let sync = run_frame(&rig, ExecutionPolicy::Synchronous);
    let background = run_frame(&rig, ExecutionPolicy::Background);
    let parallel = run_frame(&rig, ExecutionPolicy::Parallel(ParallelConfig::default()));
    assert_eq!(sync, background);
    assert_eq!(sync, parallel);
}

#[test]
fn test_tiny_parallel_batches_cover_every_vertex() {
    // Batch sizes of one force the maximum number of range tasks.
    let rig = full_space_rig();
    let out = run_frame(
        &rig,
        ExecutionPolicy::Parallel(ParallelConfig {
            threads: Some(3),
            correctives_batch: 1,
            accumulate_batch: 1,
            skinning_batch: 1,
        }),
    );
    assert_eq!(out, expected_positions());
}

#[test]
fn test_scatter_through_correspondence_map() {
    let rig = full_space_rig();
    let mut deformer =
        Deformer::with_backend(rig.clone(), ExecutionPolicy::Synchronous, Backend::Scalar)
            .unwrap();
    let pose = rig.rest_pose();
    deformer.deform(&pose, &[JointMatrix::IDENTITY]).unwrap();

    // Target mesh shows the rig's two vertices in reverse order.
    let rig_points = [
        Vec3::new(REST_SHAPE[0], REST_SHAPE[1], REST_SHAPE[2]),
        Vec3::new(REST_SHAPE[3], REST_SHAPE[4], REST_SHAPE[5]),
    ];
    let target = [rig_points[1], rig_points[0]];
    let map = register(&target, &rig_points, 1e-4).unwrap();

    let mut out = vec![0.0; 6];
    deformer.scatter_to(&map, &mut out).unwrap();

    let expected = expected_positions();
    assert_eq!(&out[0..3], &expected[3..6]);
    assert_eq!(&out[3..6], &expected[0..3]);
}

#[test]
fn test_degenerate_patch_rig_matches_patchless_output() {
    // A rig whose only patch is degenerate deforms exactly like skinning
    // alone.
    let degenerate = Patch {
        vertices: vec![0, 1],
        pose_indices: Vec::new(),
        pose_scale: Vec::new(),
        pose_shift: Vec::new(),
        centers: QuantMatrix::empty(),
        center_scale: Vec::new(),
        kernel_scale: Vec::new(),
        rbf_coeffs: QuantMatrix::empty(),
        coeff_scale: Vec::new(),
        basis: None,
        vertex_scale: Vec::new(),
    };
    let rig = rig_with_patch(CorrectiveType::FullSpace, degenerate);
    let out = run_frame(&rig, ExecutionPolicy::Synchronous);
    assert_eq!(out, REST_SHAPE.to_vec());
}
