//! The deformation session.
//!
//! A [`Deformer`] binds an immutable rig to preallocated per-frame state
//! and runs the four-stage pipeline (correctives, accumulation, relative
//! transforms, skinning) under one of three execution policies:
//!
//! - [`ExecutionPolicy::Synchronous`]: the whole frame runs inside
//!   `begin_frame` on the calling thread.
//! - [`ExecutionPolicy::Background`]: `begin_frame` hands the frame to a
//!   dedicated worker thread and returns; `finish_frame` blocks until the
//!   worker is done. One frame in flight at a time.
//! - [`ExecutionPolicy::Parallel`]: each stage is data-parallel on a rayon
//!   pool, with a barrier between stages.
//!
//! All allocation happens at construction. The per-frame path only reads
//! the rig and writes session-owned buffers, so a single rig can be shared
//! across many sessions.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use glam::Affine3A;
use rayon::prelude::*;
use sinew_rig::{CorrectiveType, JointMatrix, PoseVector, RigAsset};

use crate::accumulate::{self, InfluenceIndex};
use crate::backend::Backend;
use crate::corrective::{self, PatchScratch};
use crate::error::DeformError;
use crate::registration::{CorrespondenceMap, UNMATCHED};
use crate::{skinning, transforms};

/// How a session schedules its per-frame work.
#[derive(Debug, Clone, Default)]
pub enum ExecutionPolicy {
    /// Run the whole frame on the calling thread.
    #[default]
    Synchronous,
    /// Run the frame on a dedicated background thread.
    Background,
    /// Run each stage data-parallel on a rayon pool.
    Parallel(ParallelConfig),
}

/// Tuning for [`ExecutionPolicy::Parallel`].
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Worker thread count; `None` lets rayon pick.
    pub threads: Option<usize>,
    /// Minimum patches per correctives task.
    pub correctives_batch: usize,
    /// Vertices per accumulation task.
    pub accumulate_batch: usize,
    /// Vertices per skinning task.
    pub skinning_batch: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            threads: None,
            correctives_batch: 1,
            accumulate_batch: 32,
            skinning_batch: 16,
        }
    }
}

/// All mutable per-frame buffers, boxed so the background policy can move
/// them to the worker and back without copying.
struct FrameState {
    pose: Vec<f32>,
    world: Vec<JointMatrix>,
    shape: Vec<f32>,
    relative: Vec<Affine3A>,
    positions: Vec<f32>,
    scratch: Vec<PatchScratch>,
}

impl FrameState {
    fn new(rig: &RigAsset) -> Self {
        let ty = rig.corrective_type();
        Self {
            pose: vec![0.0; rig.pose_len()],
            world: vec![JointMatrix::IDENTITY; rig.joint_count()],
            shape: rig.rest_shape().to_vec(),
            relative: vec![Affine3A::IDENTITY; rig.joint_count()],
            positions: vec![0.0; rig.rest_shape().len()],
            scratch: rig
                .patches()
                .iter()
                .map(|p| PatchScratch::for_patch(ty, p))
                .collect(),
        }
    }
}

enum Engine {
    Inline,
    Pool {
        pool: rayon::ThreadPool,
        config: ParallelConfig,
    },
    Worker(Worker),
}

enum WorkerMsg {
    Frame(Box<FrameState>),
    Shutdown,
}

struct Worker {
    jobs: mpsc::Sender<WorkerMsg>,
    done: mpsc::Receiver<Box<FrameState>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        rig: Arc<RigAsset>,
        index: Arc<InfluenceIndex>,
        backend: Backend,
    ) -> Result<Self, DeformError> {
        let (jobs, job_rx) = mpsc::channel::<WorkerMsg>();
        let (done_tx, done) = mpsc::channel::<Box<FrameState>>();
        let handle = thread::Builder::new()
            .name("sinew-deform".into())
            .spawn(move || {
                while let Ok(msg) = job_rx.recv() {
                    match msg {
                        WorkerMsg::Frame(mut state) => {
                            run_serial(&rig, &index, backend, &mut state);
                            if done_tx.send(state).is_err() {
                                break;
                            }
                        }
                        WorkerMsg::Shutdown => break,
                    }
                }
            })
            .map_err(DeformError::WorkerSpawn)?;
        Ok(Self {
            jobs,
            done,
            handle: Some(handle),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.jobs.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A deformation session over one rig.
pub struct Deformer {
    rig: Arc<RigAsset>,
    index: Arc<InfluenceIndex>,
    backend: Backend,
    engine: Engine,
    /// `None` exactly while a background frame is in flight.
    state: Option<Box<FrameState>>,
    in_flight: bool,
}

impl Deformer {
    /// Create a session with the best backend available on this CPU.
    pub fn new(rig: Arc<RigAsset>, policy: ExecutionPolicy) -> Result<Self, DeformError> {
        Self::with_backend(rig, policy, Backend::detect())
    }

    /// Create a session pinned to a specific backend.
    ///
    /// Fails if the backend is unavailable or the rig's matrix strides are
    /// not aligned to its lane width; both are setup-time properties, so
    /// the per-frame path never re-checks them.
    pub fn with_backend(
        rig: Arc<RigAsset>,
        policy: ExecutionPolicy,
        backend: Backend,
    ) -> Result<Self, DeformError> {
        if !backend.is_supported() {
            return Err(DeformError::BackendUnavailable { backend });
        }
        let lanes = backend.lanes();
        for patch in rig.patches() {
            patch.centers.check_lane_alignment(lanes, "kernel centers")?;
            patch
                .rbf_coeffs
                .check_lane_alignment(lanes, "RBF coefficients")?;
            if let Some(basis) = patch.basis.as_ref() {
                basis.check_lane_alignment(lanes, "reduced basis")?;
            }
        }

        let index = Arc::new(InfluenceIndex::build(&rig));
        let state = Some(Box::new(FrameState::new(&rig)));
        let engine = match policy {
            ExecutionPolicy::Synchronous => Engine::Inline,
            ExecutionPolicy::Background => {
                Engine::Worker(Worker::spawn(rig.clone(), index.clone(), backend)?)
            }
            ExecutionPolicy::Parallel(config) => {
                let mut builder = rayon::ThreadPoolBuilder::new();
                if let Some(threads) = config.threads {
                    builder = builder.num_threads(threads);
                }
                let pool = builder.build().map_err(DeformError::PoolBuild)?;
                Engine::Pool { pool, config }
            }
        };

        log::debug!(
            "deformer bound: {} vertices, {} joints, {} patches, backend {:?}",
            rig.vertex_count(),
            rig.joint_count(),
            rig.patches().len(),
            backend
        );

        Ok(Self {
            rig,
            index,
            backend,
            engine,
            state,
            in_flight: false,
        })
    }

    /// The backend this session runs on.
    #[inline]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// The rig this session is bound to.
    #[inline]
    pub fn rig(&self) -> &Arc<RigAsset> {
        &self.rig
    }

    /// Start a frame from a pose vector and world joint transforms.
    ///
    /// Synchronous and parallel sessions compute the frame here; background
    /// sessions copy the inputs and return immediately.
    pub fn begin_frame(
        &mut self,
        pose: &PoseVector,
        world: &[JointMatrix],
    ) -> Result<(), DeformError> {
        if self.in_flight {
            return Err(DeformError::FrameInFlight);
        }
        if pose.len() != self.rig.pose_len() {
            return Err(DeformError::PoseLengthMismatch {
                expected: self.rig.pose_len(),
                actual: pose.len(),
            });
        }
        if world.len() != self.rig.joint_count() {
            return Err(DeformError::JointCountMismatch {
                expected: self.rig.joint_count(),
                actual: world.len(),
            });
        }

        {
            let state = self.state.as_mut().ok_or(DeformError::WorkerLost)?;
            state.pose.copy_from_slice(pose.values());
            state.world.copy_from_slice(world);
        }

        match &self.engine {
            Engine::Inline => {
                let state = self.state.as_mut().ok_or(DeformError::WorkerLost)?;
                run_serial(&self.rig, &self.index, self.backend, state);
            }
            Engine::Pool { pool, config } => {
                let state = self.state.as_mut().ok_or(DeformError::WorkerLost)?;
                run_parallel(&self.rig, &self.index, self.backend, config, pool, state);
            }
            Engine::Worker(worker) => {
                let state = self.state.take().ok_or(DeformError::WorkerLost)?;
                worker
                    .jobs
                    .send(WorkerMsg::Frame(state))
                    .map_err(|_| DeformError::WorkerLost)?;
                self.in_flight = true;
            }
        }
        Ok(())
    }

    /// Wait for the current frame and return the skinned positions as flat
    /// xyz triples in rig vertex order.
    pub fn finish_frame(&mut self) -> Result<&[f32], DeformError> {
        if self.in_flight {
            let Engine::Worker(worker) = &self.engine else {
                return Err(DeformError::WorkerLost);
            };
            let state = worker.done.recv().map_err(|_| DeformError::WorkerLost)?;
            self.state = Some(state);
            self.in_flight = false;
        }
        Ok(&self.state.as_ref().ok_or(DeformError::WorkerLost)?.positions)
    }

    /// Run one full frame and return the result. Equivalent to
    /// `begin_frame` followed by `finish_frame`.
    pub fn deform(
        &mut self,
        pose: &PoseVector,
        world: &[JointMatrix],
    ) -> Result<&[f32], DeformError> {
        self.begin_frame(pose, world)?;
        self.finish_frame()
    }

    /// Scatter the last finished frame's positions through a correspondence
    /// map into a target-ordered buffer. Unmatched target slots are left
    /// untouched.
    pub fn scatter_to(
        &self,
        map: &CorrespondenceMap,
        out: &mut [f32],
    ) -> Result<(), DeformError> {
        if self.in_flight {
            return Err(DeformError::FrameInFlight);
        }
        if out.len() != 3 * map.len() {
            return Err(DeformError::TargetLengthMismatch {
                expected: map.len(),
                actual: out.len() / 3,
            });
        }
        let positions = &self.state.as_ref().ok_or(DeformError::WorkerLost)?.positions;
        for (i, &rig_vertex) in map.indices().iter().enumerate() {
            if rig_vertex == UNMATCHED {
                continue;
            }
            let src = 3 * rig_vertex as usize;
            let dst = 3 * i;
            out[dst..dst + 3].copy_from_slice(&positions[src..src + 3]);
        }
        Ok(())
    }
}

/// Single-worker frame: used by the synchronous policy and the background
/// worker thread. TensorSkin rigs take the fused path, scattering each
/// patch's planar displacement straight into the shape buffer instead of
/// going through the inverted index.
fn run_serial(rig: &RigAsset, index: &InfluenceIndex, backend: Backend, state: &mut FrameState) {
    let ty = rig.corrective_type();
    state.shape.copy_from_slice(rig.rest_shape());

    let fuse = ty == CorrectiveType::TensorSkin;
    for (patch, scratch) in rig.patches().iter().zip(&mut state.scratch) {
        if patch.is_degenerate() {
            continue;
        }
        corrective::evaluate_patch(backend, ty, patch, &state.pose, scratch);
        if fuse {
            corrective::scatter_add_tensor(patch, scratch, &mut state.shape);
        }
    }
    if !fuse {
        accumulate::accumulate_range(ty, index, &state.scratch, 0, &mut state.shape);
    }

    transforms::compute_relative(
        &state.world,
        &rig.skinning().rest_inverse,
        &mut state.relative,
    );
    skinning::skin_range(
        &rig.skinning().weights,
        &state.relative,
        0,
        &state.shape,
        &mut state.positions,
    );
}

/// Data-parallel frame. Every stage partitions its output disjointly, so
/// no task ever writes a slot another task reads in the same stage; the
/// fused tensor scatter is unsound here and is never taken.
fn run_parallel(
    rig: &RigAsset,
    index: &InfluenceIndex,
    backend: Backend,
    config: &ParallelConfig,
    pool: &rayon::ThreadPool,
    state: &mut FrameState,
) {
    let ty = rig.corrective_type();
    let FrameState {
        pose,
        world,
        shape,
        relative,
        positions,
        scratch,
    } = state;
    let pose: &[f32] = pose;
    let world: &[JointMatrix] = world;

    pool.install(|| {
        shape.copy_from_slice(rig.rest_shape());

        rig.patches()
            .par_iter()
            .zip(scratch.par_iter_mut())
            .with_min_len(config.correctives_batch.max(1))
            .for_each(|(patch, scratch)| {
                if !patch.is_degenerate() {
                    corrective::evaluate_patch(backend, ty, patch, pose, scratch);
                }
            });
        let scratch: &[PatchScratch] = scratch;

        let accumulate_batch = config.accumulate_batch.max(1);
        shape
            .par_chunks_mut(3 * accumulate_batch)
            .enumerate()
            .for_each(|(chunk, slice)| {
                accumulate::accumulate_range(ty, index, scratch, chunk * accumulate_batch, slice);
            });
        let shape: &[f32] = shape;

        let rest_inverse = &rig.skinning().rest_inverse;
        relative
            .par_iter_mut()
            .enumerate()
            .with_min_len(16)
            .for_each(|(j, rel)| {
                *rel = transforms::relative_transform(&world[j], &rest_inverse[j]);
            });
        let relative: &[Affine3A] = relative;

        let skinning_batch = config.skinning_batch.max(1);
        positions
            .par_chunks_mut(3 * skinning_batch)
            .enumerate()
            .for_each(|(chunk, out)| {
                let first = chunk * skinning_batch;
                let src = &shape[3 * first..3 * first + out.len()];
                skinning::skin_range(&rig.skinning().weights, relative, first, src, out);
            });
    });
}
