//! Displacement accumulation.
//!
//! A vertex may be influenced by any number of patches and a patch may
//! touch any number of vertices. The patch->vertex relation is inverted
//! once per rig load into a CSR-style index (concatenated entry array plus
//! per-vertex start offsets); per frame, each vertex gathers every claiming
//! patch's contribution exactly once. The inversion is pure data
//! restructuring with no floating-point work, so it is safe to build once
//! and cache on the session.

use sinew_rig::{CorrectiveType, RigAsset};

use crate::corrective::PatchScratch;

/// One patch contribution to a vertex.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Influence {
    /// Index of the contributing patch.
    pub patch: u32,
    /// Position of the vertex inside that patch's vertex list.
    pub local: u32,
}

/// Inverted vertex -> [(patch, local index)] influence index.
#[derive(Debug, Clone)]
pub(crate) struct InfluenceIndex {
    offsets: Vec<u32>,
    entries: Vec<Influence>,
}

impl InfluenceIndex {
    /// Invert the patch->vertex relation of a rig. Degenerate patches are
    /// excluded up front; they contribute exactly zero by definition.
    pub fn build(rig: &RigAsset) -> Self {
        let nv = rig.vertex_count();
        let mut counts = vec![0u32; nv + 1];
        for patch in rig.patches() {
            if patch.is_degenerate() {
                continue;
            }
            for &v in &patch.vertices {
                counts[v as usize + 1] += 1;
            }
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let offsets = counts;

        let total = offsets[nv] as usize;
        let mut cursor = offsets.clone();
        let mut entries = vec![
            Influence {
                patch: 0,
                local: 0
            };
            total
        ];
        for (p, patch) in rig.patches().iter().enumerate() {
            if patch.is_degenerate() {
                continue;
            }
            for (li, &v) in patch.vertices.iter().enumerate() {
                let slot = cursor[v as usize];
                entries[slot as usize] = Influence {
                    patch: p as u32,
                    local: li as u32,
                };
                cursor[v as usize] += 1;
            }
        }

        Self { offsets, entries }
    }

    /// Influence list for one vertex.
    #[inline]
    pub fn influences(&self, vertex: usize) -> &[Influence] {
        let start = self.offsets[vertex] as usize;
        let end = self.offsets[vertex + 1] as usize;
        &self.entries[start..end]
    }

    /// Total number of (patch, vertex) influence pairs.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Accumulate patch displacements into a contiguous vertex range of the
/// shape buffer. `shape` is the xyz sub-slice for exactly that range; the
/// parallel policy hands out disjoint ranges, so there is no aliasing.
pub(crate) fn accumulate_range(
    ty: CorrectiveType,
    index: &InfluenceIndex,
    scratch: &[PatchScratch],
    first_vertex: usize,
    shape: &mut [f32],
) {
    for (i, xyz) in shape.chunks_exact_mut(3).enumerate() {
        let vertex = first_vertex + i;
        for inf in index.influences(vertex) {
            let s = &scratch[inf.patch as usize];
            let li = inf.local as usize;
            match ty {
                CorrectiveType::FullSpace | CorrectiveType::EigenSkin => {
                    let disp = s.displacement(ty);
                    xyz[0] += disp[3 * li];
                    xyz[1] += disp[3 * li + 1];
                    xyz[2] += disp[3 * li + 2];
                }
                CorrectiveType::TensorSkin => {
                    let plane = s.plane_stride;
                    xyz[0] += s.disp[li];
                    xyz[1] += s.disp[plane + li];
                    xyz[2] += s.disp[2 * plane + li];
                }
            }
        }
    }
}
