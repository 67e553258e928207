//! In-place k-d tree over a point cloud.
//!
//! The tree is a single flat array of points: every subrange's root is the
//! element at `len / 2`, placed there by an exact median partition on the
//! split axis (x, y, z cycling by depth). Build and query derive the same
//! midpoint from the same rule, so the tree needs no child pointers and no
//! extra memory beyond the point copy.

use glam::Vec3;

#[derive(Debug, Clone, Copy)]
struct KdPoint {
    pos: Vec3,
    /// Index of this point in the original input order.
    index: u32,
}

/// Flat k-d tree for exact nearest-neighbor queries.
#[derive(Debug, Clone)]
pub(crate) struct KdTree {
    nodes: Vec<KdPoint>,
}

impl KdTree {
    /// Build a tree over the given points. Input order is irrelevant;
    /// reported indices refer to it.
    pub fn build(points: &[Vec3]) -> Self {
        let mut nodes: Vec<KdPoint> = points
            .iter()
            .enumerate()
            .map(|(i, &pos)| KdPoint {
                pos,
                index: i as u32,
            })
            .collect();
        build_range(&mut nodes, 0);
        Self { nodes }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Exact nearest neighbor: `(original index, squared distance)`.
    pub fn nearest(&self, query: Vec3) -> Option<(u32, f32)> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = (u32::MAX, f32::INFINITY);
        nearest_in(&self.nodes, 0, query, &mut best);
        Some(best)
    }
}

fn build_range(nodes: &mut [KdPoint], depth: usize) {
    if nodes.len() <= 1 {
        return;
    }
    let axis = depth % 3;
    let mid = nodes.len() / 2;
    nodes.select_nth_unstable_by(mid, |a, b| a.pos[axis].total_cmp(&b.pos[axis]));
    let (left, rest) = nodes.split_at_mut(mid);
    build_range(left, depth + 1);
    build_range(&mut rest[1..], depth + 1);
}

fn nearest_in(nodes: &[KdPoint], depth: usize, query: Vec3, best: &mut (u32, f32)) {
    if nodes.is_empty() {
        return;
    }
    let axis = depth % 3;
    let mid = nodes.len() / 2;
    let node = &nodes[mid];

    let dist_sq = query.distance_squared(node.pos);
    if dist_sq < best.1 {
        *best = (node.index, dist_sq);
    }
    if best.1 == 0.0 {
        return;
    }

    let plane_delta = query[axis] - node.pos[axis];
    let (near, far) = if plane_delta < 0.0 {
        (&nodes[..mid], &nodes[mid + 1..])
    } else {
        (&nodes[mid + 1..], &nodes[..mid])
    };

    nearest_in(near, depth + 1, query, best);
    // The far half can only win if the splitting plane is closer than the
    // current best.
    if plane_delta * plane_delta < best.1 {
        nearest_in(far, depth + 1, query, best);
    }
}
