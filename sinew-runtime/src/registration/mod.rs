//! Mesh correspondence registration.
//!
//! Maps a target mesh's vertices onto rig vertices by exact
//! nearest-neighbor search over rest positions. Registration runs once at
//! setup; a target vertex whose nearest rig vertex lies within the spatial
//! tolerance is matched to it, anything farther is a hard setup error with
//! full diagnostics. Rig vertices that no target vertex claims are legal
//! (the rig may model more than the target shows) and are only logged.

mod kdtree;

use glam::Vec3;
use thiserror::Error;

use kdtree::KdTree;

/// Sentinel for an unmatched slot in a [`CorrespondenceMap`].
pub const UNMATCHED: u32 = u32::MAX;

/// Target-ordered mapping onto rig vertex indices.
#[derive(Debug, Clone)]
pub struct CorrespondenceMap {
    indices: Vec<u32>,
}

impl CorrespondenceMap {
    /// Number of target vertices covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Raw indices; unmatched slots hold [`UNMATCHED`].
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Rig vertex for one target vertex, `None` when unmatched.
    #[inline]
    pub fn get(&self, target: usize) -> Option<u32> {
        let index = self.indices[target];
        (index != UNMATCHED).then_some(index)
    }
}

/// Diagnostics for one query point that found no match within tolerance.
#[derive(Debug, Clone)]
pub struct UnmatchedPoint {
    /// Index of the query point.
    pub index: usize,
    /// The query position.
    pub point: Vec3,
    /// Distance to its nearest rig vertex.
    pub nearest_distance: f32,
}

/// Registration failed: at least one query point has no rig vertex within
/// tolerance.
#[derive(Debug, Clone, Error)]
#[error(
    "registration failed: {unmatched} of {query_count} points beyond tolerance {tolerance} \
     of {target_count} rig vertices (closest miss at distance {nearest_miss})",
    unmatched = .failures.len()
)]
pub struct RegistrationError {
    /// The tolerance the caller asked for.
    pub tolerance: f32,
    /// Total query points.
    pub query_count: usize,
    /// Total rig vertices searched.
    pub target_count: usize,
    /// Distance of the closest failing query to its nearest rig vertex.
    pub nearest_miss: f32,
    /// Every failing query point, in query order.
    pub failures: Vec<UnmatchedPoint>,
}

/// Match every point of `queries` to its nearest point in `rig_points`.
///
/// Returns a query-ordered map of rig indices. Fails if any query's
/// nearest rig point is farther than `tolerance`; the error lists every
/// such query. Rig points left unclaimed are logged at warn level.
pub fn register(
    queries: &[Vec3],
    rig_points: &[Vec3],
    tolerance: f32,
) -> Result<CorrespondenceMap, RegistrationError> {
    let tree = KdTree::build(rig_points);
    let tolerance_sq = tolerance * tolerance;

    let mut indices = vec![UNMATCHED; queries.len()];
    let mut claimed = vec![false; rig_points.len()];
    let mut failures = Vec::new();

    for (i, &query) in queries.iter().enumerate() {
        match tree.nearest(query) {
            Some((rig_vertex, dist_sq)) if dist_sq <= tolerance_sq => {
                indices[i] = rig_vertex;
                claimed[rig_vertex as usize] = true;
            }
            Some((_, dist_sq)) => {
                failures.push(UnmatchedPoint {
                    index: i,
                    point: query,
                    nearest_distance: dist_sq.sqrt(),
                });
            }
            None => {
                failures.push(UnmatchedPoint {
                    index: i,
                    point: query,
                    nearest_distance: f32::INFINITY,
                });
            }
        }
    }

    if !failures.is_empty() {
        let nearest_miss = failures
            .iter()
            .map(|f| f.nearest_distance)
            .fold(f32::INFINITY, f32::min);
        return Err(RegistrationError {
            tolerance,
            query_count: queries.len(),
            target_count: rig_points.len(),
            nearest_miss,
            failures,
        });
    }

    let unclaimed = claimed.iter().filter(|&&c| !c).count();
    if unclaimed > 0 {
        log::warn!(
            "registration matched all {} query points but left {unclaimed} of {} rig vertices unclaimed",
            queries.len(),
            rig_points.len()
        );
    }

    Ok(CorrespondenceMap { indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_self_registration_is_identity() {
        let mut rng = Pcg32::new(42, 54);
        let points: Vec<Vec3> = (0..200)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                )
            })
            .collect();
        let map = register(&points, &points, 1e-6).unwrap();
        for (i, &index) in map.indices().iter().enumerate() {
            // With distinct random points each query's nearest is itself.
            assert_eq!(index as usize, i);
        }
    }

    #[test]
    fn test_within_tolerance_matches_nearest() {
        let rig = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)];
        let queries = vec![Vec3::new(0.05, 0.0, 0.0), Vec3::new(9.9, 0.0, 0.0)];
        let map = register(&queries, &rig, 0.2).unwrap();
        assert_eq!(map.get(0), Some(0));
        assert_eq!(map.get(1), Some(1));
    }

    #[test]
    fn test_beyond_tolerance_is_hard_error() {
        let rig = vec![Vec3::ZERO];
        let queries = vec![Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0)];
        let err = register(&queries, &rig, 0.5).unwrap_err();
        assert_eq!(err.query_count, 2);
        assert_eq!(err.target_count, 1);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].index, 1);
        assert!((err.failures[0].nearest_distance - 5.0).abs() < 1e-5);
        assert!((err.nearest_miss - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_rig_fails_for_any_query() {
        let err = register(&[Vec3::ZERO], &[], 1.0).unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].nearest_distance, f32::INFINITY);
    }

    #[test]
    fn test_unclaimed_rig_vertices_are_allowed() {
        // Rig has more vertices than the target shows; still Ok.
        let rig = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let queries = vec![Vec3::ZERO];
        let map = register(&queries, &rig, 1e-3).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(0), Some(0));
    }

    #[test]
    fn test_many_to_one_matching() {
        // Several target vertices may legally collapse onto one rig vertex.
        let rig = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)];
        let queries = vec![
            Vec3::new(0.01, 0.0, 0.0),
            Vec3::new(-0.01, 0.0, 0.0),
            Vec3::new(0.0, 0.01, 0.0),
        ];
        let map = register(&queries, &rig, 0.1).unwrap();
        assert!(map.indices().iter().all(|&i| i == 0));
    }
}
