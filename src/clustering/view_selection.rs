//! Triangulation-angle scoring of (reference, source) view pairs.
//!
//! The score of a pair is summed over the points both views observe. Each
//! point contributes a piecewise Gaussian of its triangulation angle around
//! the target angle θ₀: angles below the target fall off with σ₀, angles
//! above with σ₁. Small angles give poor depth precision while large angles
//! break patch matching, and the two failure modes are penalized at
//! different rates.

use std::collections::BTreeMap;

use crate::geometry::triangulation_angle;
use crate::scene::{Scene, ViewId};

use super::cluster::{Cluster, Neighbor};

/// Parameters of the pairwise view-selection score.
///
/// Angles are in degrees. The defaults follow the COLMAP-style pinhole MVS
/// pipelines this output feeds.
#[derive(Debug, Clone)]
pub struct ViewSelectionParams {
    /// Number of best-scoring source views kept per reference view.
    pub num_neighbors: usize,
    /// Target triangulation angle θ₀.
    pub theta_0: f64,
    /// Spread below the target angle.
    pub sigma_0: f64,
    /// Spread above the target angle.
    pub sigma_1: f64,
}

impl Default for ViewSelectionParams {
    fn default() -> Self {
        Self {
            num_neighbors: 10,
            theta_0: 5.0,
            sigma_0: 1.0,
            sigma_1: 10.0,
        }
    }
}

/// Score contribution of one shared point observed at triangulation angle
/// `theta`. Both branches agree at θ₀, where the contribution is exactly 1.
fn score_contribution(theta: f64, params: &ViewSelectionParams) -> f64 {
    let sigma = if theta <= params.theta_0 {
        params.sigma_0
    } else {
        params.sigma_1
    };
    let delta = theta - params.theta_0;
    (-(delta * delta) / (2.0 * sigma * sigma)).exp()
}

/// Intersection of two sorted, de-duplicated index slices.
fn sorted_intersection(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut shared = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    shared
}

/// Rank, for every reference view of `cluster`, the other cluster views as
/// source candidates.
///
/// Sources with a zero accumulated score (no shared points, or only
/// degenerate geometry) are discarded; the rest are sorted by descending
/// score and truncated to the top `num_neighbors`. A shorter list is kept
/// as-is, never padded.
///
/// Reads only the cluster's camera set and the immutable scene tables, so
/// clusters can be ranked concurrently.
pub fn rank_sources(
    cluster: &Cluster,
    scene: &Scene,
    params: &ViewSelectionParams,
) -> BTreeMap<ViewId, Vec<Neighbor>> {
    let observed: BTreeMap<ViewId, Vec<u32>> = cluster
        .cameras
        .iter()
        .map(|&id| (id, scene.view(id).observed_points()))
        .collect();

    let mut ranked = BTreeMap::new();
    for &ref_id in &cluster.cameras {
        let ref_points = &observed[&ref_id];
        let ref_center = scene.view(ref_id).center;

        let mut candidates: Vec<Neighbor> = Vec::new();
        for &src_id in &cluster.cameras {
            if src_id == ref_id {
                continue;
            }
            let src_center = scene.view(src_id).center;

            let mut score = 0.0;
            for &point_idx in &sorted_intersection(ref_points, &observed[&src_id]) {
                let theta = triangulation_angle(
                    &scene.points[point_idx as usize].position,
                    &ref_center,
                    &src_center,
                );
                score += score_contribution(theta, params);
            }

            if score > 0.0 {
                candidates.push(Neighbor {
                    view: src_id,
                    score,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(params.num_neighbors);
        ranked.insert(ref_id, candidates);
    }
    ranked
}
