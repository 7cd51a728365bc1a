//! Assignment of observing cameras to clusters.

use std::collections::HashSet;

use crate::geometry::world_to_camera;
use crate::scene::Scene;

use super::cluster::Cluster;

/// Collect, for every cluster, the views that observe at least one of its
/// points within `max_distance`, then drop views whose overlap with the
/// cluster is too thin.
///
/// The two-phase filter (coarse depth cutoff, then a shared-point cutoff of
/// `min_shared_points`) keeps a cluster from being polluted by cameras that
/// merely glance at its boundary.
pub fn assign_cameras(
    clusters: &mut [Cluster],
    scene: &Scene,
    max_distance: f64,
    min_shared_points: usize,
) {
    for cluster in clusters.iter_mut() {
        for &point_idx in &cluster.points {
            let point = &scene.points[point_idx as usize];
            for obs in &point.track {
                let view = scene.view(obs.view);
                let p_cam = world_to_camera(&view.rotation, &view.center, &point.position);
                if p_cam.z < max_distance {
                    cluster.cameras.insert(obs.view);
                }
            }
        }

        if cluster.cameras.is_empty() {
            continue;
        }

        let in_cluster: HashSet<u32> = cluster.points.iter().copied().collect();
        cluster.cameras.retain(|&id| {
            let shared = scene
                .view(id)
                .observed_points()
                .iter()
                .filter(|p| in_cluster.contains(p))
                .count();
            shared >= min_shared_points
        });
    }
}
