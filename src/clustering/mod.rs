//! Spatial clustering of the reconstruction and per-cluster source-view
//! ranking.
//!
//! The pipeline runs in a fixed order over one shared cluster collection:
//! partition the cloud into grid cells, absorb undersized cells by point
//! count, attach observing cameras, absorb undersized cells by camera count,
//! prune void clusters, then rank source views. The first five stages are
//! sequential and mutate shared state; only the final ranking fans out, one
//! task per cluster, because each task touches nothing but its own cluster
//! and the read-only scene tables.

pub mod cluster;
pub mod grid;
pub mod merge;
pub mod view_selection;
pub mod visibility;

pub use cluster::{Cluster, Neighbor};
pub use grid::GroundGrid;
pub use view_selection::ViewSelectionParams;

use thiserror::Error;
use tracing::info;

use crate::scene::Scene;

/// Precondition violations detected before any clustering work runs.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("cannot cluster an empty point cloud")]
    EmptyPointCloud,
    #[error("cannot cluster a scene with no views")]
    EmptyViewTable,
    #[error("cell size must be positive, got {0}")]
    NonPositiveCellSize(f64),
    #[error("number of neighbors per view must be at least 1")]
    ZeroNeighborCount,
}

/// Knobs for the spatial clustering stages.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// Grid cell edge length in world units.
    pub cell_size: f64,
    /// Cells with fewer points are absorbed into a neighbor.
    pub min_points: usize,
    /// Clusters with fewer cameras are absorbed into a neighbor.
    pub min_cameras: usize,
    /// Cameras farther than this from an observed point do not count as
    /// observers.
    pub max_camera_distance: f64,
    /// Cameras sharing fewer observed points with a cluster are dropped.
    pub min_shared_points: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            min_points: 100,
            min_cameras: 5,
            max_camera_distance: 100.0,
            min_shared_points: 10,
        }
    }
}

/// The clustering pipeline: owns the evolving cluster collection and borrows
/// the immutable scene.
pub struct ViewClustering<'a> {
    scene: &'a Scene,
    grid: GroundGrid,
    clusters: Vec<Cluster>,
}

impl<'a> ViewClustering<'a> {
    /// Partition the scene's points over a fresh ground grid.
    ///
    /// Every point lands in exactly one cell; an empty scene or a
    /// non-positive cell size is rejected before any allocation.
    pub fn new(scene: &'a Scene, params: &ClusterParams) -> Result<Self, ClusteringError> {
        if scene.views.is_empty() {
            return Err(ClusteringError::EmptyViewTable);
        }
        let grid = GroundGrid::from_points(&scene.points, params.cell_size)?;

        let mut clusters = vec![Cluster::default(); grid.len()];
        for (idx, point) in scene.points.iter().enumerate() {
            clusters[grid.cell_of(&point.position)]
                .points
                .push(idx as u32);
        }

        info!(
            cells = grid.len(),
            cols = grid.cols(),
            rows = grid.rows(),
            occupied = clusters.iter().filter(|c| !c.points.is_empty()).count(),
            "partitioned point cloud"
        );

        Ok(Self {
            scene,
            grid,
            clusters,
        })
    }

    /// Run the sequential clustering stages: merge by point count, attach
    /// cameras, merge by camera count, prune void clusters.
    pub fn cluster_views(&mut self, params: &ClusterParams) {
        merge::merge_small_point_cells(&mut self.clusters, &self.grid, params.min_points);
        info!(
            occupied = self.clusters.iter().filter(|c| !c.points.is_empty()).count(),
            "merged undersized cells by point count"
        );

        visibility::assign_cameras(
            &mut self.clusters,
            self.scene,
            params.max_camera_distance,
            params.min_shared_points,
        );

        merge::merge_small_camera_cells(&mut self.clusters, &self.grid, params.min_cameras);

        self.clusters.retain(|c| !c.is_void());
        info!(clusters = self.clusters.len(), "pruned void clusters");
    }

    /// Rank source views for every cluster, one task per cluster.
    ///
    /// Each task reads its own cluster and the read-only scene and sends its
    /// ranking back over a channel keyed by cluster index, so results are
    /// independent of completion order and no locking is needed.
    pub fn compute_neighbors(
        &mut self,
        params: &ViewSelectionParams,
    ) -> Result<(), ClusteringError> {
        if params.num_neighbors == 0 {
            return Err(ClusteringError::ZeroNeighborCount);
        }

        let scene = self.scene;
        let (tx, rx) = crossbeam_channel::unbounded();

        std::thread::scope(|s| {
            for (idx, cluster) in self.clusters.iter().enumerate() {
                let tx = tx.clone();
                s.spawn(move || {
                    let ranked = view_selection::rank_sources(cluster, scene, params);
                    // The receiver outlives the scope; a send cannot fail.
                    let _ = tx.send((idx, ranked));
                });
            }
        });
        drop(tx);

        while let Ok((idx, ranked)) = rx.try_recv() {
            self.clusters[idx].neighbors = ranked;
        }

        info!(clusters = self.clusters.len(), "ranked source views");
        Ok(())
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn grid(&self) -> &GroundGrid {
        &self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Feature, Point, View, ViewId};
    use nalgebra::{Matrix3, Vector2, Vector3};

    /// A scene whose views all carry identity rotation, observing the listed
    /// point indices from the given centers.
    fn build_scene(positions: &[Vector3<f64>], views: &[(Vector3<f64>, Vec<u32>)]) -> Scene {
        let mut points: Vec<Point> = positions.iter().map(|p| Point::new(*p)).collect();
        let num_frames = views.len();
        let views: Vec<View> = views
            .iter()
            .enumerate()
            .map(|(i, (center, observed))| {
                let id = ViewId::new(i as u32);
                let mut view = View::new(id, Matrix3::identity(), *center);
                for (slot, &point_idx) in observed.iter().enumerate() {
                    view.features.push(Feature {
                        point_idx,
                        left: Vector2::zeros(),
                        right: Vector2::zeros(),
                    });
                    points[point_idx as usize].add_observation(id, slot as u32);
                }
                view
            })
            .collect();
        Scene {
            points,
            views,
            num_frames,
            num_sensors: 1,
            keyframes: (0..num_frames).collect(),
        }
    }

    fn loose_params() -> ClusterParams {
        ClusterParams {
            cell_size: 10.0,
            min_points: 1,
            min_cameras: 1,
            max_camera_distance: 1000.0,
            min_shared_points: 1,
        }
    }

    #[test]
    fn test_empty_scene_is_a_precondition_violation() {
        let scene = build_scene(&[], &[(Vector3::zeros(), vec![])]);
        assert!(matches!(
            ViewClustering::new(&scene, &loose_params()),
            Err(ClusteringError::EmptyPointCloud)
        ));
    }

    #[test]
    fn test_scene_without_views_is_rejected() {
        let scene = build_scene(&[Vector3::zeros()], &[]);
        assert!(matches!(
            ViewClustering::new(&scene, &loose_params()),
            Err(ClusteringError::EmptyViewTable)
        ));
    }

    #[test]
    fn test_partitioning_is_complete() {
        // A scatter of points; every one must land in exactly one cell.
        let positions: Vec<Vector3<f64>> = (0..37)
            .map(|i| {
                let f = i as f64;
                Vector3::new((f * 7.3) % 53.0, 0.0, (f * 3.1) % 41.0)
            })
            .collect();
        let scene = build_scene(&positions, &[(Vector3::zeros(), vec![0])]);

        let clustering = ViewClustering::new(&scene, &loose_params()).unwrap();

        let total: usize = clustering.clusters().iter().map(|c| c.num_points()).sum();
        assert_eq!(total, positions.len());

        let mut seen = vec![false; positions.len()];
        for c in clustering.clusters() {
            for &p in &c.points {
                assert!(!seen[p as usize], "point {p} assigned twice");
                seen[p as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_well_separated_points_stay_singletons() {
        // 2x2 grid of regions far apart relative to the cell size and a
        // permissive point threshold: no merging may occur.
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(100.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 100.0),
            Vector3::new(100.0, 0.0, 100.0),
        ];
        let scene = build_scene(&positions, &[(Vector3::zeros(), vec![0, 1, 2, 3])]);

        let mut clustering = ViewClustering::new(&scene, &loose_params()).unwrap();
        merge::merge_small_point_cells(&mut clustering.clusters, &clustering.grid, 1);

        let occupied: Vec<&Cluster> = clustering
            .clusters
            .iter()
            .filter(|c| !c.points.is_empty())
            .collect();
        assert_eq!(occupied.len(), 4);
        assert!(occupied.iter().all(|c| c.num_points() == 1));
    }

    #[test]
    fn test_merge_conserves_points() {
        let positions: Vec<Vector3<f64>> = (0..50)
            .map(|i| {
                let f = i as f64;
                Vector3::new((f * 13.7) % 97.0, 0.0, (f * 5.9) % 71.0)
            })
            .collect();
        let scene = build_scene(&positions, &[(Vector3::zeros(), vec![0])]);

        let mut clustering = ViewClustering::new(&scene, &loose_params()).unwrap();
        merge::merge_small_point_cells(&mut clustering.clusters, &clustering.grid, 4);

        let mut survivors: Vec<u32> = clustering
            .clusters
            .iter()
            .flat_map(|c| c.points.iter().copied())
            .collect();
        survivors.sort_unstable();
        let expected: Vec<u32> = (0..50).collect();
        assert_eq!(survivors, expected);
    }

    /// Two spatial groups, each observed by its own camera pair.
    fn two_region_scene() -> Scene {
        let mut positions = Vec::new();
        // Region A around the origin, region B around x = 500.
        for i in 0..20 {
            positions.push(Vector3::new((i % 5) as f64, 0.0, (i / 5) as f64));
        }
        for i in 0..20 {
            positions.push(Vector3::new(500.0 + (i % 5) as f64, 0.0, (i / 5) as f64));
        }
        let a: Vec<u32> = (0..20).collect();
        let b: Vec<u32> = (20..40).collect();

        build_scene(
            &positions,
            &[
                (Vector3::new(2.0, -1.0, -20.0), a.clone()),
                (Vector3::new(4.0, 1.0, -20.0), a),
                (Vector3::new(502.0, -1.0, -20.0), b.clone()),
                (Vector3::new(504.0, 1.0, -20.0), b),
            ],
        )
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let scene = two_region_scene();
        let params = ClusterParams {
            cell_size: 10.0,
            min_points: 5,
            min_cameras: 1,
            max_camera_distance: 1000.0,
            min_shared_points: 5,
        };

        let mut clustering = ViewClustering::new(&scene, &params).unwrap();
        clustering.cluster_views(&params);

        // One surviving cluster per region, each with its own camera pair.
        assert_eq!(clustering.clusters().len(), 2);
        for cluster in clustering.clusters() {
            assert_eq!(cluster.num_points(), 20);
            assert_eq!(cluster.num_cameras(), 2);
        }

        clustering
            .compute_neighbors(&ViewSelectionParams::default())
            .unwrap();

        for cluster in clustering.clusters() {
            assert_eq!(cluster.neighbors.len(), 2);
            for (ref_id, neighbors) in &cluster.neighbors {
                assert_eq!(neighbors.len(), 1);
                assert_ne!(neighbors[0].view, *ref_id);
                assert!(neighbors[0].score > 0.0);
                assert!(cluster.cameras.contains(&neighbors[0].view));
            }
        }
    }

    #[test]
    fn test_void_clusters_are_pruned() {
        // A far-away point that no camera observes: its cluster ends up with
        // points but no cameras and must be removed.
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(900.0, 0.0, 900.0),
        ];
        let scene = build_scene(
            &positions,
            &[
                (Vector3::new(0.0, 0.0, -10.0), vec![0, 1]),
                (Vector3::new(1.0, 0.0, -10.0), vec![0, 1]),
            ],
        );
        let params = ClusterParams {
            cell_size: 10.0,
            min_points: 1,
            min_cameras: 1,
            max_camera_distance: 1000.0,
            min_shared_points: 2,
        };

        let mut clustering = ViewClustering::new(&scene, &params).unwrap();
        clustering.cluster_views(&params);

        assert_eq!(clustering.clusters().len(), 1);
        assert_eq!(clustering.clusters()[0].num_points(), 2);
    }

    #[test]
    fn test_zero_neighbor_count_is_rejected() {
        let scene = two_region_scene();
        let mut clustering = ViewClustering::new(&scene, &loose_params()).unwrap();
        let params = ViewSelectionParams {
            num_neighbors: 0,
            ..Default::default()
        };
        assert!(matches!(
            clustering.compute_neighbors(&params),
            Err(ClusteringError::ZeroNeighborCount)
        ));
    }

    #[test]
    fn test_neighbor_lists_sorted_and_bounded() {
        let scene = two_region_scene();
        let params = ClusterParams {
            cell_size: 1000.0, // everything in one cluster
            min_points: 1,
            min_cameras: 1,
            max_camera_distance: 10000.0,
            min_shared_points: 1,
        };
        let selection = ViewSelectionParams {
            num_neighbors: 2,
            ..Default::default()
        };

        let mut clustering = ViewClustering::new(&scene, &params).unwrap();
        clustering.cluster_views(&params);
        clustering.compute_neighbors(&selection).unwrap();

        for cluster in clustering.clusters() {
            for neighbors in cluster.neighbors.values() {
                assert!(neighbors.len() <= selection.num_neighbors);
                for pair in neighbors.windows(2) {
                    assert!(pair[0].score >= pair[1].score);
                }
            }
        }
    }
}
