//! Absorption of undersized grid cells into their smallest neighbor.
//!
//! Both passes are a single forward sweep over the cluster array, not a
//! fixpoint: a cell that absorbed a neighbor is not revisited even if it is
//! still under threshold afterwards. Downstream size guarantees are
//! probabilistic, and the sweep keeps the pass linear in the number of cells.

use super::cluster::Cluster;
use super::grid::GroundGrid;

/// Merge every non-empty cell with fewer than `min_points` points into its
/// least-populated non-empty grid neighbor.
///
/// An undersized cell with no qualifying neighbor is isolated and simply
/// discarded; in every case the source cell ends the pass empty.
pub fn merge_small_point_cells(clusters: &mut [Cluster], grid: &GroundGrid, min_points: usize) {
    for i in 0..clusters.len() {
        let count = clusters[i].points.len();
        if count == 0 || count >= min_points {
            continue;
        }

        let mut target: Option<usize> = None;
        for j in grid.neighbors(i) {
            if clusters[j].points.is_empty() {
                continue;
            }
            // First qualifying neighbor wins ties.
            match target {
                Some(t) if clusters[j].points.len() >= clusters[t].points.len() => {}
                _ => target = Some(j),
            }
        }

        let absorbed = std::mem::take(&mut clusters[i].points);
        if let Some(t) = target {
            clusters[t].points.extend(absorbed);
        }
    }
}

/// Merge every cell with fewer than `min_cameras` cameras (and a non-empty
/// point set) into the neighbor with the fewest cameras.
///
/// Unlike the point pass, the absorbing neighbor receives both the camera set
/// and the point set, so the merged cell remains self-contained for view
/// selection. The source cell is cleared either way.
pub fn merge_small_camera_cells(clusters: &mut [Cluster], grid: &GroundGrid, min_cameras: usize) {
    for i in 0..clusters.len() {
        let count = clusters[i].cameras.len();
        if count == 0 || count >= min_cameras || clusters[i].points.is_empty() {
            continue;
        }

        let mut target: Option<usize> = None;
        for j in grid.neighbors(i) {
            if clusters[j].points.is_empty() || clusters[j].cameras.is_empty() {
                continue;
            }
            match target {
                Some(t) if clusters[j].cameras.len() >= clusters[t].cameras.len() => {}
                _ => target = Some(j),
            }
        }

        let absorbed_points = std::mem::take(&mut clusters[i].points);
        let absorbed_cameras = std::mem::take(&mut clusters[i].cameras);
        if let Some(t) = target {
            clusters[t].points.extend(absorbed_points);
            clusters[t].cameras.extend(absorbed_cameras);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ViewId;

    fn cluster_with_points(points: &[u32]) -> Cluster {
        Cluster {
            points: points.to_vec(),
            ..Default::default()
        }
    }

    fn total_points(clusters: &[Cluster]) -> usize {
        clusters.iter().map(|c| c.points.len()).sum()
    }

    #[test]
    fn test_undersized_cell_merges_into_smallest_neighbor() {
        // 3x3 grid, center cell has 1 point, neighbors have 3..10.
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 3, 3);
        let mut clusters: Vec<Cluster> = vec![
            cluster_with_points(&[0, 1, 2, 3]),
            cluster_with_points(&[4, 5, 6, 7, 8]),
            cluster_with_points(&[9, 10, 11, 12]),
            cluster_with_points(&[13, 14, 15]), // smallest neighbor of the center
            cluster_with_points(&[16]),         // center, undersized
            cluster_with_points(&[17, 18, 19, 20]),
            cluster_with_points(&[21, 22, 23, 24]),
            cluster_with_points(&[25, 26, 27, 28, 29]),
            cluster_with_points(&[30, 31, 32, 33]),
        ];
        let before = total_points(&clusters);

        merge_small_point_cells(&mut clusters, &grid, 2);

        assert!(clusters[4].points.is_empty());
        assert_eq!(clusters[3].points, vec![13, 14, 15, 16]);
        assert_eq!(total_points(&clusters), before);
    }

    #[test]
    fn test_isolated_undersized_cell_is_discarded() {
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 3, 1);
        let mut clusters = vec![
            cluster_with_points(&[0]),
            Cluster::default(),
            Cluster::default(),
        ];

        merge_small_point_cells(&mut clusters, &grid, 2);

        assert!(clusters.iter().all(|c| c.points.is_empty()));
    }

    #[test]
    fn test_cell_at_threshold_is_untouched() {
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 2, 1);
        let mut clusters = vec![cluster_with_points(&[0, 1]), cluster_with_points(&[2, 3, 4])];

        merge_small_point_cells(&mut clusters, &grid, 2);

        assert_eq!(clusters[0].points, vec![0, 1]);
    }

    #[test]
    fn test_single_pass_does_not_revisit_merge_targets() {
        // Cell 0 (1 point) merges into cell 1 (1 point). Cell 1 is then
        // examined later in the same sweep with its absorbed contents; at 2
        // points it now meets the threshold and stays.
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 3, 1);
        let mut clusters = vec![
            cluster_with_points(&[0]),
            cluster_with_points(&[1]),
            Cluster::default(),
        ];

        merge_small_point_cells(&mut clusters, &grid, 2);

        assert!(clusters[0].points.is_empty());
        assert_eq!(clusters[1].points, vec![1, 0]);
    }

    #[test]
    fn test_forward_chain_keeps_moving_in_one_pass() {
        // Cell 0 merges into cell 1; cell 1, still undersized when the sweep
        // reaches it, moves everything on into cell 2. The heuristic is a
        // forward sweep, so this chain is expected, not a bug.
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 3, 1);
        let mut clusters = vec![
            cluster_with_points(&[0]),
            cluster_with_points(&[1]),
            cluster_with_points(&[2, 3, 4]),
        ];

        merge_small_point_cells(&mut clusters, &grid, 3);

        assert!(clusters[0].points.is_empty());
        assert!(clusters[1].points.is_empty());
        assert_eq!(clusters[2].points, vec![2, 3, 4, 1, 0]);
    }

    #[test]
    fn test_camera_merge_moves_points_and_cameras() {
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 2, 1);
        let mut clusters = vec![Cluster::default(), Cluster::default()];

        clusters[0].points = vec![0, 1];
        clusters[0].cameras.insert(ViewId::new(0));

        clusters[1].points = vec![2, 3];
        clusters[1].cameras.extend([ViewId::new(0), ViewId::new(1), ViewId::new(2)]);

        merge_small_camera_cells(&mut clusters, &grid, 2);

        assert!(clusters[0].points.is_empty());
        assert!(clusters[0].cameras.is_empty());
        assert_eq!(clusters[1].points, vec![2, 3, 0, 1]);
        // Camera sets union with de-duplication.
        assert_eq!(clusters[1].num_cameras(), 3);
    }

    #[test]
    fn test_camera_merge_skips_cells_without_points() {
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 2, 1);
        let mut clusters = vec![Cluster::default(), Cluster::default()];

        // Cameras but no points: not a candidate for this pass.
        clusters[0].cameras.insert(ViewId::new(0));
        clusters[1].points = vec![0];
        clusters[1].cameras.extend([ViewId::new(1), ViewId::new(2)]);

        merge_small_camera_cells(&mut clusters, &grid, 2);

        assert_eq!(clusters[0].num_cameras(), 1);
        assert_eq!(clusters[1].num_cameras(), 2);
    }
}
