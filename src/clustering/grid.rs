//! Uniform ground-plane grid over the point cloud.
//!
//! The reconstruction's vertical axis is y, so cells tile the (x, z) plane.
//! The grid is derived from the cloud's bounding range and a cell size; it is
//! never persisted. Cells map to linear indices row-major
//! (`row * cols + col`), and adjacency is computed through an explicit
//! (row, col) mapping so neighbor queries can never wrap across row
//! boundaries.

use nalgebra::Vector3;

use crate::scene::Point;

use super::ClusteringError;

/// Guards a point lying exactly on the minimum boundary from mapping to a
/// negative cell coordinate.
const BOUNDARY_EPSILON: f64 = 0.01;

/// A uniform grid of square cells over the ground plane.
#[derive(Debug, Clone)]
pub struct GroundGrid {
    x_min: f64,
    z_min: f64,
    cell_size: f64,
    cols: usize,
    rows: usize,
}

impl GroundGrid {
    /// Build a grid with explicit bounds and dimensions.
    pub fn new(x_min: f64, z_min: f64, cell_size: f64, cols: usize, rows: usize) -> Self {
        Self {
            x_min,
            z_min,
            cell_size,
            cols,
            rows,
        }
    }

    /// Derive the grid covering the bounding range of `points`.
    ///
    /// Fails on an empty cloud (the bounding range would be undefined) and on
    /// a non-positive cell size; both are precondition violations the caller
    /// must not silently absorb.
    pub fn from_points(points: &[Point], cell_size: f64) -> Result<Self, ClusteringError> {
        if points.is_empty() {
            return Err(ClusteringError::EmptyPointCloud);
        }
        if cell_size <= 0.0 {
            return Err(ClusteringError::NonPositiveCellSize(cell_size));
        }

        let first = points[0].position;
        let (mut x_min, mut x_max) = (first.x, first.x);
        let (mut z_min, mut z_max) = (first.z, first.z);
        for p in &points[1..] {
            x_min = x_min.min(p.position.x);
            x_max = x_max.max(p.position.x);
            z_min = z_min.min(p.position.z);
            z_max = z_max.max(p.position.z);
        }

        let cols = (((x_max - x_min) / cell_size).ceil() as usize).max(1);
        let rows = (((z_max - z_min) / cell_size).ceil() as usize).max(1);

        tracing::debug!(
            x_min,
            x_max,
            z_min,
            z_max,
            cols,
            rows,
            "derived ground grid from point cloud range"
        );

        Ok(Self::new(x_min, z_min, cell_size, cols, rows))
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear cell index of a world position.
    ///
    /// Every position inside the bounding range maps to a valid cell; the
    /// maximum boundary is clamped into the last row/column so no point is
    /// ever dropped.
    pub fn cell_of(&self, position: &Vector3<f64>) -> usize {
        let col = ((position.x - self.x_min + BOUNDARY_EPSILON) / self.cell_size).floor() as usize;
        let row = ((position.z - self.z_min + BOUNDARY_EPSILON) / self.cell_size).floor() as usize;
        let col = col.min(self.cols - 1);
        let row = row.min(self.rows - 1);
        row * self.cols + col
    }

    /// Linear indices of the up-to-8 grid-adjacent cells, in a fixed
    /// enumeration order (row above left-to-right, same row, row below).
    ///
    /// The (row, col) arithmetic excludes out-of-range cells and keeps a cell
    /// in column 0 from being treated as adjacent to the last column of a
    /// neighboring row.
    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        const OFFSETS: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];

        let row = (index / self.cols) as isize;
        let col = (index % self.cols) as isize;

        let mut adjacent = Vec::with_capacity(8);
        for (dr, dc) in OFFSETS {
            let r = row + dr;
            let c = col + dc;
            if r < 0 || r >= self.rows as isize || c < 0 || c >= self.cols as isize {
                continue;
            }
            adjacent.push(r as usize * self.cols + c as usize);
        }
        adjacent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, z: f64) -> Point {
        Point::new(Vector3::new(x, 0.0, z))
    }

    #[test]
    fn test_empty_cloud_is_rejected() {
        let err = GroundGrid::from_points(&[], 5.0).unwrap_err();
        assert!(matches!(err, ClusteringError::EmptyPointCloud));
    }

    #[test]
    fn test_non_positive_cell_size_is_rejected() {
        let pts = vec![point(0.0, 0.0)];
        assert!(matches!(
            GroundGrid::from_points(&pts, 0.0),
            Err(ClusteringError::NonPositiveCellSize(_))
        ));
        assert!(matches!(
            GroundGrid::from_points(&pts, -2.0),
            Err(ClusteringError::NonPositiveCellSize(_))
        ));
    }

    #[test]
    fn test_degenerate_extent_still_one_cell() {
        let pts = vec![point(3.0, 7.0), point(3.0, 7.0)];
        let grid = GroundGrid::from_points(&pts, 5.0).unwrap();
        assert_eq!((grid.cols(), grid.rows()), (1, 1));
        assert_eq!(grid.cell_of(&pts[0].position), 0);
    }

    #[test]
    fn test_cell_assignment_row_major() {
        let pts = vec![point(0.0, 0.0), point(19.0, 9.0)];
        let grid = GroundGrid::from_points(&pts, 10.0).unwrap();
        assert_eq!((grid.cols(), grid.rows()), (2, 1));
        assert_eq!(grid.cell_of(&Vector3::new(1.0, 0.0, 1.0)), 0);
        assert_eq!(grid.cell_of(&Vector3::new(15.0, 0.0, 1.0)), 1);
    }

    #[test]
    fn test_max_boundary_clamps_into_grid() {
        // Extent is an exact multiple of the cell size; the epsilon would
        // otherwise push the max corner one column past the end.
        let pts = vec![point(0.0, 0.0), point(10.0, 10.0)];
        let grid = GroundGrid::from_points(&pts, 5.0).unwrap();
        assert_eq!((grid.cols(), grid.rows()), (2, 2));
        let idx = grid.cell_of(&Vector3::new(10.0, 0.0, 10.0));
        assert!(idx < grid.len());
        assert_eq!(idx, grid.len() - 1);
    }

    #[test]
    fn test_interior_cell_has_eight_neighbors() {
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 3, 3);
        let n = grid.neighbors(4);
        assert_eq!(n, vec![0, 1, 2, 3, 5, 6, 7, 8]);
    }

    #[test]
    fn test_corner_cell_has_three_neighbors() {
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 3, 3);
        assert_eq!(grid.neighbors(0), vec![1, 3, 4]);
        assert_eq!(grid.neighbors(8), vec![4, 5, 7]);
    }

    #[test]
    fn test_no_horizontal_wrap() {
        // Column 0 of any row must never see column cols-1 of the same row,
        // and vice versa.
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 4, 3);
        let left_edge = 4; // row 1, col 0
        let right_edge = 7; // row 1, col 3
        assert!(!grid.neighbors(left_edge).contains(&right_edge));
        assert!(!grid.neighbors(right_edge).contains(&left_edge));
        // Diagonal wrap across row boundaries is excluded as well.
        assert!(!grid.neighbors(left_edge).contains(&3));
        assert!(!grid.neighbors(left_edge).contains(&11));
    }

    #[test]
    fn test_single_row_neighbors() {
        let grid = GroundGrid::new(0.0, 0.0, 1.0, 5, 1);
        assert_eq!(grid.neighbors(0), vec![1]);
        assert_eq!(grid.neighbors(2), vec![1, 3]);
        assert_eq!(grid.neighbors(4), vec![3]);
    }
}
