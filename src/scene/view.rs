//! Camera views: extrinsics, intrinsics and the per-view feature list.

use nalgebra::{Matrix3, Vector2, Vector3};

use super::types::ViewId;

/// A 2D feature detection tied to a reconstructed point.
///
/// Stereo rigs carry both the left and right pixel; mono sequences leave the
/// right coordinates at zero.
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    /// Index of the observed point in the scene's point table.
    pub point_idx: u32,
    pub left: Vector2<f64>,
    pub right: Vector2<f64>,
}

/// A single camera view (one sensor at one frame).
///
/// Extrinsics follow the camera-center convention documented in
/// [`crate::geometry`]: `rotation` maps camera to world and `center` is the
/// camera position in world coordinates.
#[derive(Debug, Clone)]
pub struct View {
    pub id: ViewId,

    /// Camera-to-world rotation.
    pub rotation: Matrix3<f64>,
    /// Camera center in world coordinates.
    pub center: Vector3<f64>,

    /// Pinhole calibration matrix.
    pub intrinsics: Matrix3<f64>,
    pub width: u32,
    pub height: u32,

    /// Features detected in this view, in file order.
    pub features: Vec<Feature>,

    /// Usable depth range derived from the observed points.
    pub min_depth: f64,
    pub max_depth: f64,

    /// Image path, owned by the I/O layer; opaque to the clustering core.
    pub filename: String,
}

impl View {
    /// Create a view with the given pose and neutral calibration; intrinsics,
    /// features and depth range are filled in by the loader.
    pub fn new(id: ViewId, rotation: Matrix3<f64>, center: Vector3<f64>) -> Self {
        Self {
            id,
            rotation,
            center,
            intrinsics: Matrix3::identity(),
            width: 0,
            height: 0,
            features: Vec::new(),
            min_depth: 0.0,
            max_depth: f64::INFINITY,
            filename: String::new(),
        }
    }

    /// Sorted, de-duplicated indices of the points this view observes.
    pub fn observed_points(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.features.iter().map(|f| f.point_idx).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(point_idx: u32) -> Feature {
        Feature {
            point_idx,
            left: Vector2::zeros(),
            right: Vector2::zeros(),
        }
    }

    #[test]
    fn test_observed_points_sorted_and_deduped() {
        let mut view = View::new(ViewId::new(0), Matrix3::identity(), Vector3::zeros());
        view.features = vec![feature(5), feature(1), feature(5), feature(3)];

        assert_eq!(view.observed_points(), vec![1, 3, 5]);
    }
}
