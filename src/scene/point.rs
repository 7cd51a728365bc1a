//! 3D points and their feature tracks.

use nalgebra::Vector3;

use super::types::ViewId;

/// One observation of a point: the view that sees it and the slot of the
/// corresponding feature in that view's feature list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub view: ViewId,
    pub feature: u32,
}

/// A reconstructed 3D point with its observation track.
///
/// A point's identity is its index in the scene's point table. Indices are
/// referenced from clusters and feature lists, so the table is never
/// compacted; a point that lost all observations simply keeps an empty track.
#[derive(Debug, Clone)]
pub struct Point {
    pub position: Vector3<f64>,
    pub track: Vec<Observation>,
}

impl Point {
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            position,
            track: Vec::new(),
        }
    }

    /// Record that `view` observes this point at feature slot `feature`.
    pub fn add_observation(&mut self, view: ViewId, feature: u32) {
        self.track.push(Observation { view, feature });
    }
}
