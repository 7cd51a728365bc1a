//! Reconstructed scene: the immutable point and view tables consumed by the
//! clustering pipeline.
//!
//! Points and views are populated once by the dataset loader and are read-only
//! afterwards; clustering only ever references them by index/id.

pub mod point;
pub mod types;
pub mod view;

pub use point::{Observation, Point};
pub use types::ViewId;
pub use view::{Feature, View};

use anyhow::{bail, Result};

/// The full reconstructed scene: a point cloud with feature tracks and the
/// camera views observing it.
///
/// Views are stored flat, indexed by [`ViewId`] (`sensor * num_frames + frame`).
/// Only frames selected as keyframes carry feature tracks; the other views
/// stay in the table so ids remain dense and stable.
#[derive(Debug, Clone)]
pub struct Scene {
    pub points: Vec<Point>,
    pub views: Vec<View>,
    /// Number of frames per sensor in the input sequence.
    pub num_frames: usize,
    /// Number of physical sensors in the rig.
    pub num_sensors: usize,
    /// Frame indices that survived keyframe selection, ascending.
    pub keyframes: Vec<usize>,
}

impl Scene {
    /// Look up a view by id.
    ///
    /// Ids are produced by this crate from in-range sensor/frame pairs, so an
    /// out-of-range id is a construction bug, not a runtime condition.
    pub fn view(&self, id: ViewId) -> &View {
        &self.views[id.index()]
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Reject scenes the clustering core cannot operate on.
    pub fn check_non_empty(&self) -> Result<()> {
        if self.points.is_empty() {
            bail!("scene has an empty point table");
        }
        if self.views.is_empty() {
            bail!("scene has an empty view table");
        }
        Ok(())
    }
}
