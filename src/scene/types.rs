//! Core id type for camera views.

/// Unique identifier for a camera view.
///
/// For a multi-sensor rig the id encodes both the sensor and the frame as
/// `sensor * num_frames + frame`, so a single integer addresses every view of
/// the sequence; single-sensor datasets degenerate to a plain frame index.
/// Ids serve as lightweight handles for cross-referencing without Arc/Rc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u32);

impl ViewId {
    /// Create a ViewId from its raw value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Compose an id from a sensor index and a frame index.
    pub fn from_parts(sensor: usize, frame: usize, num_frames: usize) -> Self {
        Self((sensor * num_frames + frame) as u32)
    }

    /// Sensor index this view belongs to.
    pub fn sensor(self, num_frames: usize) -> usize {
        self.0 as usize / num_frames
    }

    /// Frame index of this view within its sensor's sequence.
    pub fn frame(self, num_frames: usize) -> usize {
        self.0 as usize % num_frames
    }

    /// Position of this view in the flat view table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}", self.0)
    }
}
