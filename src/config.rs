//! Run parameters, loaded from a JSON file.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::clustering::{ClusterParams, ViewSelectionParams};

fn default_min_shared_points() -> usize {
    10
}

fn default_num_neighbors() -> usize {
    10
}

fn default_theta_0() -> f64 {
    5.0
}

fn default_sigma_0() -> f64 {
    1.0
}

fn default_sigma_1() -> f64 {
    10.0
}

/// All knobs of a clustering run.
///
/// Path fields point at the dataset collaterals produced by the upstream
/// sparse reconstruction; the threshold fields feed the clustering and
/// view-selection stages.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameters {
    // Input / output locations
    pub points_file: PathBuf,
    pub features_file: PathBuf,
    pub poses_file: PathBuf,
    pub cameras_folder: PathBuf,
    pub images_folder: PathBuf,
    pub output_folder: PathBuf,

    /// Sensor names in rig order; index 0 is the reference sensor the
    /// trajectory is expressed in.
    pub sensors: Vec<String>,

    // Keyframe selection
    pub min_pose_distance: f64,

    // Depth range clamps
    pub min_depth: f64,
    pub max_depth: f64,

    // Clustering
    pub cell_size: f64,
    pub min_points: usize,
    pub min_cameras: usize,
    pub max_camera_distance: f64,
    #[serde(default = "default_min_shared_points")]
    pub min_shared_points: usize,

    // View selection
    #[serde(default = "default_num_neighbors")]
    pub num_neighbors: usize,
    #[serde(default = "default_theta_0")]
    pub theta_0: f64,
    #[serde(default = "default_sigma_0")]
    pub sigma_0: f64,
    #[serde(default = "default_sigma_1")]
    pub sigma_1: f64,
}

impl Parameters {
    /// Load and validate a parameter file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open parameter file {}", path.display()))?;
        let params: Parameters = serde_json::from_reader(file)
            .with_context(|| format!("failed to parse parameter file {}", path.display()))?;
        params.validate()?;
        Ok(params)
    }

    /// Reject parameter combinations the pipeline cannot run with. These are
    /// precondition violations: they fail the run before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            bail!("at least one sensor must be configured");
        }
        if self.cell_size <= 0.0 {
            bail!("cell_size must be positive, got {}", self.cell_size);
        }
        if self.num_neighbors == 0 {
            bail!("num_neighbors must be at least 1");
        }
        if self.sigma_0 <= 0.0 || self.sigma_1 <= 0.0 {
            bail!(
                "sigma_0 and sigma_1 must be positive, got {} and {}",
                self.sigma_0,
                self.sigma_1
            );
        }
        if self.max_camera_distance <= 0.0 {
            bail!(
                "max_camera_distance must be positive, got {}",
                self.max_camera_distance
            );
        }
        if self.min_pose_distance < 0.0 {
            bail!(
                "min_pose_distance must be non-negative, got {}",
                self.min_pose_distance
            );
        }
        Ok(())
    }

    pub fn num_sensors(&self) -> usize {
        self.sensors.len()
    }

    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            cell_size: self.cell_size,
            min_points: self.min_points,
            min_cameras: self.min_cameras,
            max_camera_distance: self.max_camera_distance,
            min_shared_points: self.min_shared_points,
        }
    }

    pub fn view_selection_params(&self) -> ViewSelectionParams {
        ViewSelectionParams {
            num_neighbors: self.num_neighbors,
            theta_0: self.theta_0,
            sigma_0: self.sigma_0,
            sigma_1: self.sigma_1,
        }
    }
}
