//! COLMAP text-model export, one model per cluster.
//!
//! Produces the three standard files (`cameras.txt`, `images.txt`,
//! `points3D.txt`) under `cluster_{i}/COLMAP/` so each cluster can be fed to
//! COLMAP-compatible dense pipelines on its own. Color and reprojection
//! error are placeholders; the sparse stage upstream does not carry them
//! through.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::clustering::Cluster;
use crate::geometry::quaternion_from_rotation;
use crate::scene::{Scene, ViewId};

/// Placeholder color written for every exported point.
const POINT_COLOR: [u8; 3] = [128, 128, 128];
/// COLMAP's convention for an unknown reprojection error.
const UNKNOWN_ERROR: f64 = -1.0;

/// Write one COLMAP text model per cluster.
pub fn write_models(output: &Path, clusters: &[Cluster], scene: &Scene) -> Result<()> {
    for (i, cluster) in clusters.iter().enumerate() {
        let dir = output.join(format!("cluster_{i}")).join("COLMAP");
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

        fs::write(dir.join("cameras.txt"), cameras_text(scene))
            .with_context(|| format!("failed to write cameras.txt for cluster {i}"))?;
        fs::write(dir.join("images.txt"), images_text(cluster, scene))
            .with_context(|| format!("failed to write images.txt for cluster {i}"))?;
        fs::write(dir.join("points3D.txt"), points_text(cluster, scene))
            .with_context(|| format!("failed to write points3D.txt for cluster {i}"))?;
    }

    info!(clusters = clusters.len(), "wrote COLMAP models");
    Ok(())
}

/// One PINHOLE camera per sensor, calibration taken from its first frame.
fn cameras_text(scene: &Scene) -> String {
    let mut out = String::from("# List of cameras\n");
    for sensor in 0..scene.num_sensors {
        let view = scene.view(ViewId::from_parts(sensor, 0, scene.num_frames));
        let k = &view.intrinsics;
        let _ = writeln!(
            out,
            "{} PINHOLE {} {} {} {} {} {}",
            sensor,
            view.width,
            view.height,
            k[(0, 0)],
            k[(1, 1)],
            k[(0, 2)],
            k[(1, 2)]
        );
    }
    out
}

/// Image records for every view of the cluster: pose line, then the
/// `x y point_id` observation triples.
fn images_text(cluster: &Cluster, scene: &Scene) -> String {
    let mut out = String::from("# List of images\n");
    for &id in &cluster.cameras {
        let view = scene.view(id);
        let q = quaternion_from_rotation(&view.rotation);
        let c = &view.center;
        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {} {} {} {}",
            id.0,
            q.w,
            q.i,
            q.j,
            q.k,
            c.x,
            c.y,
            c.z,
            id.sensor(scene.num_frames),
            view.filename
        );

        let mut first = true;
        for f in &view.features {
            if !first {
                out.push(' ');
            }
            let _ = write!(out, "{} {} {}", f.left.x, f.left.y, f.point_idx);
            first = false;
        }
        out.push('\n');
    }
    out
}

/// Point records with their observation tracks.
fn points_text(cluster: &Cluster, scene: &Scene) -> String {
    let mut out = String::from("# List of points\n");
    for &point_idx in &cluster.points {
        let point = &scene.points[point_idx as usize];
        let p = &point.position;
        let _ = write!(
            out,
            "{} {} {} {} {} {} {} {}",
            point_idx,
            p.x,
            p.y,
            p.z,
            POINT_COLOR[0],
            POINT_COLOR[1],
            POINT_COLOR[2],
            UNKNOWN_ERROR
        );
        for obs in &point.track {
            let _ = write!(out, " {} {}", obs.view.0, obs.feature);
        }
        out.push('\n');
    }
    out
}
