//! Per-cluster camera and pair files for PatchMatchNet/ACMM-style MVS tools.
//!
//! Layout under the output folder, one directory per surviving cluster:
//!
//! ```text
//! cluster_{i}/cams/{view_id:08}.txt   extrinsic, intrinsic, depth range, image
//! cluster_{i}/pair.txt                ranked source views per reference view
//! ```
//!
//! Field order and whitespace follow the format the downstream tools parse;
//! changes here break interoperability, not just aesthetics.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::clustering::Cluster;
use crate::scene::{Scene, View};

/// Write camera and pair files for every cluster.
pub fn write_clusters(output: &Path, clusters: &[Cluster], scene: &Scene) -> Result<()> {
    for (i, cluster) in clusters.iter().enumerate() {
        let cluster_dir = output.join(format!("cluster_{i}"));
        let cams_dir = cluster_dir.join("cams");
        fs::create_dir_all(&cams_dir)
            .with_context(|| format!("failed to create {}", cams_dir.display()))?;

        for &id in &cluster.cameras {
            let path = cams_dir.join(format!("{:08}.txt", id.0));
            fs::write(&path, camera_file_text(scene.view(id)))
                .with_context(|| format!("failed to write camera file {}", path.display()))?;
        }

        let pair_path = cluster_dir.join("pair.txt");
        fs::write(&pair_path, pair_file_text(cluster))
            .with_context(|| format!("failed to write {}", pair_path.display()))?;
    }

    info!(clusters = clusters.len(), "wrote camera and pair files");
    Ok(())
}

/// One camera record: homogeneous extrinsic, intrinsic, depth range, image.
fn camera_file_text(view: &View) -> String {
    let r = &view.rotation;
    let c = &view.center;
    let k = &view.intrinsics;

    let mut out = String::new();
    out.push_str("extrinsic\n");
    for row in 0..3 {
        let _ = writeln!(
            out,
            "{} {} {} {}",
            r[(row, 0)],
            r[(row, 1)],
            r[(row, 2)],
            c[row]
        );
    }
    out.push_str("0 0 0 1\n\n");

    out.push_str("intrinsic\n");
    for row in 0..3 {
        let _ = writeln!(out, "{} {} {}", k[(row, 0)], k[(row, 1)], k[(row, 2)]);
    }
    out.push('\n');

    let _ = writeln!(out, "{} {}", view.min_depth, view.max_depth);
    out.push('\n');

    out.push_str(&view.filename);
    out.push('\n');
    out
}

/// The pair listing: camera count, then per reference view its id and a
/// `count id score ...` line in ranked order.
fn pair_file_text(cluster: &Cluster) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", cluster.num_cameras());

    for &id in &cluster.cameras {
        let _ = writeln!(out, "{}", id.0);

        let neighbors = cluster.neighbors.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        let _ = write!(out, "{}", neighbors.len());
        for n in neighbors {
            let _ = write!(out, " {} {}", n.view.0, n.score);
        }
        out.push('\n');
    }
    out
}
