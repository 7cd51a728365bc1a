use std::time::Instant;

use anyhow::Result;

use view_clustering::clustering::ViewClustering;
use view_clustering::config::Parameters;
use view_clustering::io::{colmap, dataset, patchmatch};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    println!("Loading parameters from: {config_path}");
    let params = Parameters::load(&config_path)?;

    println!("Loading input dataset...");
    let scene = dataset::load_scene(&params)?;
    scene.check_non_empty()?;
    println!(
        "Loaded {} points, {} keyframes ({} sensors, {} frames)",
        scene.num_points(),
        scene.keyframes.len(),
        scene.num_sensors,
        scene.num_frames
    );

    println!("Clustering points and cameras...");
    let start = Instant::now();
    let cluster_params = params.cluster_params();
    let mut clustering = ViewClustering::new(&scene, &cluster_params)?;
    clustering.cluster_views(&cluster_params);
    println!(
        "Built {} clusters in {:.3} s",
        clustering.clusters().len(),
        start.elapsed().as_secs_f64()
    );

    println!("Ranking source views for each cluster (this may take a while)...");
    let start = Instant::now();
    clustering.compute_neighbors(&params.view_selection_params())?;
    println!(
        "Ranked source views in {:.3} s",
        start.elapsed().as_secs_f64()
    );

    println!("Writing per-cluster camera and pair files...");
    patchmatch::write_clusters(&params.output_folder, clustering.clusters(), &scene)?;

    println!("Writing COLMAP models...");
    colmap::write_models(&params.output_folder, clustering.clusters(), &scene)?;

    println!("Done!");
    Ok(())
}
