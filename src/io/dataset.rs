//! Input dataset loader.
//!
//! The upstream sparse reconstruction hands over four collaterals: an ASCII
//! point list, a binary feature stream, an ASCII trajectory for the reference
//! sensor and one JSON calibration file per sensor. The loader assembles them
//! into a [`Scene`], selects keyframes by pose distance, builds the
//! point-to-view feature tracks and derives per-view depth ranges.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use nalgebra::{Matrix3, Vector2, Vector3};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Parameters;
use crate::geometry::{pose_distance, rotation_from_euler, world_to_camera};
use crate::scene::{Feature, Point, Scene, View, ViewId};

/// Per-sensor calibration file: pinhole intrinsics plus the 6-DoF rig
/// extrinsic (position and roll/pitch/yaw) of the sensor.
#[derive(Debug, Deserialize)]
struct CalibrationFile {
    params: IntrinsicsJson,
    position: [f64; 6],
}

#[derive(Debug, Deserialize)]
struct IntrinsicsJson {
    ku: f64,
    kv: f64,
    u0: f64,
    v0: f64,
    w: u32,
    h: u32,
}

struct SensorCalibration {
    intrinsics: Matrix3<f64>,
    width: u32,
    height: u32,
    rotation: Matrix3<f64>,
    position: Vector3<f64>,
}

/// Load the full scene described by `params`.
pub fn load_scene(params: &Parameters) -> Result<Scene> {
    let num_sensors = params.num_sensors();

    let mut points = load_points(&params.points_file)?;
    info!(points = points.len(), "loaded point cloud");

    let (num_frames, mut feature_table) =
        load_features(&params.features_file, num_sensors, points.len())?;
    info!(frames = num_frames, "loaded feature stream");

    let poses = load_poses(&params.poses_file, num_frames)?;
    let calibrations = load_calibrations(params)?;

    let mut views = assemble_views(params, &poses, &calibrations, &mut feature_table, num_frames);

    let centers: Vec<Vector3<f64>> = (0..num_frames)
        .map(|frame| views[ViewId::from_parts(0, frame, num_frames).index()].center)
        .collect();
    let keyframes = select_keyframes(&centers, params.min_pose_distance);
    info!(
        keyframes = keyframes.len(),
        frames = num_frames,
        "selected keyframes by pose distance"
    );

    build_feature_tracks(&mut points, &views, &keyframes, num_sensors, num_frames);
    compute_depth_ranges(&mut views, &points, &keyframes, num_sensors, num_frames, params);

    Ok(Scene {
        points,
        views,
        num_frames,
        num_sensors,
        keyframes,
    })
}

/// ASCII point list: a count header, then `id x y z color valid` per line.
/// Ids index the table directly and stay authoritative for the whole run.
fn load_points(path: &Path) -> Result<Vec<Point>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open points file {}", path.display()))?;

    let mut records = reader.records();
    let header = records
        .next()
        .context("points file is empty")?
        .context("failed to read points header")?;
    let num_points: usize = non_empty_fields(&header)
        .first()
        .context("points header has no count")?
        .parse()
        .context("invalid point count in header")?;

    let mut points = vec![Point::new(Vector3::zeros()); num_points];
    for record in records {
        let record = record?;
        let fields = non_empty_fields(&record);
        if fields.len() < 4 {
            continue;
        }
        let id: usize = fields[0].parse()?;
        if id >= num_points {
            warn!(id, num_points, "point id outside declared count, skipping");
            continue;
        }
        let x: f64 = fields[1].parse()?;
        let y: f64 = fields[2].parse()?;
        let z: f64 = fields[3].parse()?;
        points[id] = Point::new(Vector3::new(x, y, z));
    }

    Ok(points)
}

fn non_empty_fields(record: &csv::StringRecord) -> Vec<&str> {
    record
        .iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

/// Binary feature stream, little-endian:
/// u64 feature count, u32 frame count, u32 observation count, then per
/// feature `u32 point id, u32 color, 2xf32 left pixel, 2xf32 right pixel,
/// u32 sensor, u32 frame`.
fn load_features(
    path: &Path,
    num_sensors: usize,
    num_points: usize,
) -> Result<(usize, Vec<Vec<Vec<Feature>>>)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open features file {}", path.display()))?;
    read_features(BufReader::new(file), num_sensors, num_points)
        .with_context(|| format!("malformed features file {}", path.display()))
}

fn read_features(
    mut r: impl Read,
    num_sensors: usize,
    num_points: usize,
) -> Result<(usize, Vec<Vec<Vec<Feature>>>)> {
    let num_features = read_u64(&mut r)? as usize;
    let num_frames = read_u32(&mut r)? as usize;
    let _num_observations = read_u32(&mut r)?;

    if num_frames == 0 {
        bail!("feature stream declares zero frames");
    }

    // feature_table[frame][sensor]
    let mut table = vec![vec![Vec::new(); num_sensors]; num_frames];
    let mut dropped = 0usize;
    for _ in 0..num_features {
        let point_idx = read_u32(&mut r)?;
        let _color = read_u32(&mut r)?;
        let left = Vector2::new(read_f32(&mut r)? as f64, read_f32(&mut r)? as f64);
        let right = Vector2::new(read_f32(&mut r)? as f64, read_f32(&mut r)? as f64);
        let sensor = read_u32(&mut r)? as usize;
        let frame = read_u32(&mut r)? as usize;

        if sensor >= num_sensors || frame >= num_frames {
            bail!(
                "feature references sensor {} frame {} outside the rig ({} sensors, {} frames)",
                sensor,
                frame,
                num_sensors,
                num_frames
            );
        }
        if point_idx as usize >= num_points {
            dropped += 1;
            continue;
        }

        table[frame][sensor].push(Feature {
            point_idx,
            left,
            right,
        });
    }

    if dropped > 0 {
        warn!(dropped, "dropped features referencing unknown points");
    }

    Ok((num_frames, table))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32(r: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Reference-sensor trajectory: one pose per line as a row-major `[R | c]`
/// 3x4 matrix, camera-to-world rotation and camera center.
fn load_poses(path: &Path, num_frames: usize) -> Result<Vec<(Matrix3<f64>, Vector3<f64>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open trajectory file {}", path.display()))?;

    let mut poses = Vec::with_capacity(num_frames);
    for record in reader.records() {
        let record = record?;
        let fields = non_empty_fields(&record);
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 12 {
            bail!(
                "trajectory line {} has {} fields, expected 12",
                poses.len(),
                fields.len()
            );
        }
        let v: Vec<f64> = fields[..12]
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("invalid number in trajectory line {}", poses.len()))?;

        let rotation = Matrix3::new(v[0], v[1], v[2], v[4], v[5], v[6], v[8], v[9], v[10]);
        let center = Vector3::new(v[3], v[7], v[11]);
        poses.push((rotation, center));

        if poses.len() == num_frames {
            break;
        }
    }

    if poses.len() < num_frames {
        bail!(
            "trajectory has {} poses, feature stream declares {} frames",
            poses.len(),
            num_frames
        );
    }
    Ok(poses)
}

fn load_calibrations(params: &Parameters) -> Result<Vec<SensorCalibration>> {
    params
        .sensors
        .iter()
        .map(|name| {
            let path = params.cameras_folder.join(format!("{name}.json"));
            let file = File::open(&path)
                .with_context(|| format!("failed to open calibration file {}", path.display()))?;
            let cal: CalibrationFile = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse calibration file {}", path.display()))?;

            let k = &cal.params;
            let intrinsics = Matrix3::new(k.ku, 0.0, k.u0, 0.0, k.kv, k.v0, 0.0, 0.0, 1.0);
            let [x, y, z, roll, pitch, yaw] = cal.position;

            Ok(SensorCalibration {
                intrinsics,
                width: k.w,
                height: k.h,
                rotation: rotation_from_euler(roll, pitch, yaw),
                position: Vector3::new(x, y, z),
            })
        })
        .collect()
}

/// Build the flat view table from the trajectory and the rig calibration.
///
/// The trajectory covers the reference sensor; other sensors are placed by
/// composing their rig offset (relative to the reference sensor's mount)
/// with the per-frame reference pose.
fn assemble_views(
    params: &Parameters,
    poses: &[(Matrix3<f64>, Vector3<f64>)],
    calibrations: &[SensorCalibration],
    feature_table: &mut [Vec<Vec<Feature>>],
    num_frames: usize,
) -> Vec<View> {
    let num_sensors = calibrations.len();
    let reference = &calibrations[0];

    let mut views = Vec::with_capacity(num_sensors * num_frames);
    for (sensor, cal) in calibrations.iter().enumerate() {
        // Rig offset of this sensor in the reference sensor's frame.
        let rel_rotation = reference.rotation.transpose() * cal.rotation;
        let rel_position = reference.rotation.transpose() * (cal.position - reference.position);

        for frame in 0..num_frames {
            let id = ViewId::from_parts(sensor, frame, num_frames);
            let (ref_rotation, ref_center) = poses[frame];

            let (rotation, center) = if sensor == 0 {
                (ref_rotation, ref_center)
            } else {
                (rel_rotation * ref_rotation, ref_center + rel_position)
            };

            let mut view = View::new(id, rotation, center);
            view.intrinsics = cal.intrinsics;
            view.width = cal.width;
            view.height = cal.height;
            view.features = std::mem::take(&mut feature_table[frame][sensor]);
            view.filename = params
                .images_folder
                .join(&params.sensors[sensor])
                .join(format!("{frame:08}.jpg"))
                .to_string_lossy()
                .into_owned();
            views.push(view);
        }
    }
    views
}

/// Greedy keyframe selection: keep frame 0, then every frame farther than
/// `min_distance` from the last kept one.
fn select_keyframes(centers: &[Vector3<f64>], min_distance: f64) -> Vec<usize> {
    let mut kept = Vec::new();
    let mut prev = match centers.first() {
        Some(_) => {
            kept.push(0);
            0
        }
        None => return kept,
    };

    for i in 1..centers.len() {
        if pose_distance(&centers[prev], &centers[i]) > min_distance {
            prev = i;
            kept.push(i);
        }
    }
    kept
}

/// Record `(view, feature slot)` on every point observed from a keyframe.
fn build_feature_tracks(
    points: &mut [Point],
    views: &[View],
    keyframes: &[usize],
    num_sensors: usize,
    num_frames: usize,
) {
    for &frame in keyframes {
        for sensor in 0..num_sensors {
            let id = ViewId::from_parts(sensor, frame, num_frames);
            for (slot, feature) in views[id.index()].features.iter().enumerate() {
                points[feature.point_idx as usize].add_observation(id, slot as u32);
            }
        }
    }
}

/// Derive the usable depth range of every keyframe view from its observed
/// points: the nearest observation with head-room below, the 90th depth
/// percentile above, both clamped by the configured bounds.
fn compute_depth_ranges(
    views: &mut [View],
    points: &[Point],
    keyframes: &[usize],
    num_sensors: usize,
    num_frames: usize,
    params: &Parameters,
) {
    for &frame in keyframes {
        for sensor in 0..num_sensors {
            let idx = ViewId::from_parts(sensor, frame, num_frames).index();
            let depths: Vec<f64> = {
                let view = &views[idx];
                view.features
                    .iter()
                    .map(|f| {
                        world_to_camera(
                            &view.rotation,
                            &view.center,
                            &points[f.point_idx as usize].position,
                        )
                        .z
                    })
                    .collect()
            };
            let (min_depth, max_depth) = depth_range(depths, params.min_depth, params.max_depth);
            views[idx].min_depth = min_depth;
            views[idx].max_depth = max_depth;
        }
    }
}

fn depth_range(mut depths: Vec<f64>, clamp_min: f64, clamp_max: f64) -> (f64, f64) {
    if depths.is_empty() {
        return (clamp_min, clamp_max);
    }
    depths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let min_depth = clamp_min.min(0.75 * depths[0]);
    let percentile = ((0.9 * depths.len() as f64) as usize).min(depths.len() - 1);
    let max_depth = clamp_max.min(depths[percentile]);
    (min_depth, max_depth)
}
