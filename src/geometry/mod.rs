//! Geometry utilities: pose distances, world/camera transforms, triangulation angles.
//!
//! # Extrinsic convention
//!
//! A view's extrinsics are stored as the camera-to-world rotation `R` together
//! with the camera center `c` expressed in world coordinates. A world point `p`
//! is moved into the camera frame with
//!
//! ```text
//! p_cam = R^T * (p - c)
//! ```
//!
//! so `p_cam.z` is the depth along the optical axis. All functions in this
//! module assume that convention; mixing it with a world-to-camera `[R | t]`
//! pose silently produces wrong depths.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// Threshold below which a viewing ray is considered degenerate.
const MIN_RAY_LENGTH: f64 = 1e-10;

/// Euclidean distance between two camera centers.
pub fn pose_distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).norm()
}

/// Transform a world point into the local frame of a camera with
/// camera-to-world rotation `rotation` and center `center`.
pub fn world_to_camera(
    rotation: &Matrix3<f64>,
    center: &Vector3<f64>,
    point: &Vector3<f64>,
) -> Vector3<f64> {
    // R is orthonormal, so the inverse is the transpose.
    rotation.transpose() * (point - center)
}

/// Triangulation angle in degrees at `point` between the rays towards the two
/// camera centers.
///
/// Returns 0.0 when either ray is (numerically) zero-length, i.e. a camera
/// center coincides with the point. A zero angle contributes a zero score in
/// view selection, so degenerate geometry never propagates a NaN.
pub fn triangulation_angle(
    point: &Vector3<f64>,
    center_ref: &Vector3<f64>,
    center_src: &Vector3<f64>,
) -> f64 {
    let ray_ref = center_ref - point;
    let ray_src = center_src - point;

    let norm_ref = ray_ref.norm();
    let norm_src = ray_src.norm();
    if norm_ref < MIN_RAY_LENGTH || norm_src < MIN_RAY_LENGTH {
        return 0.0;
    }

    let cos_angle = (ray_ref.dot(&ray_src) / (norm_ref * norm_src)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Rotation matrix from roll/pitch/yaw Euler angles (radians).
///
/// Used when composing rig calibration extrinsics with the reference
/// trajectory.
pub fn rotation_from_euler(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    *Rotation3::from_euler_angles(roll, pitch, yaw).matrix()
}

/// Unit quaternion for a camera-to-world rotation matrix, for writers that
/// serialize orientations in quaternion form.
pub fn quaternion_from_rotation(rotation: &Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_matrix(rotation)
}
