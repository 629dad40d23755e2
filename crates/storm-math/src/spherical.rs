// File: crates/storm-math/src/spherical.rs
// Cartesian <-> spherical conversions used to turn a world-space gaze
// target into layer-local horizontal/vertical blend angles.

use crate::Vec3;

/// `[r, theta, phi]` - radius, polar angle from +Y, azimuth from +Z toward +X.
pub fn cartesian_to_spherical(v: Vec3) -> [f32; 3] {
    let r = v.length();
    if r <= f32::EPSILON {
        return [0.0, 0.0, 0.0];
    }
    let theta = (v.y / r).clamp(-1.0, 1.0).acos();
    let phi = v.x.atan2(v.z);
    [r, theta, phi]
}

/// A gaze direction expressed as layer-facing blend angles, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GazeAngles {
    pub horizontal: f32,
    pub vertical: f32,
}

/// Converts a direction vector to the `{h, v}` blend angles a gaze layer
/// expects. `left_handed` negates `h` for left-handed engine conventions.
pub fn direction_to_gaze_angles(direction: Vec3, left_handed: bool) -> GazeAngles {
    let [_, theta, phi] = cartesian_to_spherical(direction);
    let mut h = phi.to_degrees();
    let v = theta.to_degrees() - 90.0;
    if left_handed {
        h = -h;
    }
    GazeAngles { horizontal: h, vertical: v }
}
