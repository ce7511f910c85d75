//! Math utilities for steering and mesh generation

use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// Converts degrees to radians
#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    deg * PI / 180.0
}

/// Converts radians to degrees
#[inline]
pub fn rad_to_deg(rad: f32) -> f32 {
    rad * 180.0 / PI
}

/// Clamps a value between min and max
#[inline]
pub fn clamp<T: PartialOrd>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

/// Square a value (x²)
#[inline]
pub fn sqr<T: std::ops::Mul<Output = T> + Copy>(x: T) -> T {
    x * x
}

/// Clamps a float into the signed byte range used by movement commands
#[inline]
pub fn clamp_char(value: f32) -> i8 {
    clamp(value, -128.0, 127.0) as i8
}

/// Length of the horizontal component of a vector
#[inline]
pub fn length_2d(v: Vec3) -> f32 {
    v.truncate().length()
}

/// Cosine of the horizontal angle between two vectors, 0 if either is degenerate
pub fn alignment_2d(a: Vec3, b: Vec3) -> f32 {
    let a = a.truncate();
    let b = b.truncate();
    let len = a.length() * b.length();
    if len < f32::EPSILON {
        return 0.0;
    }
    a.dot(b) / len
}

/// Yaw in degrees of a horizontal direction (0 = +x, 90 = +y)
#[inline]
pub fn yaw_of(dir: Vec3) -> f32 {
    rad_to_deg(dir.y.atan2(dir.x))
}

/// Unit horizontal vector for a yaw in degrees
#[inline]
pub fn heading(yaw_deg: f32) -> Vec3 {
    let yaw = deg_to_rad(yaw_deg);
    Vec3::new(yaw.cos(), yaw.sin(), 0.0)
}

/// Forward, right and up vectors for view angles `(pitch, yaw, roll)` in degrees
///
/// Pitch follows the game convention: negative values look up.
pub fn angle_vectors(angles: Vec3) -> (Vec3, Vec3, Vec3) {
    let (sp, cp) = deg_to_rad(angles.x).sin_cos();
    let (sy, cy) = deg_to_rad(angles.y).sin_cos();
    let (sr, cr) = deg_to_rad(angles.z).sin_cos();

    let forward = Vec3::new(cp * cy, cp * sy, -sp);
    let right = Vec3::new(
        -sr * sp * cy + cr * sy,
        -sr * sp * sy - cr * cy,
        -sr * cp,
    );
    let up = Vec3::new(cr * sp * cy + sr * sy, cr * sp * sy - sr * cy, cr * cp);
    (forward, right, up)
}

/// The horizontal vector 90° clockwise from `dir`, same magnitude
#[inline]
pub fn right_of(dir: Vec3) -> Vec3 {
    Vec3::new(dir.y, -dir.x, 0.0)
}

/// Horizontal radius of a bounding box centred on the origin
pub fn radius_from_bounds_2d(mins: Vec3, maxs: Vec3) -> f32 {
    let r1 = Vec2::new(mins.x, mins.y).length_squared();
    let r2 = Vec2::new(maxs.x, maxs.y).length_squared();
    r1.max(r2).sqrt()
}

/// Launch angle in degrees (positive is upward) needed to hit `target` from
/// `origin` at launch speed `speed` under `gravity`
///
/// Picks the flatter of the two ballistic solutions; targets out of reach get
/// the 45° angle of maximum range.
pub fn ballistic_pitch(origin: Vec3, target: Vec3, speed: f32, gravity: f32) -> f32 {
    let delta = target - origin;
    let x = length_2d(delta);
    let y = delta.z;

    if x < f32::EPSILON || gravity <= 0.0 {
        return if y >= 0.0 { 90.0 } else { -90.0 };
    }

    let v2 = speed * speed;
    let discriminant = v2 * v2 - gravity * (gravity * x * x + 2.0 * y * v2);
    if discriminant < 0.0 {
        return 45.0;
    }

    rad_to_deg(((v2 - discriminant.sqrt()) / (gravity * x)).atan())
}
