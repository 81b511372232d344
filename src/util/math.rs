//! 3D math kernel: vectors, quaternions, interpolation helpers

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// 3-component vector, the universal spatial type of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const ONE: Vector3 = Vector3 {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    /// Ship-local forward axis
    pub const FORWARD: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Unit vector in the same direction; the zero vector normalizes to zero
    pub fn normalize(&self) -> Vector3 {
        let len = self.length();
        if len == 0.0 {
            Vector3::ZERO
        } else {
            *self / len
        }
    }

    pub fn distance(&self, other: Vector3) -> f64 {
        (*self - other).length()
    }

    pub fn distance_squared(&self, other: Vector3) -> f64 {
        (*self - other).length_squared()
    }

    pub fn lerp(&self, other: Vector3, t: f64) -> Vector3 {
        *self + (other - *self) * t
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Vector3) {
        *self = *self + rhs;
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vector3 {
    fn sub_assign(&mut self, rhs: Vector3) {
        *self = *self - rhs;
    }
}

impl Mul<f64> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f64) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vector3 {
    type Output = Vector3;

    fn div(self, rhs: f64) -> Vector3 {
        Vector3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

/// Rotation quaternion (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Quaternion for a rotation of `angle` radians around `axis`
    pub fn from_axis_angle(axis: Vector3, angle: f64) -> Quaternion {
        let half = angle * 0.5;
        let sin = half.sin();
        let axis = axis.normalize();

        Quaternion {
            x: axis.x * sin,
            y: axis.y * sin,
            z: axis.z * sin,
            w: half.cos(),
        }
    }

    /// Renormalizes to unit length; a zero quaternion becomes identity
    pub fn normalize(&self) -> Quaternion {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len == 0.0 {
            Quaternion::IDENTITY
        } else {
            Quaternion::new(self.x / len, self.y / len, self.z / len, self.w / len)
        }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Rotate a vector: v + 2w(q×v) + 2q×(q×v)
    pub fn rotate(&self, v: Vector3) -> Vector3 {
        let qv = Vector3::new(self.x, self.y, self.z);
        let t = qv.cross(v) * 2.0;
        v + t * self.w + qv.cross(t)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product
    fn mul(self, o: Quaternion) -> Quaternion {
        Quaternion {
            x: self.w * o.x + self.x * o.w + self.y * o.z - self.z * o.y,
            y: self.w * o.y - self.x * o.z + self.y * o.w + self.z * o.x,
            z: self.w * o.z + self.x * o.y - self.y * o.x + self.z * o.w,
            w: self.w * o.w - self.x * o.x - self.y * o.y - self.z * o.z,
        }
    }
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

pub fn radians_to_degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Normalize an angle difference in degrees to (-180, 180]
pub fn wrap_degrees(mut degrees: f64) -> f64 {
    while degrees > 180.0 {
        degrees -= 360.0;
    }
    while degrees <= -180.0 {
        degrees += 360.0;
    }
    degrees
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn vector_arithmetic() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(4.0, -5.0, 6.0);

        assert_eq!(a + b, Vector3::new(5.0, -3.0, 9.0));
        assert_eq!(b - a, Vector3::new(3.0, -7.0, 3.0));
        assert_eq!(a * 2.0, Vector3::new(2.0, 4.0, 6.0));
        assert_eq!(b / 2.0, Vector3::new(2.0, -2.5, 3.0));
        assert!((a.dot(b) - 12.0).abs() < EPS);
    }

    #[test]
    fn cross_product_follows_right_hand_rule() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        let z = x.cross(y);
        assert!((z.z - 1.0).abs() < EPS);
        assert!(z.x.abs() < EPS && z.y.abs() < EPS);
    }

    #[test]
    fn zero_vector_normalizes_to_zero() {
        assert_eq!(Vector3::ZERO.normalize(), Vector3::ZERO);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let v = Vector3::new(3.0, 4.0, 0.0).normalize();
        assert!((v.length() - 1.0).abs() < EPS);
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(10.0, -10.0, 4.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Vector3::new(5.0, -5.0, 2.0));
    }

    #[test]
    fn quaternion_from_axis_angle_is_unit() {
        let q = Quaternion::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), 1.3);
        assert!((q.norm() - 1.0).abs() < EPS);
    }

    #[test]
    fn zero_quaternion_normalizes_to_identity() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0).normalize();
        assert_eq!(q, Quaternion::IDENTITY);
    }

    #[test]
    fn yaw_rotation_turns_forward_vector() {
        // 90 degrees around +Y takes +Z to +X
        let q = Quaternion::from_axis_angle(
            Vector3::new(0.0, 1.0, 0.0),
            std::f64::consts::FRAC_PI_2,
        );
        let rotated = q.rotate(Vector3::FORWARD);
        assert!((rotated.x - 1.0).abs() < 1e-9);
        assert!(rotated.z.abs() < 1e-9);
    }

    #[test]
    fn composed_rotations_accumulate() {
        let quarter = Quaternion::from_axis_angle(
            Vector3::new(0.0, 1.0, 0.0),
            std::f64::consts::FRAC_PI_4,
        );
        let half = (quarter * quarter).normalize();
        let rotated = half.rotate(Vector3::FORWARD);
        assert!((rotated.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn wrap_degrees_keeps_half_open_range() {
        assert!((wrap_degrees(270.0) + 90.0).abs() < EPS);
        assert!((wrap_degrees(-270.0) - 90.0).abs() < EPS);
        assert!((wrap_degrees(180.0) - 180.0).abs() < EPS);
        assert!((wrap_degrees(-180.0) - 180.0).abs() < EPS);
    }

    #[test]
    fn scalar_helpers() {
        assert_eq!(clamp(5.0, 0.0, 3.0), 3.0);
        assert_eq!(clamp(-1.0, 0.0, 3.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 0.25), 2.5);
    }
}
