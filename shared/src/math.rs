use serde::{Deserialize, Serialize};

/// Represents a vector in 3D space.
/// Y is up; the house is laid out on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Builds a vector from the `[x, y, z]` arrays clients send for directions.
    pub fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Returns the normalized vector, or zero for a zero-length input.
    pub fn normalize(&self) -> Vec3 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec3::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    /// Returns the sum of two vectors.
    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Returns `self - other`.
    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn distance_to(&self, other: &Vec3) -> f32 {
        self.sub(other).magnitude()
    }

    /// Returns the vector projected onto the ground plane (y = 0).
    pub fn horizontal(&self) -> Vec3 {
        Vec3::new(self.x, 0.0, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_normalize_unit_length() {
        let v = Vec3::new(3.0, 0.0, 4.0).normalize();
        assert_approx_eq!(v.magnitude(), 1.0, 1e-6);
        assert_approx_eq!(v.x, 0.6, 1e-6);
        assert_approx_eq!(v.z, 0.8, 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_distance_and_dot() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 6.0, 3.0);
        assert_approx_eq!(a.distance_to(&b), 5.0, 1e-6);
        assert_approx_eq!(a.dot(&b), 4.0 + 12.0 + 9.0, 1e-6);
    }

    #[test]
    fn test_horizontal_drops_height() {
        let v = Vec3::new(3.0, 5.0, 4.0).horizontal();
        assert_eq!(v, Vec3::new(3.0, 0.0, 4.0));
        assert_approx_eq!(v.magnitude(), 5.0, 1e-6);
    }

    #[test]
    fn test_array_conversion() {
        let v = Vec3::from_array([0.0, 0.0, -1.0]);
        assert_eq!(v, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(v.to_array(), [0.0, 0.0, -1.0]);
    }
}
