use crate::Vec3;

/// A ray in 3D space with an origin and a direction.
///
/// The direction is not required to be normalized: intersection parameters
/// are expressed in multiples of `direction`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get the origin point of the ray.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Get the direction vector of the ray.
    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_creation() {
        let origin = Vec3::new(1.0, 2.0, 3.0);
        let direction = Vec3::new(0.0, 1.0, 0.0);
        let ray = Ray::new(origin, direction);

        assert_eq!(ray.origin(), origin);
        assert_eq!(ray.direction(), direction);
    }

    #[test]
    fn test_direction_kept_unnormalized() {
        // Deflected rays in the test scene rely on this
        let ray = Ray::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 1.0));
        assert_eq!(ray.direction().length_squared(), 10001.0);
    }
}
