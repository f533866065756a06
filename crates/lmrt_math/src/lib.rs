// Re-export glam for convenience
pub use glam::*;

// LMRT math types
mod interval;
mod ray;
mod triangle;

pub use interval::Interval;
pub use ray::Ray;
pub use triangle::{intersect_triangle, TriangleHit, EPSILON};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_cross_dot() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(a.cross(b), Vec3::Z);
        assert_eq!(a.dot(b), 0.0);
    }
}
