//! Ray-triangle intersection.
//!
//! Uses the Möller-Trumbore algorithm without back-face culling, so the
//! winding order of the vertices never changes the hit/miss decision.

use crate::{Interval, Ray, Vec3};

/// Default tolerance for the parallel-ray rejection and the minimum hit distance.
pub const EPSILON: f32 = 1e-6;

/// Parameters of an accepted ray-triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Distance along the ray, in multiples of its direction
    pub t: f32,
    /// Barycentric coordinate towards `v1`
    pub u: f32,
    /// Barycentric coordinate towards `v2`
    pub v: f32,
}

/// Möller-Trumbore ray-triangle intersection.
///
/// Returns `None` when the ray is parallel to the triangle plane
/// (`|det| < epsilon`), when the intersection falls outside the triangle,
/// or when it does not lie strictly ahead of the origin (`t <= epsilon`).
pub fn intersect_triangle(
    ray: &Ray,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    epsilon: f32,
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let p = ray.direction().cross(edge2);
    let det = edge1.dot(p);

    // Ray is parallel to triangle
    if det.abs() < epsilon {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin() - v0;
    let u = s.dot(p) * inv_det;

    if !Interval::UNIT.contains(u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = ray.direction().dot(q) * inv_det;

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(q) * inv_det;

    // No upper bound: a hit whose t overflows to infinity is still ahead
    if t.is_nan() || t <= epsilon {
        return None;
    }

    Some(TriangleHit { t, u, v })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_half() -> (Vec3, Vec3, Vec3) {
        (
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let (v0, v1, v2) = square_half();
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);

        let hit = intersect_triangle(&ray, v0, v1, v2, EPSILON).expect("ray should hit");
        assert!((hit.t - 1.0).abs() < 1e-5);
        assert!(hit.u >= 0.0 && hit.v >= 0.0 && hit.u + hit.v <= 1.0);
    }

    #[test]
    fn test_triangle_miss_deflected() {
        let (v0, v1, v2) = square_half();
        let ray = Ray::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 1.0));

        assert!(intersect_triangle(&ray, v0, v1, v2, EPSILON).is_none());
    }

    #[test]
    fn test_triangle_behind_origin() {
        let (v0, v1, v2) = square_half();
        // Pointing away from the plane z = 1
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);

        assert!(intersect_triangle(&ray, v0, v1, v2, EPSILON).is_none());
    }

    #[test]
    fn test_triangle_parallel() {
        let (v0, v1, v2) = square_half();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::X);

        assert!(intersect_triangle(&ray, v0, v1, v2, EPSILON).is_none());
    }

    #[test]
    fn test_far_hit_with_infinite_t() {
        let v0 = Vec3::new(-1e13, -1e13, 1e13);
        let v1 = Vec3::new(0.0, 1e13, 1e13);
        let v2 = Vec3::new(1e13, -1e13, 1e13);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);

        let hit = intersect_triangle(&ray, v0, v1, v2, EPSILON).expect("ray should hit");
        assert!(hit.t > EPSILON);
        assert!(hit.u >= 0.0 && hit.v >= 0.0 && hit.u + hit.v <= 1.0);
    }

    #[test]
    fn test_degenerate_triangle_never_hits() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(intersect_triangle(&ray, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, EPSILON).is_none());
    }

    #[test]
    fn test_reversed_winding_same_decision() {
        let (v0, v1, v2) = square_half();
        let rays = [
            Ray::new(Vec3::ZERO, Vec3::Z),
            Ray::new(Vec3::new(0.2, -0.5, 0.0), Vec3::Z),
            Ray::new(Vec3::new(0.9, 0.9, 0.0), Vec3::Z),
            Ray::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 1.0)),
            Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::Z),
        ];

        for ray in &rays {
            let forward = intersect_triangle(ray, v0, v1, v2, EPSILON).is_some();
            let reversed = intersect_triangle(ray, v0, v2, v1, EPSILON).is_some();
            assert_eq!(forward, reversed, "winding changed the decision for {ray:?}");
        }
    }
}
