//! Brute-force CPU reference for the accelerator's intersection kernel.

use rayon::prelude::*;

use lmrt_core::{Intersection, RayRecord, TriangleRecord};
use lmrt_math::{intersect_triangle, EPSILON};

/// Tests every ray against every triangle with a non-culling Möller-Trumbore.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceEngine {
    epsilon: f32,
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self { epsilon: EPSILON }
    }
}

impl ReferenceEngine {
    /// Whether `ray` hits `triangle` strictly in front of its origin.
    pub fn intersects(&self, triangle: &TriangleRecord, ray: &RayRecord) -> bool {
        let [v0, v1, v2] = triangle.vertices();
        intersect_triangle(&ray.to_ray(), v0, v1, v2, self.epsilon).is_some()
    }

    /// Every hitting `(ray, triangle)` pair, ray-major.
    ///
    /// Rays are split across the rayon pool; the output order does not
    /// depend on scheduling.
    pub fn intersect(&self, triangles: &[TriangleRecord], rays: &[RayRecord]) -> Vec<Intersection> {
        let per_ray: Vec<Vec<Intersection>> = rays
            .par_iter()
            .enumerate()
            .map(|(r, ray)| {
                triangles
                    .iter()
                    .enumerate()
                    .filter(|(_, triangle)| self.intersects(triangle, ray))
                    .map(|(t, _)| Intersection::new(r as u32, t as u32))
                    .collect()
            })
            .collect();

        let hits: Vec<Intersection> = per_ray.into_iter().flatten().collect();
        log::info!(
            "Reference engine: {} hits from {} rays x {} triangles",
            hits.len(),
            rays.len(),
            triangles.len()
        );
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::TestScene;
    use lmrt_math::Vec3;

    #[test]
    fn test_standard_scene_hits() {
        let scene = TestScene::standard();
        let hits = ReferenceEngine::default().intersect(&scene.triangles, &scene.rays);

        assert_eq!(hits.len(), 80);
        assert!(hits.iter().all(|hit| (11..16).contains(&hit.ray)));
        assert_eq!(hits[0], Intersection::new(11, 0));
        assert_eq!(hits[79], Intersection::new(15, 15));
    }

    #[test]
    fn test_reversed_winding_same_hits() {
        let scene = TestScene::standard();
        let engine = ReferenceEngine::default();
        assert_eq!(
            engine.intersect(&scene.triangles, &scene.rays),
            engine.intersect(&scene.reversed().triangles, &scene.rays)
        );
    }

    #[test]
    fn test_padding_triangles_never_hit() {
        let engine = ReferenceEngine::default();
        let ray = RayRecord::new(Vec3::ZERO, Vec3::Z);
        assert!(!engine.intersects(&TriangleRecord::default(), &ray));
    }

    #[test]
    fn test_behind_origin_misses() {
        let engine = ReferenceEngine::default();
        let scene = TestScene::stacked(1, 1, 1);
        let ray = RayRecord::new(Vec3::new(0.0, 0.0, 2.0), Vec3::Z);
        assert!(!engine.intersects(&scene.triangles[0], &ray));
    }

    #[test]
    fn test_empty_inputs() {
        let engine = ReferenceEngine::default();
        let scene = TestScene::standard();
        assert!(engine.intersect(&[], &scene.rays).is_empty());
        assert!(engine.intersect(&scene.triangles, &[]).is_empty());
    }
}
