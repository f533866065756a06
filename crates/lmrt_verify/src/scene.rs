//! Synthetic scenes for exercising the intersection pipeline.

use lmrt_core::{RayRecord, TriangleRecord};
use lmrt_math::Vec3;

/// Offset added to the direction of rays that should miss.
pub const DEFLECTION: f32 = 100.0;

/// Triangles and rays to push through the accelerator.
#[derive(Debug, Clone, PartialEq)]
pub struct TestScene {
    pub triangles: Vec<TriangleRecord>,
    pub rays: Vec<RayRecord>,
}

impl TestScene {
    /// 16 identical triangles one unit along +z, and 16 rays from the origin.
    ///
    /// Rays 0 to 10 are deflected sideways and miss; rays 11 to 15 hit every
    /// triangle.
    pub fn standard() -> Self {
        Self::stacked(16, 16, 11)
    }

    /// `triangle_count` copies of the unit triangle at z = 1 and `ray_count`
    /// rays from the origin along +z. Rays with index below `first_hit` are
    /// deflected by [`DEFLECTION`] in x.
    pub fn stacked(triangle_count: usize, ray_count: usize, first_hit: usize) -> Self {
        let triangle = TriangleRecord::new(
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
        );

        let rays = (0..ray_count)
            .map(|i| {
                let mut direction = Vec3::Z;
                if i < first_hit {
                    direction.x = DEFLECTION;
                }
                RayRecord::new(Vec3::ZERO, direction)
            })
            .collect();

        Self {
            triangles: vec![triangle; triangle_count],
            rays,
        }
    }

    /// Same scene with every triangle's winding reversed.
    pub fn reversed(&self) -> Self {
        Self {
            triangles: self.triangles.iter().map(TriangleRecord::reversed).collect(),
            rays: self.rays.clone(),
        }
    }

    /// Number of rays expected to hit, given how the scene was built.
    pub fn hitting_rays(&self) -> usize {
        self.rays.iter().filter(|ray| ray.direction.x == 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scene() {
        let scene = TestScene::standard();
        assert_eq!(scene.triangles.len(), 16);
        assert_eq!(scene.rays.len(), 16);
        assert_eq!(scene.hitting_rays(), 5);

        assert_eq!(scene.rays[10].direction.x, DEFLECTION);
        assert_eq!(scene.rays[11].direction.x, 0.0);
        assert_eq!(scene.rays[15].direction.z, 1.0);
    }

    #[test]
    fn test_reversed_swaps_winding() {
        let scene = TestScene::stacked(2, 1, 0).reversed();
        let [v0, v1, v2] = scene.triangles[0].vertices();
        assert_eq!(v0, Vec3::new(-1.0, -1.0, 1.0));
        assert_eq!(v1, Vec3::new(1.0, -1.0, 1.0));
        assert_eq!(v2, Vec3::new(0.0, 1.0, 1.0));
    }
}
