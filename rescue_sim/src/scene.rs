//! Synthetic collision geometry for simulation.
//!
//! The scene is a handful of horizontal ground planes and axis-aligned boxes,
//! each on a layer. Enough to exercise every surface-snapping strategy
//! without a physics engine.

use nalgebra::Vector3;
use rescue_env::{LayerMask, RayHit, SceneGeometry};
use serde::{Deserialize, Serialize};

/// Infinite horizontal plane at `height`, solid from above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundPlane {
    pub height: f64,
    pub layer: LayerMask,
}

/// Axis-aligned box between `min` and `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneBox {
    pub name: String,
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
    pub layer: LayerMask,
}

impl SceneBox {
    pub fn new(name: &str, min: Vector3<f64>, max: Vector3<f64>, layer: LayerMask) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
            layer,
        }
    }

    /// Slab test; returns the entry distance and face normal.
    fn intersect(&self, origin: Vector3<f64>, direction: Vector3<f64>) -> Option<(f64, Vector3<f64>)> {
        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;
        let mut normal = Vector3::zeros();

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < 1e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let mut t0 = (self.min[axis] - o) / d;
            let mut t1 = (self.max[axis] - o) / d;
            let mut face = -1.0;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                face = 1.0;
            }
            if t0 > t_near {
                t_near = t0;
                normal = Vector3::zeros();
                normal[axis] = face;
            }
            t_far = t_far.min(t1);
            if t_near > t_far {
                return None;
            }
        }

        // Origins inside a box do not hit it
        (t_near >= 0.0).then_some((t_near, normal))
    }
}

/// A scene made of ground planes and boxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimScene {
    pub planes: Vec<GroundPlane>,
    pub boxes: Vec<SceneBox>,
}

impl SimScene {
    /// An empty scene: every ray misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single floor at height 0 on the surface layer.
    pub fn flat_floor() -> Self {
        Self::empty().with_plane(0.0, LayerMask::SCENE_SURFACE)
    }

    /// A room-sized test scene: floor, a table and a wall segment.
    pub fn collapsed_room() -> Self {
        Self::flat_floor()
            .with_box(SceneBox::new(
                "table",
                Vector3::new(-1.5, 0.0, 3.0),
                Vector3::new(0.5, 0.8, 4.5),
                LayerMask::SCENE_SURFACE,
            ))
            .with_box(SceneBox::new(
                "collapsed_wall",
                Vector3::new(-6.0, 0.0, 9.0),
                Vector3::new(6.0, 3.0, 9.5),
                LayerMask::SCENE_SURFACE,
            ))
            .with_box(SceneBox::new(
                "light_fixture",
                Vector3::new(2.0, 2.6, 5.0),
                Vector3::new(2.4, 2.8, 5.4),
                LayerMask::DEFAULT,
            ))
    }

    pub fn with_plane(mut self, height: f64, layer: LayerMask) -> Self {
        self.planes.push(GroundPlane { height, layer });
        self
    }

    pub fn with_box(mut self, scene_box: SceneBox) -> Self {
        self.boxes.push(scene_box);
        self
    }
}

impl SceneGeometry for SimScene {
    fn raycast(
        &self,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        max_distance: f64,
        layer_mask: LayerMask,
    ) -> Option<RayHit> {
        let direction = direction.try_normalize(1e-12)?;
        let mut best: Option<RayHit> = None;
        let mut consider = |distance: f64, normal: Vector3<f64>| {
            if distance > max_distance || best.as_ref().is_some_and(|b| b.distance <= distance) {
                return;
            }
            best = Some(RayHit {
                point: origin + direction * distance,
                normal,
                distance,
            });
        };

        for plane in self.planes.iter().filter(|p| p.layer.intersects(layer_mask)) {
            // Only hits from above count
            if direction.y < -1e-12 && origin.y >= plane.height {
                consider((plane.height - origin.y) / direction.y, Vector3::y());
            }
        }

        for scene_box in self.boxes.iter().filter(|b| b.layer.intersects(layer_mask)) {
            if let Some((distance, normal)) = scene_box.intersect(origin, direction) {
                consider(distance, normal);
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_floor_hit_from_above() {
        let scene = SimScene::flat_floor();
        let hit = scene
            .raycast(Vector3::new(1.0, 5.0, 2.0), -Vector3::y(), 50.0, LayerMask::SCENE_SURFACE)
            .unwrap();

        assert!((hit.distance - 5.0).abs() < 1e-9);
        assert!((hit.point - Vector3::new(1.0, 0.0, 2.0)).norm() < 1e-9);
    }

    #[test]
    fn test_floor_missed_from_below_or_beyond_range() {
        let scene = SimScene::flat_floor();
        assert!(scene
            .raycast(Vector3::new(0.0, -1.0, 0.0), -Vector3::y(), 50.0, LayerMask::SCENE_SURFACE)
            .is_none());
        assert!(scene
            .raycast(Vector3::new(0.0, 80.0, 0.0), -Vector3::y(), 50.0, LayerMask::SCENE_SURFACE)
            .is_none());
    }

    #[test]
    fn test_box_top_is_nearest() {
        let scene = SimScene::collapsed_room();
        let hit = scene
            .raycast(Vector3::new(-0.5, 10.0, 3.5), -Vector3::y(), 50.0, LayerMask::SCENE_SURFACE)
            .unwrap();

        assert!((hit.point.y - 0.8).abs() < 1e-9);
        assert_eq!(hit.normal, Vector3::y());
    }

    #[test]
    fn test_layer_filtering() {
        let scene = SimScene::collapsed_room();
        let origin = Vector3::new(2.2, 10.0, 5.2);

        let surface = scene
            .raycast(origin, -Vector3::y(), 50.0, LayerMask::SCENE_SURFACE)
            .unwrap();
        assert!(surface.point.y.abs() < 1e-9);

        let fixture = scene.raycast(origin, -Vector3::y(), 50.0, LayerMask::DEFAULT).unwrap();
        assert!((fixture.point.y - 2.8).abs() < 1e-9);
    }

    #[test]
    fn test_wall_blocks_horizontal_ray() {
        let scene = SimScene::collapsed_room();
        let hit = scene
            .raycast(Vector3::new(0.0, 1.5, 0.0), Vector3::z(), 50.0, LayerMask::SCENE_SURFACE)
            .unwrap();

        assert!((hit.point.z - 9.0).abs() < 1e-9);
        assert_eq!(hit.normal, -Vector3::z());
    }

    proptest! {
        #[test]
        fn prop_hits_lie_on_the_ray_within_range(
            x in -8.0f64..8.0,
            y in 0.1f64..6.0,
            z in -2.0f64..12.0,
            dx in -1.0f64..1.0,
            dy in -1.0f64..-0.05,
            dz in -1.0f64..1.0,
        ) {
            let scene = SimScene::collapsed_room();
            let origin = Vector3::new(x, y, z);
            let direction = Vector3::new(dx, dy, dz);

            if let Some(hit) = scene.raycast(origin, direction, 30.0, LayerMask::ALL) {
                prop_assert!(hit.distance >= 0.0 && hit.distance <= 30.0);
                let expected = origin + direction.normalize() * hit.distance;
                prop_assert!((hit.point - expected).norm() < 1e-9);
                prop_assert!((hit.normal.norm() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_empty_scene_misses() {
        assert!(SimScene::empty()
            .raycast(Vector3::zeros(), -Vector3::y(), 50.0, LayerMask::ALL)
            .is_none());
    }
}
