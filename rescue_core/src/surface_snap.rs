//! Surface Snapper - grounds model-suggested offsets on real geometry.
//!
//! Offsets from the language model point roughly the right way but know
//! nothing about the reconstructed scene. Each estimate is projected onto
//! the navigable surface layer with up to two ray casts:
//!
//! 1. Straight down from `cast_height` above the estimate
//! 2. From the reference pose toward the estimate (line of sight)
//!
//! The first hit wins and is lifted by the hover clearance. If neither ray
//! hits, the raw estimate is kept and flagged as unvalidated.

use nalgebra::Vector3;
use rescue_env::{DronePose, LayerMask, SceneGeometry};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::waypoint_decoder::WaypointCandidate;

/// A point in world space the drone should visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub position: Vector3<f64>,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, position: Vector3<f64>) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Which strategy produced a snapped position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapMethod {
    /// Downward cast hit the surface under the estimate
    SurfaceBelow,
    /// Ray from the reference pose hit the surface on the way to the estimate
    LineOfSight,
    /// Nothing was hit; the estimate is used as-is
    Unvalidated,
}

/// Snapped position plus how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    pub position: Vector3<f64>,
    pub method: SnapMethod,
}

impl SnapResult {
    /// True if the position rests on scene geometry.
    pub fn is_validated(&self) -> bool {
        self.method != SnapMethod::Unvalidated
    }
}

/// Projects estimates onto the configured surface layer.
pub struct SurfaceSnapper<'a> {
    geometry: &'a dyn SceneGeometry,
    max_distance: f64,
    hover_offset: f64,
    cast_height: f64,
    layer: LayerMask,
}

impl<'a> SurfaceSnapper<'a> {
    /// Creates a snapper with ray parameters taken from `config`.
    pub fn new(geometry: &'a dyn SceneGeometry, config: &PipelineConfig) -> Self {
        Self {
            geometry,
            max_distance: config.raycast_max_distance,
            hover_offset: config.hover_offset,
            cast_height: config.cast_height,
            layer: config.surface_layer,
        }
    }

    /// Snaps a world-space estimate.
    pub fn snap(&self, estimate: Vector3<f64>, reference: &DronePose) -> SnapResult {
        let up = DronePose::world_up();

        // Strategy 1: cast straight down from above the estimate
        let cast_origin = estimate + up * self.cast_height;
        if let Some(hit) = self
            .geometry
            .raycast(cast_origin, -up, self.max_distance, self.layer)
        {
            return SnapResult {
                position: hit.point + up * self.hover_offset,
                method: SnapMethod::SurfaceBelow,
            };
        }

        // Strategy 2: line of sight from the reference toward the estimate
        if let Some(direction) = (estimate - reference.position).try_normalize(1e-9) {
            if let Some(hit) = self
                .geometry
                .raycast(reference.position, direction, self.max_distance, self.layer)
            {
                debug!("Snapped via line of sight at {:.2}m", hit.distance);
                return SnapResult {
                    position: hit.point + up * self.hover_offset,
                    method: SnapMethod::LineOfSight,
                };
            }
        }

        // Strategy 3: accept the raw estimate
        warn!(
            "No surface found near ({:.2}, {:.2}, {:.2}); using raw position",
            estimate.x, estimate.y, estimate.z
        );
        SnapResult {
            position: estimate,
            method: SnapMethod::Unvalidated,
        }
    }

    /// Converts a drone-relative candidate to world space and snaps it.
    pub fn snap_candidate(
        &self,
        candidate: &WaypointCandidate,
        reference: &DronePose,
    ) -> (Waypoint, SnapMethod) {
        let estimate = reference.offset_to_world(candidate.forward, candidate.right, candidate.up);
        let result = self.snap(estimate, reference);
        (Waypoint::new(candidate.name.clone(), result.position), result.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rescue_env::RayHit;

    /// Infinite horizontal plane at `height` on the surface layer.
    struct FlatGround {
        height: f64,
    }

    impl SceneGeometry for FlatGround {
        fn raycast(
            &self,
            origin: Vector3<f64>,
            direction: Vector3<f64>,
            max_distance: f64,
            layer_mask: LayerMask,
        ) -> Option<RayHit> {
            if !layer_mask.intersects(LayerMask::SCENE_SURFACE) || direction.y.abs() < 1e-12 {
                return None;
            }
            let t = (self.height - origin.y) / direction.y;
            if t < 0.0 || t > max_distance {
                return None;
            }
            Some(RayHit {
                point: origin + direction * t,
                normal: Vector3::y(),
                distance: t,
            })
        }
    }

    /// Vertical wall facing -Z at `z`.
    struct Wall {
        z: f64,
    }

    impl SceneGeometry for Wall {
        fn raycast(
            &self,
            origin: Vector3<f64>,
            direction: Vector3<f64>,
            max_distance: f64,
            _layer_mask: LayerMask,
        ) -> Option<RayHit> {
            if direction.z.abs() < 1e-12 {
                return None;
            }
            let t = (self.z - origin.z) / direction.z;
            if t < 0.0 || t > max_distance {
                return None;
            }
            Some(RayHit {
                point: origin + direction * t,
                normal: -Vector3::z(),
                distance: t,
            })
        }
    }

    struct Void;

    impl SceneGeometry for Void {
        fn raycast(&self, _: Vector3<f64>, _: Vector3<f64>, _: f64, _: LayerMask) -> Option<RayHit> {
            None
        }
    }

    fn drone_at(y: f64) -> DronePose {
        DronePose::level(Vector3::new(0.0, y, 0.0), 0.0)
    }

    #[test]
    fn test_flat_ground_snaps_to_hover_height() {
        let config = PipelineConfig::default();
        let ground = FlatGround { height: 0.0 };
        let snapper = SurfaceSnapper::new(&ground, &config);

        for estimate_height in [-3.0, 0.0, 2.5, 7.0] {
            let result = snapper.snap(Vector3::new(4.0, estimate_height, 6.0), &drone_at(2.0));

            assert_eq!(result.method, SnapMethod::SurfaceBelow);
            assert_relative_eq!(result.position.y, config.hover_offset, epsilon = 1e-9);
            assert_relative_eq!(result.position.x, 4.0, epsilon = 1e-9);
            assert_relative_eq!(result.position.z, 6.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_line_of_sight_used_when_nothing_below() {
        let config = PipelineConfig::default();
        let wall = Wall { z: 10.0 };
        let snapper = SurfaceSnapper::new(&wall, &config);

        let result = snapper.snap(Vector3::new(0.0, 2.0, 12.0), &drone_at(2.0));

        assert_eq!(result.method, SnapMethod::LineOfSight);
        assert_relative_eq!(result.position.z, 10.0, epsilon = 1e-9);
        assert_relative_eq!(result.position.y, 2.0 + config.hover_offset, epsilon = 1e-9);
    }

    #[test]
    fn test_unvalidated_keeps_estimate() {
        let config = PipelineConfig::default();
        let snapper = SurfaceSnapper::new(&Void, &config);
        let estimate = Vector3::new(1.0, 2.0, 3.0);

        let result = snapper.snap(estimate, &drone_at(0.0));

        assert_eq!(result.method, SnapMethod::Unvalidated);
        assert!(!result.is_validated());
        assert_eq!(result.position, estimate);
    }

    #[test]
    fn test_ground_beyond_max_distance_is_missed() {
        let config = PipelineConfig {
            raycast_max_distance: 5.0,
            ..PipelineConfig::default()
        };
        let ground = FlatGround { height: -100.0 };
        let snapper = SurfaceSnapper::new(&ground, &config);

        let result = snapper.snap(Vector3::new(0.0, 0.0, 5.0), &drone_at(0.0));
        assert_eq!(result.method, SnapMethod::Unvalidated);
    }

    #[test]
    fn test_wrong_layer_is_ignored() {
        let config = PipelineConfig {
            surface_layer: LayerMask::DEFAULT,
            ..PipelineConfig::default()
        };
        let ground = FlatGround { height: 0.0 };
        let snapper = SurfaceSnapper::new(&ground, &config);

        let result = snapper.snap(Vector3::new(0.0, 1.0, 5.0), &drone_at(1.0));
        assert_eq!(result.method, SnapMethod::Unvalidated);
    }

    #[test]
    fn test_snap_candidate_applies_pose() {
        let config = PipelineConfig::default();
        let ground = FlatGround { height: 0.0 };
        let snapper = SurfaceSnapper::new(&ground, &config);
        let candidate = WaypointCandidate {
            name: "rubble".to_string(),
            forward: 5.0,
            right: -1.0,
            up: 3.0,
            priority: 1,
        };

        let (waypoint, method) = snapper.snap_candidate(&candidate, &drone_at(1.5));

        assert_eq!(method, SnapMethod::SurfaceBelow);
        assert_eq!(waypoint.name, "rubble");
        assert_relative_eq!(waypoint.position.x, -1.0, epsilon = 1e-9);
        assert_relative_eq!(waypoint.position.z, 5.0, epsilon = 1e-9);
    }
}
