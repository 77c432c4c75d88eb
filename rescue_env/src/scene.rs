//! Scene geometry queries.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Bit mask selecting collision layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Default obstacle layer.
    pub const DEFAULT: LayerMask = LayerMask(1);

    /// The navigable scene surface (reconstructed mesh) that waypoints rest on.
    pub const SCENE_SURFACE: LayerMask = LayerMask(1 << 8);

    /// Matches every layer.
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    /// Returns true if any bit is shared with `other`.
    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

/// Result of a successful ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// World-space hit point
    pub point: Vector3<f64>,

    /// Surface normal at the hit point
    pub normal: Vector3<f64>,

    /// Distance from the ray origin
    pub distance: f64,
}

/// Ray intersection against the scene's collision geometry.
///
/// Implementations must be read-only: queries may run while a mission
/// transition is in progress.
pub trait SceneGeometry: Send + Sync {
    /// Casts a ray and returns the nearest hit on a layer in `layer_mask`.
    ///
    /// # Arguments
    /// * `origin` - Ray start in world space
    /// * `direction` - Unit direction
    /// * `max_distance` - Hits farther than this are ignored
    /// * `layer_mask` - Layers to test against
    fn raycast(
        &self,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        max_distance: f64,
        layer_mask: LayerMask,
    ) -> Option<RayHit>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_mask_intersects() {
        let both = LayerMask::DEFAULT | LayerMask::SCENE_SURFACE;
        assert!(both.intersects(LayerMask::SCENE_SURFACE));
        assert!(!LayerMask::DEFAULT.intersects(LayerMask::SCENE_SURFACE));
        assert!(!LayerMask(0).intersects(LayerMask::ALL));
    }
}
