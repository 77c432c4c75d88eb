//! Common types shared across the collaborator boundary.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity token for one mission instance.
///
/// Every asynchronous completion carries the token of the mission that
/// issued it, so results that arrive after a cancel or a restart can be
/// recognised as stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissionId(pub Uuid);

impl MissionId {
    /// Creates a new random MissionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic MissionId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for MissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Pose of the drone (or camera) that waypoint offsets are relative to.
///
/// World frame is Y-up. The body frame looks down +Z with +X to the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DronePose {
    /// World position in meters
    pub position: Vector3<f64>,

    /// Body orientation
    pub rotation: UnitQuaternion<f64>,
}

impl DronePose {
    /// Creates a pose from a position and orientation.
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Creates a level pose at `position` turned `yaw_radians` about world up.
    pub fn level(position: Vector3<f64>, yaw_radians: f64) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw_radians),
        }
    }

    /// Unit vector the drone is facing.
    pub fn forward(&self) -> Vector3<f64> {
        self.rotation * Vector3::z()
    }

    /// Unit vector to the drone's right.
    pub fn right(&self) -> Vector3<f64> {
        self.rotation * Vector3::x()
    }

    /// World up. Vertical offsets ignore the drone's own tilt.
    pub fn world_up() -> Vector3<f64> {
        Vector3::y()
    }

    /// Converts a drone-relative offset into a world position.
    pub fn offset_to_world(&self, forward: f64, right: f64, up: f64) -> Vector3<f64> {
        self.position + self.forward() * forward + self.right() * right + Self::world_up() * up
    }
}

impl Default for DronePose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// Terminal status emitted once per mission to every listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionStatus {
    /// Mission the status belongs to
    pub mission_id: MissionId,

    /// Whether the mission produced a flyable path
    pub success: bool,

    /// Number of waypoints in the final route
    pub waypoint_count: usize,

    /// Human-readable summary
    pub message: String,
}

impl MissionStatus {
    /// Creates a success status.
    pub fn completed(mission_id: MissionId, waypoint_count: usize, message: impl Into<String>) -> Self {
        Self {
            mission_id,
            success: true,
            waypoint_count,
            message: message.into(),
        }
    }

    /// Creates a failure status.
    pub fn failed(mission_id: MissionId, message: impl Into<String>) -> Self {
        Self {
            mission_id,
            success: false,
            waypoint_count: 0,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_identity_pose_axes() {
        let pose = DronePose::default();
        assert!((pose.forward() - Vector3::z()).norm() < 1e-12);
        assert!((pose.right() - Vector3::x()).norm() < 1e-12);
    }

    #[test]
    fn test_offset_follows_yaw() {
        // Quarter turn about +Y: forward becomes +X, right becomes -Z
        let pose = DronePose::level(Vector3::new(1.0, 2.0, 3.0), FRAC_PI_2);
        let world = pose.offset_to_world(2.0, 1.0, 0.5);

        assert!((world - Vector3::new(3.0, 2.5, 2.0)).norm() < 1e-9);
    }

    #[test]
    fn test_mission_id_from_seed_is_stable() {
        assert_eq!(MissionId::from_seed(7), MissionId::from_seed(7));
        assert_ne!(MissionId::from_seed(7), MissionId::from_seed(8));
    }
}
