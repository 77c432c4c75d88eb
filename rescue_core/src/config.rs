//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it wants to
//! override:
//!
//! ```json
//! { "hover_offset": 0.5, "directional_hints": ["north", "in order"] }
//! ```

use rescue_env::LayerMask;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MissionError;

/// A drone-relative point used when the model gives us nothing to work with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackWaypoint {
    pub name: String,
    pub forward: f64,
    pub right: f64,
    #[serde(default)]
    pub up: f64,
}

impl FallbackWaypoint {
    pub fn new(name: &str, forward: f64, right: f64, up: f64) -> Self {
        Self {
            name: name.to_string(),
            forward,
            right,
            up,
        }
    }
}

/// Configuration for the mission pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline's logical name (for logging)
    pub name: String,

    /// Maximum ray length for surface snapping in meters (default: 50)
    pub raycast_max_distance: f64,

    /// Clearance added above a snapped surface point in meters (default: 0.3)
    pub hover_offset: f64,

    /// Height above the estimate where the downward cast starts (default: 10)
    pub cast_height: f64,

    /// Collision layers that count as navigable surface
    pub surface_layer: LayerMask,

    /// Search pattern flown when no usable waypoints come back
    pub fallback_pattern: Vec<FallbackWaypoint>,

    /// Prompt phrases that mean "fly in the order given" (case-insensitive)
    pub directional_hints: Vec<String>,

    /// Arc-length lookup resolution per trajectory segment (default: 64)
    pub samples_per_segment: usize,

    /// Vision call budget in milliseconds (default: 30 s)
    pub vision_timeout_ms: u64,

    /// Language-model call budget in milliseconds (default: 30 s)
    pub model_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "rescue-pipeline".to_string(),
            raycast_max_distance: 50.0,
            hover_offset: 0.3,
            cast_height: 10.0,
            surface_layer: LayerMask::SCENE_SURFACE,
            fallback_pattern: vec![
                FallbackWaypoint::new("Search_Area_Alpha", 3.0, 0.0, 0.0),
                FallbackWaypoint::new("Search_Area_Beta", 5.0, 2.0, 0.0),
            ],
            directional_hints: [
                "north",
                "south",
                "east",
                "west",
                "start from",
                "clockwise",
                "counterclockwise",
                "left to right",
                "right to left",
                "in order",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            samples_per_segment: 64,
            vision_timeout_ms: 30_000,
            model_timeout_ms: 30_000,
        }
    }
}

impl PipelineConfig {
    /// Parses a JSON document, filling unspecified fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, MissionError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MissionError::config(format!("invalid pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MissionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MissionError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), MissionError> {
        if !(self.raycast_max_distance > 0.0) {
            return Err(MissionError::config("raycast_max_distance must be positive"));
        }
        if !(self.hover_offset >= 0.0) {
            return Err(MissionError::config("hover_offset must not be negative"));
        }
        if !(self.cast_height > 0.0) {
            return Err(MissionError::config("cast_height must be positive"));
        }
        if self.fallback_pattern.is_empty() {
            return Err(MissionError::config("fallback_pattern needs at least one waypoint"));
        }
        if self.samples_per_segment == 0 {
            return Err(MissionError::config("samples_per_segment must be at least 1"));
        }
        Ok(())
    }
}
