//! Rescue Core - mission pipeline for an autonomous rescue drone.
//!
//! Turns a free-text mission prompt and a camera-derived scene description
//! into an ordered, flyable 3D path. Every stage degrades instead of failing:
//! 1. **Untrusted model output**: best-effort field scanning and a
//!    deterministic fallback search pattern
//! 2. **Abstract offsets**: surface snapping against real collision geometry
//! 3. **Touring**: greedy nearest-neighbor ordering from the drone
//! 4. **Flight path**: C1 cubic Bézier trajectory sampled by arc length
//!
//! The [`MissionOrchestrator`] sequences these stages as a sans-IO state
//! machine; [`MissionAgent`] drives it against the collaborators defined in
//! `rescue_env`.

pub mod text_extract;
pub mod waypoint_decoder;
pub mod surface_snap;
pub mod tour;
pub mod trajectory;
pub mod prompts;
pub mod orchestrator;
pub mod agent_runtime;
pub mod config;
pub mod error;
pub mod metrics;

// Re-export key types for convenience
pub use agent_runtime::MissionAgent;
pub use config::{FallbackWaypoint, PipelineConfig};
pub use error::MissionError;
pub use metrics::PipelineMetrics;
pub use orchestrator::{
    FallbackReason, MissionOrchestrator, MissionPhase, MissionReport, ModelReply, ScanRequest,
    WaypointRequest, WaypointSource,
};
pub use surface_snap::{SnapMethod, SnapResult, SurfaceSnapper, Waypoint};
pub use text_extract::{FieldSource, ScanExtractor};
pub use tour::OrderedRoute;
pub use trajectory::{Knot, Trajectory, TrajectoryError};
pub use waypoint_decoder::{WaypointCandidate, WaypointDecoder};
