//! Rescue Deterministic Simulation Testing (DST) Harness
//!
//! Runs the full mission pipeline against scripted collaborators so every
//! run is reproducible from a single seed.
//!
//! # Core Principle: Controlled Collaborators
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advanced by simulated service latency
//! - **Models**: Vision and language replies scripted per scenario, with
//!   optional gates to hold a call in flight
//! - **Geometry**: Synthetic planes and boxes stand in for the scene mesh
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        SimWorld                          │
//! │  ┌──────────────┐   ┌───────────────┐   ┌─────────────┐  │
//! │  │ SimContext   │   │ ScriptedVision│   │ SimScene    │  │
//! │  │ (clock, RNG) │   │ ScriptedModel │   │ (raycasts)  │  │
//! │  └──────┬───────┘   └───────┬───────┘   └──────┬──────┘  │
//! │         └───────────┬───────┴──────────────────┘         │
//! │              ┌──────▼───────┐     ┌───────────────────┐  │
//! │              │ MissionAgent │────►│ RecordingListener │  │
//! │              └──────────────┘     └───────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rescue_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::CancelInFlight);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod registry;
mod runner;
mod scene;
mod services;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{ExportKnot, ExportPoint, ExportWaypoint, SimExport};
pub use registry::{Landmark, SimLandmarkRegistry};
pub use runner::{ScenarioResult, ScenarioRunner, DEFAULT_PROMPT};
pub use scene::{GroundPlane, SceneBox, SimScene};
pub use services::{RecordingListener, ScriptedLanguageModel, ScriptedReply, ScriptedVision};
pub use world::{SimAgent, SimConfig, SimWorld};
