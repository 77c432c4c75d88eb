//! Service abstractions for the models and telemetry a mission talks to.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{DronePose, MissionStatus};

/// Vision model that describes what the drone camera currently sees.
///
/// # Implementations
///
/// - **Production**: captures a frame and posts it to a multimodal endpoint
/// - **Simulation**: scripted replies with virtual latency
///
/// # Call Flow
///
/// ```text
/// Orchestrator               VisionService               Model
///   |                           |                          |
///   |-- scan(prompt) ---------->|                          |
///   |                           |-- frame + prompt ------->|
///   |                           |<------- description -----|
///   |<-- Ok(description) -------|                          |
/// ```
#[async_trait]
pub trait VisionService: Send + Sync + 'static {
    /// Captures the current view and returns a free-text scene description.
    ///
    /// # Returns
    /// * `Ok(text)` - Description (may still be empty; callers treat that as a failure)
    /// * `Err(EnvError)` - Capture or transport failure
    async fn scan(&self, prompt: &str) -> Result<String, EnvError>;
}

/// Text-only language model used for spatial reasoning.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Sends a system/user prompt pair and returns the raw reply text.
    ///
    /// No structure is guaranteed: the reply may contain prose, code fences
    /// or malformed JSON.
    async fn ask(&self, system_prompt: &str, user_prompt: &str) -> Result<String, EnvError>;
}

/// Source of the live reference transform (usually the drone itself).
pub trait PoseSource: Send + Sync {
    /// Returns the current pose, or `None` when the reference is unavailable.
    fn current_pose(&self) -> Option<DronePose>;
}

/// A fixed pose, for hosts that hand the pose over once per mission.
impl PoseSource for DronePose {
    fn current_pose(&self) -> Option<DronePose> {
        Some(*self)
    }
}

/// Consumer of mission progress (commentary, UI).
///
/// The pipeline does not know or care how the messages are displayed.
pub trait MissionListener: Send + Sync {
    /// Called with a short status line whenever the mission changes stage.
    fn on_progress(&self, message: &str);

    /// Called exactly once per started mission with its terminal status.
    fn on_complete(&self, status: &MissionStatus);
}
