//! Error types for the mission pipeline.

use rescue_env::MissionId;
use thiserror::Error;

use crate::trajectory::TrajectoryError;

/// Errors surfaced by the mission orchestrator and agent.
///
/// Only `MissingCollaborator` and `SceneUnavailable` end a started mission
/// in failure; malformed model output and geometry misses are recovered
/// inside the pipeline and never show up here.
#[derive(Debug, Error)]
pub enum MissionError {
    /// A mission is already in flight; the new request was not queued
    #[error("mission already running")]
    AlreadyRunning,

    /// The mission prompt was empty
    #[error("please enter a mission prompt")]
    EmptyPrompt,

    /// A required external reference is absent
    #[error("missing subsystem reference: {0}")]
    MissingCollaborator(&'static str),

    /// The vision service produced no scene description
    #[error("vision scan failed: {0}")]
    SceneUnavailable(String),

    /// A completion arrived for a mission that is no longer active
    #[error("stale completion for mission {0}")]
    Stale(MissionId),

    /// The mission was cancelled while a stage was in flight
    #[error("mission cancelled")]
    Cancelled,

    /// The operation requires an idle orchestrator
    #[error("operation not allowed while a mission is running")]
    NotIdle,

    /// Path synthesis failed
    #[error("trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    /// Configuration is invalid or unreadable
    #[error("configuration error: {0}")]
    Config(String),
}

impl MissionError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that end a started mission in failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCollaborator(_) | Self::SceneUnavailable(_) | Self::Trajectory(_)
        )
    }
}
