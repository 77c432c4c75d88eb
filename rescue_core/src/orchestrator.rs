//! Mission Orchestrator - sans-IO state machine for one mission at a time.
//!
//! The orchestrator never performs I/O. A driver (see
//! [`MissionAgent`](crate::agent_runtime::MissionAgent)) asks it to begin a
//! mission, performs the external calls it requests, and feeds each result
//! back tagged with the [`MissionId`] it was issued for:
//!
//! ```text
//!            begin()                on_scene_described()      on_waypoints_suggested()
//!   Idle ─────────────▶ Scanning ─────────────────────▶ Decoding ─────────────────────▶ Ordering ─▶ Synthesizing ─▶ Idle
//!     ▲                    │ empty scene                   │ missing pose
//!     └────────────────────┴───────────────────────────────┴──── failure / cancel()
//! ```
//!
//! A result whose token does not match the active mission changes nothing.
//! It is dropped with [`MissionError::Cancelled`] when that mission was
//! cancelled, and with [`MissionError::Stale`] otherwise.

use nalgebra::Vector3;
use rescue_env::{DronePose, LandmarkRegistry, MissionId, MissionStatus, SceneGeometry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::MissionError;
use crate::metrics::PipelineMetrics;
use crate::prompts;
use crate::surface_snap::{SnapMethod, SurfaceSnapper, Waypoint};
use crate::tour::{self, OrderedRoute};
use crate::trajectory::Trajectory;
use crate::waypoint_decoder::WaypointDecoder;

/// Where the orchestrator is in the mission lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionPhase {
    Idle,
    /// Waiting for the scene description
    Scanning,
    /// Waiting for the language model's waypoint reply
    Decoding,
    /// Snapping candidates and ordering the tour
    Ordering,
    /// Building the trajectory
    Synthesizing,
}

/// Why the fallback pattern was flown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// No language model is configured
    NoModel,
    /// The model failed, timed out, or answered with nothing
    EmptyResponse,
    /// The reply decoded to zero candidates
    NoCandidates,
}

/// Origin of the mission's waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaypointSource {
    Model,
    Fallback(FallbackReason),
}

impl WaypointSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// What the language model stage produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelReply<'a> {
    /// There is no model to ask
    NotConfigured,
    /// The call failed or timed out
    Failed,
    /// Raw reply text, possibly empty or garbled
    Text(&'a str),
}

/// Request for the vision stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub mission_id: MissionId,
    pub prompt: String,
}

/// Request for the language model stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaypointRequest {
    pub mission_id: MissionId,
    pub system_prompt: &'static str,
    pub user_prompt: String,
}

/// Outcome of a completed mission.
#[derive(Debug, Clone)]
pub struct MissionReport {
    pub status: MissionStatus,
    pub source: WaypointSource,
    /// False when the prompt dictated the flight order
    pub optimized: bool,
    /// Waypoints in flight order
    pub waypoints: Vec<Waypoint>,
    /// Snap outcome per waypoint, in flight order
    pub snaps: Vec<SnapMethod>,
}

#[derive(Debug, Clone)]
struct ActiveMission {
    id: MissionId,
    prompt: String,
}

/// Owns the mission state and the host's landmark registry.
pub struct MissionOrchestrator<R: LandmarkRegistry> {
    config: PipelineConfig,
    registry: R,
    decoder: WaypointDecoder,
    phase: MissionPhase,
    active: Option<ActiveMission>,
    /// Registry length before the current waypoints were added
    watermark: Option<usize>,
    /// Token of the most recently cancelled mission
    cancelled: Option<MissionId>,
    waypoints: Vec<Waypoint>,
    trajectory: Option<Trajectory>,
    metrics: PipelineMetrics,
}

impl<R: LandmarkRegistry> MissionOrchestrator<R> {
    /// Creates an idle orchestrator; rejects an invalid config.
    pub fn new(config: PipelineConfig, registry: R) -> Result<Self, MissionError> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            decoder: WaypointDecoder::new(),
            phase: MissionPhase::Idle,
            active: None,
            watermark: None,
            cancelled: None,
            waypoints: Vec::new(),
            trajectory: None,
            metrics: PipelineMetrics::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != MissionPhase::Idle
    }

    /// Token of the mission in flight, if any.
    pub fn active_mission(&self) -> Option<MissionId> {
        self.active.as_ref().map(|m| m.id)
    }

    pub fn is_active(&self, id: MissionId) -> bool {
        self.active_mission() == Some(id)
    }

    /// Waypoints of the last completed mission, in flight order.
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Samples the current trajectory at normalized arc parameter `t`.
    pub fn position_on_path(&self, t: f64) -> Option<Vector3<f64>> {
        self.trajectory.as_ref()?.position_at(t)
    }

    /// Starts a mission and returns the vision request.
    ///
    /// Rejected without any state change if a mission is already running or
    /// the prompt is blank. Otherwise the previous mission's waypoints are
    /// released before the new one begins.
    pub fn begin(&mut self, prompt: &str) -> Result<ScanRequest, MissionError> {
        if self.is_running() {
            warn!("Mission already running; start rejected");
            self.metrics.starts_rejected += 1;
            return Err(MissionError::AlreadyRunning);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            warn!("Empty mission prompt; start rejected");
            self.metrics.starts_rejected += 1;
            return Err(MissionError::EmptyPrompt);
        }

        self.release_waypoints();
        self.watermark = Some(self.registry.len());

        let id = MissionId::new();
        self.active = Some(ActiveMission {
            id,
            prompt: prompt.to_string(),
        });
        self.phase = MissionPhase::Scanning;
        self.metrics.missions_started += 1;
        info!("[{}] Mission {} started: {}", self.config.name, id, prompt);

        Ok(ScanRequest {
            mission_id: id,
            prompt: prompts::vision_prompt(prompt),
        })
    }

    /// Feeds the scene description back and returns the model request.
    ///
    /// A missing or blank description ends the mission in failure.
    pub fn on_scene_described(
        &mut self,
        id: MissionId,
        description: Option<&str>,
    ) -> Result<WaypointRequest, MissionError> {
        let prompt = self.expect_phase(id, MissionPhase::Scanning)?;

        let description = match description.map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => {
                return Err(self.fail(MissionError::SceneUnavailable(
                    "no scene description".to_string(),
                )))
            }
        };

        debug!("[{}] Scene: {}", id, description);
        self.phase = MissionPhase::Decoding;

        Ok(WaypointRequest {
            mission_id: id,
            system_prompt: prompts::WAYPOINT_SYSTEM_PROMPT,
            user_prompt: prompts::waypoint_user_prompt(description, &prompt),
        })
    }

    /// Feeds the model reply back and completes the mission.
    ///
    /// Snaps candidates (or places the fallback pattern), orders the tour,
    /// builds the trajectory from the drone's position and registers the
    /// waypoints. A failed build leaves the registry at the watermark.
    pub fn on_waypoints_suggested(
        &mut self,
        id: MissionId,
        reply: ModelReply<'_>,
        pose: Option<DronePose>,
        geometry: &dyn SceneGeometry,
    ) -> Result<MissionReport, MissionError> {
        let prompt = self.expect_phase(id, MissionPhase::Decoding)?;

        let Some(pose) = pose else {
            return Err(self.fail(MissionError::MissingCollaborator("reference pose")));
        };

        self.phase = MissionPhase::Ordering;

        let (placed, source) = self.place_waypoints(reply, &pose, geometry);

        let (waypoints, snaps): (Vec<Waypoint>, Vec<SnapMethod>) = placed.into_iter().unzip();

        let optimized = !prompts::has_directional_hint(&prompt, &self.config.directional_hints);
        let route = if optimized {
            tour::order(&waypoints, Some(pose.position))
        } else {
            debug!("[{}] Directional hint in prompt; keeping priority order", id);
            OrderedRoute::as_given(&waypoints)
        };

        self.phase = MissionPhase::Synthesizing;
        let trajectory = match Trajectory::build(
            &route.positions(),
            Some(pose.position),
            self.config.samples_per_segment,
        ) {
            Ok(trajectory) => trajectory,
            Err(e) => return Err(self.fail(e.into())),
        };

        if let Some(mark) = self.watermark {
            // Only this mission's entries may sit above the watermark
            self.registry.remove_generated_since(mark);
        }
        for waypoint in &waypoints {
            self.registry.add(&waypoint.name, waypoint.position);
        }

        let ordered: Vec<Waypoint> = route.stops().iter().map(|w| (*w).clone()).collect();
        let ordered_snaps: Vec<SnapMethod> = route.indices().iter().map(|&i| snaps[i]).collect();

        let count = ordered.len();
        let message = if source.is_fallback() {
            format!("{} points of interest. fallback pattern used.", count)
        } else {
            format!("{} points of interest. path computed.", count)
        };

        info!(
            "[{}] Mission {} ready: {} waypoints, {:.1}m path",
            self.config.name,
            id,
            count,
            trajectory.length()
        );

        self.waypoints = ordered.clone();
        self.trajectory = Some(trajectory);
        self.active = None;
        self.phase = MissionPhase::Idle;
        self.metrics.missions_completed += 1;
        if source.is_fallback() {
            self.metrics.fallbacks_used += 1;
        }

        Ok(MissionReport {
            status: MissionStatus::completed(id, count, message),
            source,
            optimized,
            waypoints: ordered,
            snaps: ordered_snaps,
        })
    }

    /// Abandons the mission in flight.
    ///
    /// Returns the cancellation status, or `None` when nothing was running.
    /// Any completion still in flight for the mission becomes stale.
    pub fn cancel(&mut self) -> Option<MissionStatus> {
        let mission = self.active.take()?;
        self.cancelled = Some(mission.id);
        self.phase = MissionPhase::Idle;
        self.metrics.missions_cancelled += 1;
        info!("[{}] Mission {} cancelled", self.config.name, mission.id);
        Some(MissionStatus::failed(mission.id, "mission cancelled"))
    }

    /// Releases the last mission's waypoints and trajectory.
    pub fn clear(&mut self) -> Result<(), MissionError> {
        if self.is_running() {
            return Err(MissionError::NotIdle);
        }
        self.release_waypoints();
        Ok(())
    }

    fn release_waypoints(&mut self) {
        if let Some(mark) = self.watermark.take() {
            let removed = self.registry.remove_generated_since(mark);
            debug!("Released {} generated landmarks", removed);
        }
        self.waypoints.clear();
        self.trajectory = None;
    }

    /// Checks the token and phase, returning the mission prompt.
    fn expect_phase(&mut self, id: MissionId, phase: MissionPhase) -> Result<String, MissionError> {
        match &self.active {
            Some(mission) if mission.id == id && self.phase == phase => Ok(mission.prompt.clone()),
            _ => {
                self.metrics.stale_completions += 1;
                if self.cancelled == Some(id) {
                    debug!("Dropping completion for cancelled mission {}", id);
                    Err(MissionError::Cancelled)
                } else {
                    debug!("Dropping stale completion for mission {}", id);
                    Err(MissionError::Stale(id))
                }
            }
        }
    }

    /// Ends the active mission in failure.
    fn fail(&mut self, error: MissionError) -> MissionError {
        if let Some(mission) = self.active.take() {
            warn!("[{}] Mission {} failed: {}", self.config.name, mission.id, error);
        }
        self.phase = MissionPhase::Idle;
        self.metrics.missions_failed += 1;
        error
    }

    fn place_waypoints(
        &mut self,
        reply: ModelReply<'_>,
        pose: &DronePose,
        geometry: &dyn SceneGeometry,
    ) -> (Vec<(Waypoint, SnapMethod)>, WaypointSource) {
        let fallback = match reply {
            ModelReply::NotConfigured => Some(FallbackReason::NoModel),
            ModelReply::Failed => Some(FallbackReason::EmptyResponse),
            ModelReply::Text(text) if text.trim().is_empty() => Some(FallbackReason::EmptyResponse),
            ModelReply::Text(_) => None,
        };

        let mut candidates = match (fallback, reply) {
            (None, ModelReply::Text(text)) => self.decoder.decode(text),
            _ => Vec::new(),
        };

        let reason = match fallback {
            Some(reason) => reason,
            None if candidates.is_empty() => FallbackReason::NoCandidates,
            None => {
                candidates.sort_by_key(|c| c.priority);
                let snapper = SurfaceSnapper::new(geometry, &self.config);
                let placed = candidates
                    .iter()
                    .map(|c| snapper.snap_candidate(c, pose))
                    .collect::<Vec<_>>();
                for (_, method) in &placed {
                    self.metrics.record_snap(*method);
                }
                return (placed, WaypointSource::Model);
            }
        };

        warn!("Using fallback search pattern ({:?})", reason);
        let placed = self
            .config
            .fallback_pattern
            .iter()
            .map(|f| {
                let position = pose.offset_to_world(f.forward, f.right, f.up);
                (Waypoint::new(f.name.clone(), position), SnapMethod::Unvalidated)
            })
            .collect();
        (placed, WaypointSource::Fallback(reason))
    }
}
