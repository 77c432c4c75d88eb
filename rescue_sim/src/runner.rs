//! Scenario runner - executes mission pipeline scenarios.

use crate::scenarios::ScenarioId;
use crate::scene::SimScene;
use crate::services::{ScriptedLanguageModel, ScriptedReply, ScriptedVision};
use crate::world::{SimAgent, SimConfig, SimWorld};

use rescue_core::waypoint_decoder;
use rescue_core::{
    FallbackReason, MissionError, MissionPhase, PipelineConfig, PipelineMetrics, SnapMethod,
    Trajectory, Waypoint, WaypointSource,
};
use rescue_env::{LandmarkRegistry, MissionContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

/// Mission prompt used unless a scenario needs something specific.
pub const DEFAULT_PROMPT: &str = "Scan scene. Identify structural hazards and potential survivor \
locations (tables, corners). Prioritize tight gaps.";

/// Pause between checks while waiting on a background mission.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Virtual time consumed, in seconds
    pub virtual_time_secs: f64,

    /// Waypoints of the last completed mission, in flight order
    pub waypoints: Vec<Waypoint>,

    /// Trajectory of the last completed mission
    pub trajectory: Option<Trajectory>,

    /// Status lines the listener received
    pub progress: Vec<String>,

    /// Pipeline counters at the end of the run
    pub metrics: PipelineMetrics,
}

/// Runs mission scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Pipeline settings under test
    pipeline: PipelineConfig,

    /// Polls allowed while waiting on background missions
    poll_budget: usize,
}

/// Per-run state: the world and the agent a scenario installed.
struct Harness {
    world: SimWorld,
    agent: Option<Arc<SimAgent>>,
}

impl Harness {
    fn install(
        &mut self,
        vision: ScriptedVision,
        model: Option<ScriptedLanguageModel>,
    ) -> Result<(Arc<SimAgent>, Arc<ScriptedVision>, Option<Arc<ScriptedLanguageModel>>), String> {
        let vision = Arc::new(vision);
        let model = model.map(Arc::new);
        let agent = self
            .world
            .build_agent(vision.clone(), model.clone())
            .map_err(|e| format!("cannot build agent: {}", e))?;
        let agent = Arc::new(agent);
        self.agent = Some(agent.clone());
        Ok((agent, vision, model))
    }

    fn pre_existing(&self) -> usize {
        self.world.scene_landmarks().len()
    }
}

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

fn registry_len(agent: &SimAgent) -> usize {
    agent.with_orchestrator(|o| o.registry().len())
}

fn names(waypoints: &[Waypoint]) -> Vec<String> {
    waypoints.iter().map(|w| w.name.clone()).collect()
}

/// Names in the order the pipeline registers them (stable priority sort).
fn priority_order(reply: &str) -> Vec<String> {
    let mut candidates = waypoint_decoder::decode(reply);
    candidates.sort_by_key(|c| c.priority);
    candidates.into_iter().map(|c| c.name).collect()
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            pipeline: PipelineConfig::default(),
            poll_budget: 10_000,
        }
    }

    /// Sets the pipeline configuration.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        // Paused clock: idle waits jump to the next timer instead of blocking
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build();
        match runtime {
            Ok(runtime) => runtime.block_on(self.run_async(scenario)),
            Err(e) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                failure_reason: Some(format!("cannot start runtime: {}", e)),
                virtual_time_secs: 0.0,
                waypoints: Vec::new(),
                trajectory: None,
                progress: Vec::new(),
                metrics: PipelineMetrics::default(),
            },
        }
    }

    async fn run_async(&self, scenario: ScenarioId) -> ScenarioResult {
        let config = SimConfig {
            seed: self.seed,
            pipeline: self.pipeline.clone(),
            ..SimConfig::default()
        };
        let mut world = SimWorld::new(config);
        if scenario == ScenarioId::NoSurface {
            world = world.with_scene(SimScene::empty());
        }
        let mut harness = Harness { world, agent: None };

        let verdict = match scenario {
            ScenarioId::Nominal => self.run_nominal(&mut harness).await,
            ScenarioId::FencedReply => self.run_fenced_reply(&mut harness).await,
            ScenarioId::GarbledReply => self.run_garbled_reply(&mut harness).await,
            ScenarioId::SilentModel => self.run_silent_model(&mut harness).await,
            ScenarioId::BlindCamera => self.run_blind_camera(&mut harness).await,
            ScenarioId::NoSurface => self.run_no_surface(&mut harness).await,
            ScenarioId::Directional => self.run_directional(&mut harness).await,
            ScenarioId::DoubleStart => self.run_double_start(&mut harness).await,
            ScenarioId::CancelInFlight => self.run_cancel_in_flight(&mut harness).await,
            ScenarioId::Regenerate => self.run_regenerate(&mut harness).await,
            ScenarioId::SlowCamera => self.run_slow_camera(&mut harness).await,
            ScenarioId::SlowModel => self.run_slow_model(&mut harness).await,
        };

        let (waypoints, trajectory, metrics) = match &harness.agent {
            Some(agent) => agent.with_orchestrator(|o| {
                (o.waypoints().to_vec(), o.trajectory().cloned(), o.metrics().clone())
            }),
            None => (Vec::new(), None, PipelineMetrics::default()),
        };

        let virtual_time_secs = harness.world.context.now().as_secs_f64();
        debug!(
            "{} finished at t={:.2}s with {} waypoints",
            scenario,
            virtual_time_secs,
            waypoints.len()
        );

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: verdict.is_ok(),
            failure_reason: verdict.err(),
            virtual_time_secs,
            waypoints,
            trajectory,
            progress: harness.world.listener.progress(),
            metrics,
        }
    }

    /// Waypoint count for this seed (3 to 5).
    fn waypoint_count(&self) -> usize {
        3 + (self.seed % 3) as usize
    }

    /// Waits until no mission is running.
    async fn settle(&self, agent: &SimAgent) -> Result<(), String> {
        self.wait_for(|| !agent.is_running(), "mission never settled").await
    }

    async fn wait_for(&self, mut condition: impl FnMut() -> bool, what: &str) -> Result<(), String> {
        for _ in 0..self.poll_budget {
            if condition() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(what.to_string())
    }

    /// MSN-001: clean reply, all waypoints validated and optimized.
    async fn run_nominal(&self, h: &mut Harness) -> Result<(), String> {
        let count = self.waypoint_count();
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let model = h.world.model(vec![ScriptedReply::text(h.world.waypoint_reply(count))]);
        let (agent, _, _) = h.install(vision, Some(model))?;
        let drone = h.world.drone.position;

        let report = agent
            .run_mission(DEFAULT_PROMPT)
            .await
            .map_err(|e| format!("mission failed: {}", e))?;

        ensure(report.source == WaypointSource::Model, || {
            format!("expected model waypoints, got {:?}", report.source)
        })?;
        ensure(report.waypoints.len() == count, || {
            format!("expected {} waypoints, got {}", count, report.waypoints.len())
        })?;
        ensure(report.optimized, || "tour was not optimized".to_string())?;
        ensure(
            report.snaps.iter().all(|m| *m != SnapMethod::Unvalidated),
            || format!("unvalidated snaps in {:?}", report.snaps),
        )?;
        ensure(registry_len(&agent) == h.pre_existing() + count, || {
            format!("registry holds {} landmarks", registry_len(&agent))
        })?;

        let first_leg = (report.waypoints[0].position - drone).norm();
        ensure(
            report.waypoints.iter().all(|w| (w.position - drone).norm() >= first_leg),
            || "first stop is not the nearest waypoint".to_string(),
        )?;

        let start = agent
            .position_on_path(0.0)
            .ok_or_else(|| "no trajectory".to_string())?;
        ensure((start - drone).norm() < 1e-6, || {
            format!("path starts at {:?}, not at the drone", start)
        })?;
        let knots = agent.with_orchestrator(|o| o.trajectory().map(|t| t.knots().len()));
        ensure(knots == Some(count + 1), || format!("unexpected knot count {:?}", knots))?;

        let completed = h.world.listener.completed();
        ensure(completed.len() == 1 && completed[0].success, || {
            format!("unexpected completions: {:?}", completed)
        })?;
        ensure(
            h.world.listener.progress().iter().any(|p| p == "computing flight path..."),
            || "missing progress line".to_string(),
        )
    }

    /// MSN-002: fenced reply with chatter decodes like the bare array.
    async fn run_fenced_reply(&self, h: &mut Harness) -> Result<(), String> {
        let count = self.waypoint_count();
        let bare = h.world.waypoint_reply(count);
        let fenced = format!(
            "Sure! Here are the waypoints:\n```json\n{}\n```\nLet me know if you need more.",
            bare
        );
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let model = h.world.model(vec![ScriptedReply::text(fenced)]);
        let (agent, _, _) = h.install(vision, Some(model))?;

        let report = agent
            .run_mission(DEFAULT_PROMPT)
            .await
            .map_err(|e| format!("mission failed: {}", e))?;

        ensure(report.source == WaypointSource::Model, || {
            format!("fenced reply fell back: {:?}", report.source)
        })?;
        let mut got = names(&report.waypoints);
        let mut expected = priority_order(&bare);
        got.sort();
        expected.sort();
        ensure(got == expected, || format!("decoded {:?}, expected {:?}", got, expected))
    }

    /// MSN-003: prose-only reply flies the fallback pattern.
    async fn run_garbled_reply(&self, h: &mut Harness) -> Result<(), String> {
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let model = h.world.model(vec![ScriptedReply::text(
            "I'm sorry, I can't identify specific points of interest in this scene.",
        )]);
        let (agent, _, _) = h.install(vision, Some(model))?;

        let report = agent
            .run_mission(DEFAULT_PROMPT)
            .await
            .map_err(|e| format!("mission failed: {}", e))?;

        ensure(
            report.source == WaypointSource::Fallback(FallbackReason::NoCandidates),
            || format!("unexpected source {:?}", report.source),
        )?;
        ensure(report.waypoints.len() == 2, || {
            format!("fallback produced {} waypoints", report.waypoints.len())
        })?;
        ensure(
            report.status.message == "2 points of interest. fallback pattern used.",
            || format!("unexpected message {:?}", report.status.message),
        )?;
        ensure(registry_len(&agent) == h.pre_existing() + 2, || {
            "fallback waypoints not registered".to_string()
        })
    }

    /// MSN-004: no language model configured.
    async fn run_silent_model(&self, h: &mut Harness) -> Result<(), String> {
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let (agent, _, _) = h.install(vision, None)?;

        let report = agent
            .run_mission(DEFAULT_PROMPT)
            .await
            .map_err(|e| format!("mission failed: {}", e))?;

        ensure(
            report.source == WaypointSource::Fallback(FallbackReason::NoModel),
            || format!("unexpected source {:?}", report.source),
        )?;
        let mut got = names(&report.waypoints);
        got.sort();
        ensure(got == ["Search_Area_Alpha", "Search_Area_Beta"], || {
            format!("unexpected fallback names {:?}", got)
        })?;
        ensure(report.status.success, || "fallback mission reported failure".to_string())
    }

    /// MSN-005: empty scene description ends the mission once, cleanly.
    async fn run_blind_camera(&self, h: &mut Harness) -> Result<(), String> {
        let vision = h.world.vision(vec![ScriptedReply::text("")]);
        let model = h.world.model(vec![ScriptedReply::text(h.world.waypoint_reply(3))]);
        let (agent, _, model) = h.install(vision, Some(model))?;

        let err = match agent.run_mission(DEFAULT_PROMPT).await {
            Ok(report) => return Err(format!("mission unexpectedly succeeded: {}", report.status.message)),
            Err(e) => e,
        };

        ensure(matches!(err, MissionError::SceneUnavailable(_)), || {
            format!("unexpected error {}", err)
        })?;
        ensure(agent.phase() == MissionPhase::Idle, || "agent left running".to_string())?;
        ensure(model.map_or(0, |m| m.calls()) == 0, || {
            "model called without a scene".to_string()
        })?;
        ensure(registry_len(&agent) == h.pre_existing(), || {
            "registry changed on failure".to_string()
        })?;

        let completed = h.world.listener.completed();
        ensure(completed.len() == 1, || format!("{} completions", completed.len()))?;
        ensure(
            !completed[0].success && completed[0].message.starts_with("vision scan failed"),
            || format!("unexpected status {:?}", completed[0]),
        )
    }

    /// MSN-006: nothing to snap to, estimates kept.
    async fn run_no_surface(&self, h: &mut Harness) -> Result<(), String> {
        let count = self.waypoint_count();
        let vision = h.world.vision(vec![ScriptedReply::text("Thick smoke, nothing visible.")]);
        let model = h.world.model(vec![ScriptedReply::text(h.world.waypoint_reply(count))]);
        let (agent, _, _) = h.install(vision, Some(model))?;

        let report = agent
            .run_mission(DEFAULT_PROMPT)
            .await
            .map_err(|e| format!("mission failed: {}", e))?;

        ensure(
            report.snaps.iter().all(|m| *m == SnapMethod::Unvalidated),
            || format!("snapped without geometry: {:?}", report.snaps),
        )?;
        let metrics = agent.metrics();
        ensure(metrics.snaps_unvalidated == count as u64, || {
            format!("unvalidated counter is {}", metrics.snaps_unvalidated)
        })?;
        ensure(report.status.message.ends_with("path computed."), || {
            format!("unexpected message {:?}", report.status.message)
        })
    }

    /// MSN-007: directional prompt keeps priority order.
    async fn run_directional(&self, h: &mut Harness) -> Result<(), String> {
        let count = self.waypoint_count();
        let reply = h.world.waypoint_reply(count);
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let model = h.world.model(vec![ScriptedReply::text(reply.clone())]);
        let (agent, _, _) = h.install(vision, Some(model))?;

        let report = agent
            .run_mission("Sweep the room clockwise and start from the doorway")
            .await
            .map_err(|e| format!("mission failed: {}", e))?;

        ensure(!report.optimized, || "directional prompt was optimized".to_string())?;
        let expected = priority_order(&reply);
        let got = names(&report.waypoints);
        ensure(got == expected, || format!("flew {:?}, expected {:?}", got, expected))
    }

    /// MSN-008: second start while in flight is rejected.
    async fn run_double_start(&self, h: &mut Harness) -> Result<(), String> {
        let gate = Arc::new(Notify::new());
        let vision = h
            .world
            .vision(vec![ScriptedReply::text(h.world.scene_description())])
            .with_gate(gate.clone());
        let model = h.world.model(vec![ScriptedReply::text(h.world.waypoint_reply(3))]);
        let (agent, _, _) = h.install(vision, Some(model))?;

        agent
            .launch(DEFAULT_PROMPT)
            .map_err(|e| format!("first launch failed: {}", e))?;
        match agent.launch("a second mission") {
            Err(MissionError::AlreadyRunning) => {}
            other => return Err(format!("second launch not rejected: {:?}", other.map(|id| id.to_string()))),
        }

        gate.notify_one();
        self.settle(&agent).await?;

        let metrics = agent.metrics();
        ensure(metrics.starts_rejected == 1 && metrics.missions_completed == 1, || {
            format!("unexpected metrics {:?}", metrics)
        })?;
        let completed = h.world.listener.completed();
        ensure(completed.len() == 1, || format!("{} completions", completed.len()))
    }

    /// MSN-009: cancel during the model call, late reply discarded.
    async fn run_cancel_in_flight(&self, h: &mut Harness) -> Result<(), String> {
        let gate = Arc::new(Notify::new());
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let model = h
            .world
            .model(vec![ScriptedReply::text(h.world.waypoint_reply(3))])
            .with_gate(gate.clone());
        let (agent, _, model) = h.install(vision, Some(model))?;
        let model = model.ok_or_else(|| "model not installed".to_string())?;

        agent
            .launch(DEFAULT_PROMPT)
            .map_err(|e| format!("launch failed: {}", e))?;
        self.wait_for(|| model.calls() > 0, "model never called").await?;

        let status = agent.cancel().ok_or_else(|| "nothing to cancel".to_string())?;
        ensure(status.message == "mission cancelled", || {
            format!("unexpected cancel status {:?}", status)
        })?;

        gate.notify_one();
        self.wait_for(|| agent.metrics().stale_completions == 1, "late reply never arrived")
            .await?;

        ensure(!agent.is_running(), || "cancelled mission resumed".to_string())?;
        ensure(registry_len(&agent) == h.pre_existing(), || {
            "late reply registered waypoints".to_string()
        })?;
        ensure(agent.position_on_path(0.5).is_none(), || {
            "late reply produced a trajectory".to_string()
        })?;
        let completed = h.world.listener.completed();
        ensure(completed.len() == 1 && !completed[0].success, || {
            format!("unexpected completions {:?}", completed)
        })
    }

    /// MSN-010: a second mission replaces the first one's waypoints.
    async fn run_regenerate(&self, h: &mut Harness) -> Result<(), String> {
        let first_count = self.waypoint_count();
        let second_count = 2;
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let model = h.world.model(vec![
            ScriptedReply::text(h.world.waypoint_reply(first_count)),
            ScriptedReply::text(h.world.waypoint_reply(second_count)),
        ]);
        let (agent, _, _) = h.install(vision, Some(model))?;
        let pre = h.pre_existing();

        agent
            .run_mission(DEFAULT_PROMPT)
            .await
            .map_err(|e| format!("first mission failed: {}", e))?;
        ensure(registry_len(&agent) == pre + first_count, || {
            "first mission not registered".to_string()
        })?;

        let second = agent
            .run_mission("Look again, closer to the wall")
            .await
            .map_err(|e| format!("second mission failed: {}", e))?;
        ensure(registry_len(&agent) == pre + second_count, || {
            format!("registry holds {} after regeneration", registry_len(&agent))
        })?;

        let mut generated = agent.with_orchestrator(|o| {
            o.registry()
                .generated()
                .iter()
                .map(|l| l.name.clone())
                .collect::<Vec<_>>()
        });
        let mut flown = names(&second.waypoints);
        generated.sort();
        flown.sort();
        ensure(generated == flown, || {
            format!("registry {:?} does not match mission {:?}", generated, flown)
        })?;

        agent.clear().map_err(|e| format!("clear failed: {}", e))?;
        ensure(registry_len(&agent) == pre, || "clear left landmarks behind".to_string())
    }

    /// MSN-011: vision outlives its budget; the mission fails at the deadline.
    async fn run_slow_camera(&self, h: &mut Harness) -> Result<(), String> {
        let budget = Duration::from_millis(self.pipeline.vision_timeout_ms);
        let vision = h
            .world
            .vision(vec![ScriptedReply::text(h.world.scene_description())])
            .with_latency(budget * 2, Duration::ZERO);
        let model = h.world.model(vec![ScriptedReply::text(h.world.waypoint_reply(3))]);
        let (agent, vision, model) = h.install(vision, Some(model))?;

        let err = match agent.run_mission(DEFAULT_PROMPT).await {
            Ok(report) => return Err(format!("mission unexpectedly succeeded: {}", report.status.message)),
            Err(e) => e,
        };

        ensure(matches!(err, MissionError::SceneUnavailable(_)), || {
            format!("unexpected error {}", err)
        })?;
        ensure(vision.calls() == 1, || format!("{} vision calls", vision.calls()))?;
        ensure(model.map_or(0, |m| m.calls()) == 0, || {
            "model called without a scene".to_string()
        })?;

        let elapsed = h.world.context.now();
        ensure(elapsed >= budget && elapsed < budget * 2, || {
            format!("mission ended at {:?} against a {:?} budget", elapsed, budget)
        })?;
        let completed = h.world.listener.completed();
        ensure(completed.len() == 1 && !completed[0].success, || {
            format!("unexpected completions {:?}", completed)
        })
    }

    /// MSN-012: model outlives its budget; the fallback pattern is flown.
    async fn run_slow_model(&self, h: &mut Harness) -> Result<(), String> {
        let budget = Duration::from_millis(self.pipeline.model_timeout_ms);
        let vision = h.world.vision(vec![ScriptedReply::text(h.world.scene_description())]);
        let model = h
            .world
            .model(vec![ScriptedReply::text(h.world.waypoint_reply(3))])
            .with_latency(budget * 2, Duration::ZERO);
        let (agent, _, _) = h.install(vision, Some(model))?;

        let report = agent
            .run_mission(DEFAULT_PROMPT)
            .await
            .map_err(|e| format!("mission failed: {}", e))?;

        ensure(
            report.source == WaypointSource::Fallback(FallbackReason::EmptyResponse),
            || format!("unexpected source {:?}", report.source),
        )?;
        let expected = self.pipeline.fallback_pattern.len();
        ensure(report.waypoints.len() == expected, || {
            format!("{} waypoints, expected {}", report.waypoints.len(), expected)
        })?;
        let elapsed = h.world.context.now();
        ensure(elapsed >= budget && elapsed < budget * 2, || {
            format!("mission ended at {:?} against a {:?} budget", elapsed, budget)
        })
    }
}
