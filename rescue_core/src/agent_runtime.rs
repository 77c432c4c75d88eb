//! Agent Runtime - drives the mission orchestrator against live collaborators.
//!
//! This module is the integration layer between the sans-IO orchestrator and
//! the environment abstraction (`MissionContext` plus the service traits).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MissionAgent                          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │          Mutex<MissionOrchestrator<Registry>>          │  │
//! │  │  • begin / on_scene_described / on_waypoints_suggested │  │
//! │  │  • locked per transition, never across an .await       │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                              │                               │
//! │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────┐ ┌──────────┐  │
//! │  │ VISION  │ │  MODEL  │ │ GEOMETRY │ │ POSE │ │ LISTENER │  │
//! │  └─────────┘ └─────────┘ └──────────┘ └──────┘ └──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rescue_core::agent_runtime::MissionAgent;
//! use rescue_core::{MissionOrchestrator, PipelineConfig};
//! use rescue_env::TokioContext;
//!
//! let orchestrator = MissionOrchestrator::new(PipelineConfig::default(), registry)?;
//! let agent = MissionAgent::new(TokioContext::shared(), orchestrator)
//!     .with_vision(vision)
//!     .with_language_model(model)
//!     .with_geometry(scene)
//!     .with_pose_source(drone);
//!
//! let report = agent.run_mission("find survivors near the stairs").await?;
//! ```

use nalgebra::Vector3;
use rescue_env::{
    EnvError, LandmarkRegistry, LanguageModel, MissionContext, MissionId, MissionListener,
    MissionStatus, PoseSource, SceneGeometry, VisionService,
};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::MissionError;
use crate::metrics::PipelineMetrics;
use crate::orchestrator::{MissionOrchestrator, MissionPhase, MissionReport, ModelReply, ScanRequest};

/// A mission agent bound to one orchestrator and its collaborators.
///
/// Generic over the context and registry implementations, so the same agent
/// runs against tokio and real models or inside the simulation harness.
pub struct MissionAgent<Ctx, R>
where
    Ctx: MissionContext,
    R: LandmarkRegistry,
{
    /// Environment context
    pub context: Arc<Ctx>,

    orchestrator: Mutex<MissionOrchestrator<R>>,
    vision: Option<Arc<dyn VisionService>>,
    model: Option<Arc<dyn LanguageModel>>,
    geometry: Option<Arc<dyn SceneGeometry>>,
    pose: Option<Arc<dyn PoseSource>>,
    listeners: Vec<Arc<dyn MissionListener>>,
    vision_timeout: Duration,
    model_timeout: Duration,
}

impl<Ctx, R> MissionAgent<Ctx, R>
where
    Ctx: MissionContext,
    R: LandmarkRegistry + 'static,
{
    /// Creates an agent with no collaborators attached.
    pub fn new(context: Arc<Ctx>, orchestrator: MissionOrchestrator<R>) -> Self {
        let vision_timeout = Duration::from_millis(orchestrator.config().vision_timeout_ms);
        let model_timeout = Duration::from_millis(orchestrator.config().model_timeout_ms);
        Self {
            context,
            orchestrator: Mutex::new(orchestrator),
            vision: None,
            model: None,
            geometry: None,
            pose: None,
            listeners: Vec::new(),
            vision_timeout,
            model_timeout,
        }
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionService>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Optional; without it every mission flies the fallback pattern.
    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_geometry(mut self, geometry: Arc<dyn SceneGeometry>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_pose_source(mut self, pose: Arc<dyn PoseSource>) -> Self {
        self.pose = Some(pose);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn MissionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Runs `f` with exclusive access to the orchestrator.
    pub fn with_orchestrator<T>(&self, f: impl FnOnce(&mut MissionOrchestrator<R>) -> T) -> T {
        f(&mut self.lock())
    }

    pub fn phase(&self) -> MissionPhase {
        self.lock().phase()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    pub fn metrics(&self) -> PipelineMetrics {
        self.lock().metrics().clone()
    }

    /// Samples the current trajectory at normalized arc parameter `t`.
    pub fn position_on_path(&self, t: f64) -> Option<Vector3<f64>> {
        self.lock().position_on_path(t)
    }

    /// Runs a whole mission and waits for its outcome.
    ///
    /// Fails synchronously when a required collaborator is missing, the
    /// prompt is blank, or a mission is already running; only the missing
    /// collaborator case is reported to listeners. Returns
    /// `MissionError::Cancelled` if the mission was cancelled while a stage
    /// was in flight, and `MissionError::Stale` if it was superseded.
    pub async fn run_mission(&self, prompt: &str) -> Result<MissionReport, MissionError> {
        let request = self.start(prompt)?;
        self.drive(request).await
    }

    /// Starts a mission and drives it in the background via the context.
    pub fn launch(self: &Arc<Self>, prompt: &str) -> Result<MissionId, MissionError> {
        let request = self.start(prompt)?;
        let id = request.mission_id;
        let agent = Arc::clone(self);
        self.context.spawn("mission", async move {
            // Outcome already reported to listeners
            let _ = agent.drive(request).await;
        });
        Ok(id)
    }

    /// Cancels the mission in flight, notifying listeners.
    pub fn cancel(&self) -> Option<MissionStatus> {
        let status = self.lock().cancel()?;
        self.notify_progress(&status.message);
        self.notify_complete(&status);
        Some(status)
    }

    /// Releases the last mission's waypoints and trajectory.
    pub fn clear(&self) -> Result<(), MissionError> {
        self.lock().clear()
    }

    fn start(&self, prompt: &str) -> Result<ScanRequest, MissionError> {
        for (name, present) in [
            ("vision", self.vision.is_some()),
            ("scene geometry", self.geometry.is_some()),
            ("pose source", self.pose.is_some()),
        ] {
            if !present {
                error!("Missing subsystem reference: {}", name);
                // No mission was begun, so the status carries a fresh token
                return Err(self.conclude(MissionId::new(), MissionError::MissingCollaborator(name)));
            }
        }

        let request = self.lock().begin(prompt)?;
        self.notify_progress("scanning environment...");
        Ok(request)
    }

    async fn drive(&self, request: ScanRequest) -> Result<MissionReport, MissionError> {
        let id = request.mission_id;
        let started = self.context.now();

        let vision = self
            .vision
            .clone()
            .ok_or(MissionError::MissingCollaborator("vision"))?;
        let description = match self.call_with_timeout(self.vision_timeout, vision.scan(&request.prompt)).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("[{}] Vision scan failed: {}", id, e);
                None
            }
        };

        let outcome = self.lock().on_scene_described(id, description.as_deref());
        let waypoint_request = outcome.map_err(|e| self.conclude(id, e))?;
        self.notify_progress("generating waypoints...");

        let reply = match &self.model {
            Some(model) => {
                let call = model.ask(waypoint_request.system_prompt, &waypoint_request.user_prompt);
                match self.call_with_timeout(self.model_timeout, call).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("[{}] Language model failed: {}", id, e);
                        None
                    }
                }
            }
            None => None,
        };
        let reply = match (&self.model, &reply) {
            (None, _) => ModelReply::NotConfigured,
            (Some(_), None) => ModelReply::Failed,
            (Some(_), Some(text)) => ModelReply::Text(text),
        };

        if self.lock().is_active(id) {
            self.notify_progress("computing flight path...");
        }

        let pose = self.pose.as_ref().and_then(|p| p.current_pose());
        let geometry = self
            .geometry
            .clone()
            .ok_or(MissionError::MissingCollaborator("scene geometry"))?;

        let outcome = self
            .lock()
            .on_waypoints_suggested(id, reply, pose, geometry.as_ref());
        let report = outcome.map_err(|e| self.conclude(id, e))?;

        info!(
            "[{}] Mission finished in {:.2}s: {}",
            id,
            (self.context.now() - started).as_secs_f64(),
            report.status.message
        );
        self.notify_progress(&format!(
            "mission ready: {} points of interest",
            report.status.waypoint_count
        ));
        self.notify_complete(&report.status);
        Ok(report)
    }

    /// Reports a fatal error to listeners; stale completions stay silent.
    fn conclude(&self, id: MissionId, err: MissionError) -> MissionError {
        if err.is_fatal() {
            let status = MissionStatus::failed(id, err.to_string());
            self.notify_progress(&status.message);
            self.notify_complete(&status);
        }
        err
    }

    /// Races a service call against the context's clock.
    async fn call_with_timeout<F>(&self, budget: Duration, call: F) -> Result<String, EnvError>
    where
        F: Future<Output = Result<String, EnvError>>,
    {
        tokio::select! {
            biased;
            result = call => result,
            _ = self.context.sleep(budget) => Err(EnvError::Timeout(budget.as_millis() as u64)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MissionOrchestrator<R>> {
        self.orchestrator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_progress(&self, message: &str) {
        info!("{}", message);
        for listener in &self.listeners {
            listener.on_progress(message);
        }
    }

    fn notify_complete(&self, status: &MissionStatus) {
        for listener in &self.listeners {
            listener.on_complete(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::orchestrator::{FallbackReason, WaypointSource};
    use async_trait::async_trait;
    use rescue_env::{DronePose, LayerMask, RayHit, TokioContext};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct VecRegistry(Vec<String>);

    impl LandmarkRegistry for VecRegistry {
        fn add(&mut self, name: &str, _position: Vector3<f64>) {
            self.0.push(name.to_string());
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn remove_generated_since(&mut self, mark: usize) -> usize {
            let removed = self.0.len().saturating_sub(mark);
            self.0.truncate(mark);
            removed
        }

        fn clear(&mut self) {
            self.0.clear();
        }
    }

    struct Ground;

    impl SceneGeometry for Ground {
        fn raycast(&self, origin: Vector3<f64>, dir: Vector3<f64>, max: f64, _: LayerMask) -> Option<RayHit> {
            if dir.y >= 0.0 {
                return None;
            }
            let t = -origin.y / dir.y;
            (t <= max).then(|| RayHit {
                point: origin + dir * t,
                normal: Vector3::y(),
                distance: t,
            })
        }
    }

    /// Vision stub that can hold its reply until released.
    struct GatedVision {
        reply: String,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionService for GatedVision {
        async fn scan(&self, _prompt: &str) -> Result<String, EnvError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(self.reply.clone())
        }
    }

    struct FixedModel(Result<String, ()>);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn ask(&self, _system: &str, _user: &str) -> Result<String, EnvError> {
            self.0.clone().map_err(|_| EnvError::service("model offline"))
        }
    }

    /// Answers only after `delay` on the tokio clock.
    struct SlowService {
        reply: String,
        delay: Duration,
    }

    #[async_trait]
    impl VisionService for SlowService {
        async fn scan(&self, _prompt: &str) -> Result<String, EnvError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.reply.clone())
        }
    }

    #[async_trait]
    impl LanguageModel for SlowService {
        async fn ask(&self, _system: &str, _user: &str) -> Result<String, EnvError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.reply.clone())
        }
    }

    fn short_timeouts() -> PipelineConfig {
        PipelineConfig {
            vision_timeout_ms: 1_000,
            model_timeout_ms: 1_000,
            ..PipelineConfig::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<String>>,
        completed: Mutex<Vec<MissionStatus>>,
    }

    impl MissionListener for Recorder {
        fn on_progress(&self, message: &str) {
            self.progress.lock().unwrap().push(message.to_string());
        }

        fn on_complete(&self, status: &MissionStatus) {
            self.completed.lock().unwrap().push(status.clone());
        }
    }

    const REPLY: &str = r#"```json
[{"name":"doorway","forward":4,"right":1,"up":0,"priority":1}]
```"#;

    fn vision(reply: &str, gate: Option<Arc<Notify>>) -> Arc<GatedVision> {
        Arc::new(GatedVision {
            reply: reply.to_string(),
            gate,
            calls: AtomicUsize::new(0),
        })
    }

    fn agent(
        vision: Arc<GatedVision>,
        recorder: Arc<Recorder>,
    ) -> MissionAgent<TokioContext, VecRegistry> {
        let orchestrator = MissionOrchestrator::new(PipelineConfig::default(), VecRegistry::default()).unwrap();
        MissionAgent::new(TokioContext::shared(), orchestrator)
            .with_vision(vision)
            .with_language_model(Arc::new(FixedModel(Ok(REPLY.to_string()))))
            .with_geometry(Arc::new(Ground))
            .with_pose_source(Arc::new(DronePose::level(Vector3::new(0.0, 2.0, 0.0), 0.0)))
            .with_listener(recorder)
    }

    #[tokio::test]
    async fn test_run_mission_end_to_end() {
        let recorder = Arc::new(Recorder::default());
        let agent = agent(vision("a hallway with a door", None), recorder.clone());

        let report = agent.run_mission("check the doorway").await.unwrap();

        assert_eq!(report.source, WaypointSource::Model);
        assert_eq!(report.waypoints[0].name, "doorway");
        assert!(!agent.is_running());
        assert!(agent.position_on_path(0.5).is_some());

        let progress = recorder.progress.lock().unwrap().clone();
        assert_eq!(
            progress,
            vec![
                "scanning environment...",
                "generating waypoints...",
                "computing flight path...",
                "mission ready: 1 points of interest",
            ]
        );
        let completed = recorder.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].message, "1 points of interest. path computed.");
    }

    #[tokio::test]
    async fn test_model_error_falls_back() {
        let recorder = Arc::new(Recorder::default());
        let agent = agent(vision("a room", None), recorder.clone())
            .with_language_model(Arc::new(FixedModel(Err(()))));

        let report = agent.run_mission("find survivors").await.unwrap();

        assert_eq!(report.source, WaypointSource::Fallback(FallbackReason::EmptyResponse));
        assert_eq!(report.waypoints.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_vision_fails_once() {
        let recorder = Arc::new(Recorder::default());
        let agent = agent(vision("", None), recorder.clone());

        let err = agent.run_mission("find survivors").await.unwrap_err();

        assert!(matches!(err, MissionError::SceneUnavailable(_)));
        let completed = recorder.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(!completed[0].success);
        assert!(completed[0].message.starts_with("vision scan failed"));
    }

    #[tokio::test]
    async fn test_missing_collaborator_rejected_synchronously() {
        let recorder = Arc::new(Recorder::default());
        let orchestrator = MissionOrchestrator::new(PipelineConfig::default(), VecRegistry::default()).unwrap();
        let agent = MissionAgent::new(TokioContext::shared(), orchestrator)
            .with_vision(vision("room", None))
            .with_listener(recorder.clone());

        let err = agent.run_mission("find survivors").await.unwrap_err();

        assert!(matches!(err, MissionError::MissingCollaborator("scene geometry")));
        assert!(!agent.is_running());
        assert_eq!(agent.metrics().missions_started, 0);

        let completed = recorder.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(!completed[0].success);
        assert_eq!(completed[0].message, "missing subsystem reference: scene geometry");
    }

    #[tokio::test]
    async fn test_double_start_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let recorder = Arc::new(Recorder::default());
        let agent = Arc::new(agent(vision("room", Some(gate.clone())), recorder.clone()));

        agent.launch("first").unwrap();
        assert!(matches!(agent.launch("second"), Err(MissionError::AlreadyRunning)));
        assert_eq!(agent.metrics().starts_rejected, 1);

        gate.notify_one();
        while agent.is_running() {
            tokio::task::yield_now().await;
        }
        assert_eq!(recorder.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_in_flight_discards_late_reply() {
        let gate = Arc::new(Notify::new());
        let recorder = Arc::new(Recorder::default());
        let vision = vision("room", Some(gate.clone()));
        let agent = Arc::new(agent(vision.clone(), recorder.clone()));

        let pending = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.run_mission("find survivors").await })
        };
        while vision.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let status = agent.cancel().unwrap();
        assert_eq!(status.message, "mission cancelled");
        assert_eq!(agent.phase(), MissionPhase::Idle);

        gate.notify_one();
        let result = pending.await.unwrap();

        assert!(matches!(result, Err(MissionError::Cancelled)));
        assert_eq!(agent.phase(), MissionPhase::Idle);
        assert!(agent.position_on_path(0.0).is_none());
        assert_eq!(recorder.completed.lock().unwrap().len(), 1);
        assert_eq!(agent.metrics().stale_completions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_vision_times_out_on_context_clock() {
        let recorder = Arc::new(Recorder::default());
        let orchestrator = MissionOrchestrator::new(short_timeouts(), VecRegistry::default()).unwrap();
        let agent = MissionAgent::new(TokioContext::shared(), orchestrator)
            .with_vision(Arc::new(SlowService {
                reply: "a room".to_string(),
                delay: Duration::from_secs(60),
            }))
            .with_geometry(Arc::new(Ground))
            .with_pose_source(Arc::new(DronePose::level(Vector3::new(0.0, 2.0, 0.0), 0.0)))
            .with_listener(recorder.clone());

        let started = agent.context.now();
        let err = agent.run_mission("find survivors").await.unwrap_err();
        let elapsed = agent.context.now() - started;

        assert!(matches!(err, MissionError::SceneUnavailable(_)));
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(60));
        assert_eq!(recorder.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_model_times_out_into_fallback() {
        let recorder = Arc::new(Recorder::default());
        let orchestrator = MissionOrchestrator::new(short_timeouts(), VecRegistry::default()).unwrap();
        let agent = MissionAgent::new(TokioContext::shared(), orchestrator)
            .with_vision(vision("a room", None))
            .with_language_model(Arc::new(SlowService {
                reply: REPLY.to_string(),
                delay: Duration::from_secs(60),
            }))
            .with_geometry(Arc::new(Ground))
            .with_pose_source(Arc::new(DronePose::level(Vector3::new(0.0, 2.0, 0.0), 0.0)))
            .with_listener(recorder.clone());

        let started = agent.context.now();
        let report = agent.run_mission("find survivors").await.unwrap();

        assert_eq!(report.source, WaypointSource::Fallback(FallbackReason::EmptyResponse));
        assert!(agent.context.now() - started < Duration::from_secs(60));
    }
}
