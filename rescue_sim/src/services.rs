//! Scripted model services and a recording listener.

use async_trait::async_trait;
use rescue_env::{EnvError, LanguageModel, MissionContext, MissionListener, MissionStatus, VisionService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

use crate::context::SimContext;

/// One canned service answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// The service answers with this text (possibly empty)
    Text(String),
    /// The service call fails
    Error(String),
}

impl ScriptedReply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    fn into_result(self, service: &str) -> Result<String, EnvError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Error(msg) => Err(EnvError::service(format!("{}: {}", service, msg))),
        }
    }
}

/// Replies in order, repeating the last one once the script runs out.
struct Script {
    replies: Vec<ScriptedReply>,
    calls: AtomicUsize,
    latency: Duration,
    jitter: Duration,
    gate: Option<Arc<Notify>>,
}

impl Script {
    fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies,
            calls: AtomicUsize::new(0),
            latency: Duration::from_millis(800),
            jitter: Duration::from_millis(400),
            gate: None,
        }
    }

    async fn next(&self, ctx: &SimContext, service: &str) -> Result<String, EnvError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.sleep(ctx.jittered(self.latency, self.jitter)).await;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self
            .replies
            .get(call)
            .or_else(|| self.replies.last())
            .cloned()
            .ok_or_else(|| EnvError::empty(service))?;
        reply.into_result(service)
    }
}

/// Vision service that answers from a script.
pub struct ScriptedVision {
    ctx: Arc<SimContext>,
    script: Script,
}

impl ScriptedVision {
    pub fn new(ctx: Arc<SimContext>, replies: Vec<ScriptedReply>) -> Self {
        Self {
            ctx,
            script: Script::new(replies),
        }
    }

    /// Holds every reply until `gate` is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.script.gate = Some(gate);
        self
    }

    pub fn with_latency(mut self, latency: Duration, jitter: Duration) -> Self {
        self.script.latency = latency;
        self.script.jitter = jitter;
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionService for ScriptedVision {
    async fn scan(&self, _prompt: &str) -> Result<String, EnvError> {
        self.script.next(&self.ctx, "vision").await
    }
}

/// Language model that answers from a script and remembers what it was asked.
pub struct ScriptedLanguageModel {
    ctx: Arc<SimContext>,
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLanguageModel {
    pub fn new(ctx: Arc<SimContext>, replies: Vec<ScriptedReply>) -> Self {
        Self {
            ctx,
            script: Script::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.script.gate = Some(gate);
        self
    }

    pub fn with_latency(mut self, latency: Duration, jitter: Duration) -> Self {
        self.script.latency = latency;
        self.script.jitter = jitter;
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// User prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn ask(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, EnvError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(user_prompt.to_string());
        self.script.next(&self.ctx, "language model").await
    }
}

/// Listener that keeps everything it hears.
#[derive(Default)]
pub struct RecordingListener {
    progress: Mutex<Vec<String>>,
    completed: Mutex<Vec<MissionStatus>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> Vec<String> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn completed(&self) -> Vec<MissionStatus> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl MissionListener for RecordingListener {
    fn on_progress(&self, message: &str) {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn on_complete(&self, status: &MissionStatus) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status.clone());
    }
}
