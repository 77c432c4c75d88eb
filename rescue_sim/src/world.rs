//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::registry::{Landmark, SimLandmarkRegistry};
use crate::scene::SimScene;
use crate::services::{RecordingListener, ScriptedLanguageModel, ScriptedReply, ScriptedVision};

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rescue_core::{MissionAgent, MissionError, MissionOrchestrator, PipelineConfig};
use rescue_env::DronePose;
use std::sync::Arc;
use std::time::Duration;

/// Agent type every scenario drives.
pub type SimAgent = MissionAgent<SimContext, SimLandmarkRegistry>;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Pipeline settings under test
    pub pipeline: PipelineConfig,

    /// Drone start position
    pub drone_position: Vector3<f64>,

    /// Drone heading about world up, in radians
    pub drone_yaw: f64,

    /// Base latency of scripted model calls
    pub service_latency: Duration,

    /// Extra random latency on top of the base
    pub service_jitter: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            pipeline: PipelineConfig::default(),
            drone_position: Vector3::new(0.0, 1.5, 0.0),
            drone_yaw: 0.0,
            service_latency: Duration::from_millis(800),
            service_jitter: Duration::from_millis(400),
        }
    }
}

/// The SimWorld - container for one simulated mission environment.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Collision geometry
    pub scene: Arc<SimScene>,

    /// Drone pose missions are planned from
    pub drone: DronePose,

    /// Collects everything the agent reports
    pub listener: Arc<RecordingListener>,
}

impl SimWorld {
    /// Creates a world around the collapsed-room scene.
    pub fn new(config: SimConfig) -> Self {
        let context = SimContext::shared(config.seed);
        let drone = DronePose::level(config.drone_position, config.drone_yaw);
        Self {
            config,
            context,
            scene: Arc::new(SimScene::collapsed_room()),
            drone,
            listener: Arc::new(RecordingListener::new()),
        }
    }

    pub fn with_scene(mut self, scene: SimScene) -> Self {
        self.scene = Arc::new(scene);
        self
    }

    /// Landmarks that exist before any mission runs.
    pub fn scene_landmarks(&self) -> Vec<Landmark> {
        [
            ("Kitchen", Vector3::new(4.0, 0.0, 2.0)),
            ("Stairwell", Vector3::new(-3.0, 0.0, 8.0)),
            ("Exit", Vector3::new(0.0, 0.0, -4.0)),
        ]
        .into_iter()
        .map(|(name, position)| Landmark {
            name: name.to_string(),
            position,
        })
        .collect()
    }

    pub fn vision(&self, replies: Vec<ScriptedReply>) -> ScriptedVision {
        ScriptedVision::new(self.context.clone(), replies)
            .with_latency(self.config.service_latency, self.config.service_jitter)
    }

    pub fn model(&self, replies: Vec<ScriptedReply>) -> ScriptedLanguageModel {
        ScriptedLanguageModel::new(self.context.clone(), replies)
            .with_latency(self.config.service_latency, self.config.service_jitter)
    }

    /// Builds an agent wired to this world's scene, drone and listener.
    ///
    /// Fails if the pipeline settings do not validate.
    pub fn build_agent(
        &self,
        vision: Arc<ScriptedVision>,
        model: Option<Arc<ScriptedLanguageModel>>,
    ) -> Result<SimAgent, MissionError> {
        let registry = SimLandmarkRegistry::with_scene_landmarks(self.scene_landmarks());
        let orchestrator = MissionOrchestrator::new(self.config.pipeline.clone(), registry)?;

        let agent = MissionAgent::new(self.context.clone(), orchestrator)
            .with_vision(vision)
            .with_geometry(self.scene.clone())
            .with_pose_source(Arc::new(self.drone))
            .with_listener(self.listener.clone());

        Ok(match model {
            Some(model) => agent.with_language_model(model),
            None => agent,
        })
    }

    /// A plausible model reply with `count` seeded waypoints ahead of the drone.
    pub fn waypoint_reply(&self, count: usize) -> String {
        let names = ["table_gap", "corner_void", "doorway", "rubble_pile", "stair_base", "window"];
        let entries: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                let forward = 2.0 + i as f64 * 1.5 + self.context.gen_index(100) as f64 / 100.0;
                let right = self.context.gen_index(600) as f64 / 100.0 - 3.0;
                serde_json::json!({
                    "name": names[i % names.len()],
                    "forward": forward,
                    "right": right,
                    "up": 0.5,
                    "priority": count - i,
                })
            })
            .collect();
        serde_json::Value::Array(entries).to_string()
    }

    /// Seeded description of the scene, as a vision model might give it.
    pub fn scene_description(&self) -> String {
        // Independent stream from the context's RNG
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_mul(0x9e3779b97f4a7c15));
        let debris = rng.gen_range(2..6);
        format!(
            "A collapsed room with a table, a partially fallen wall ahead and {} piles of debris.",
            debris
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoint_reply_is_seeded_json() {
        let a = SimWorld::new(SimConfig::default());
        let b = SimWorld::new(SimConfig::default());

        let reply = a.waypoint_reply(3);
        assert_eq!(reply, b.waypoint_reply(3));

        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_scene_landmarks() {
        let world = SimWorld::new(SimConfig::default());
        assert_eq!(world.scene_landmarks().len(), 3);
        assert!(world.scene_description().contains("collapsed room"));
    }

    #[test]
    fn test_build_agent_rejects_invalid_pipeline() {
        let mut config = SimConfig::default();
        config.pipeline.samples_per_segment = 0;
        let world = SimWorld::new(config);

        let vision = Arc::new(world.vision(vec![ScriptedReply::text("room")]));
        assert!(world.build_agent(vision, None).is_err());
    }
}
