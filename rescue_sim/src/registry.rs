//! In-memory landmark registry with goal selection.

use nalgebra::Vector3;
use rescue_env::LandmarkRegistry;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::SimContext;

/// A named point in the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub position: Vector3<f64>,
}

/// Landmark list in insertion order, plus the currently selected goal.
#[derive(Debug, Clone, Default)]
pub struct SimLandmarkRegistry {
    landmarks: Vec<Landmark>,
    /// Number of landmarks that belong to the scene itself
    pre_existing: usize,
    active_goal: Option<usize>,
}

impl SimLandmarkRegistry {
    /// Creates a registry seeded with the scene's own landmarks.
    pub fn with_scene_landmarks(landmarks: Vec<Landmark>) -> Self {
        let pre_existing = landmarks.len();
        info!("Found {} landmarks", pre_existing);
        Self {
            landmarks,
            pre_existing,
            active_goal: None,
        }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Landmarks added after the scene's own.
    pub fn generated(&self) -> &[Landmark] {
        &self.landmarks[self.pre_existing.min(self.landmarks.len())..]
    }

    /// Case-insensitive lookup by name.
    pub fn find(&self, name: &str) -> Option<&Landmark> {
        self.index_of(name).map(|i| &self.landmarks[i])
    }

    /// Selects the goal named `name`; unknown names leave the goal unchanged.
    pub fn set_active_goal(&mut self, name: &str) -> Option<&Landmark> {
        match self.index_of(name) {
            Some(i) => {
                self.active_goal = Some(i);
                info!("Goal set to: {}", self.landmarks[i].name);
                Some(&self.landmarks[i])
            }
            None => {
                warn!("Landmark not found: {}", name);
                None
            }
        }
    }

    /// Selects a goal at random using the context's seeded RNG.
    pub fn set_random_goal(&mut self, ctx: &SimContext) -> Option<&Landmark> {
        if self.landmarks.is_empty() {
            return None;
        }
        let pick = ctx.gen_index(self.landmarks.len());
        self.active_goal = Some(pick);
        info!("Random goal: {}", self.landmarks[pick].name);
        Some(&self.landmarks[pick])
    }

    pub fn active_goal(&self) -> Option<&Landmark> {
        self.active_goal.and_then(|i| self.landmarks.get(i))
    }

    /// Drops generated landmarks, keeping the scene's own.
    pub fn clear_generated(&mut self) -> usize {
        let mark = self.pre_existing;
        self.remove_generated_since(mark)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.landmarks.iter().position(|l| l.name.to_lowercase() == wanted)
    }
}

impl LandmarkRegistry for SimLandmarkRegistry {
    fn add(&mut self, name: &str, position: Vector3<f64>) {
        self.landmarks.push(Landmark {
            name: name.to_string(),
            position,
        });
    }

    fn len(&self) -> usize {
        self.landmarks.len()
    }

    fn remove_generated_since(&mut self, mark: usize) -> usize {
        if mark >= self.landmarks.len() {
            return 0;
        }
        let removed = self.landmarks.len() - mark;
        self.landmarks.truncate(mark);
        if self.active_goal.is_some_and(|i| i >= mark) {
            self.active_goal = None;
        }
        self.pre_existing = self.pre_existing.min(mark);
        removed
    }

    fn clear(&mut self) {
        self.landmarks.clear();
        self.pre_existing = 0;
        self.active_goal = None;
    }
}
