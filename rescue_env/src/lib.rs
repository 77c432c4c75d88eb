//! Rescue Mission Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" boundary that lets the mission pipeline
//! run both in **Production** (tokio, real models) and in **Simulation**
//! (virtual clock, scripted models, synthetic scenes).
//!
//! # Core Concept: Collaborators at the Edge
//!
//! Everything the pipeline does not own is a trait here:
//! - Time and scheduling (`MissionContext`)
//! - Vision and language models (`VisionService`, `LanguageModel`)
//! - Collision geometry (`SceneGeometry`)
//! - The host's landmark list (`LandmarkRegistry`)
//! - The drone's live pose and the status consumers (`PoseSource`, `MissionListener`)
//!
//! # Example
//!
//! ```ignore
//! use rescue_env::{MissionContext, VisionService};
//!
//! async fn describe<Ctx: MissionContext>(ctx: &Ctx, vision: &dyn VisionService) {
//!     let started = ctx.now();
//!     let scene = vision.scan("Describe the room").await;
//!     println!("{:?} after {:?}", scene, ctx.now() - started);
//! }
//! ```

mod context;
mod services;
mod scene;
mod registry;
mod types;
mod error;
mod tokio_impl;

pub use context::MissionContext;
pub use services::{LanguageModel, MissionListener, PoseSource, VisionService};
pub use scene::{LayerMask, RayHit, SceneGeometry};
pub use registry::LandmarkRegistry;
pub use types::{DronePose, MissionId, MissionStatus};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
