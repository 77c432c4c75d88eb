//! JSON exporter for mission paths.
//!
//! Exports a finished scenario's waypoints, Bézier knots and an
//! arc-length-uniform polyline so a flight path can be plotted offline.

use nalgebra::Vector3;
use rescue_core::{Knot, PipelineMetrics};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

use crate::runner::ScenarioResult;

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vector3<f64>> for ExportPoint {
    fn from(v: Vector3<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

/// A named waypoint, in flight order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportWaypoint {
    pub name: String,
    pub position: ExportPoint,
}

/// One trajectory knot with its handles resolved to world space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportKnot {
    pub point: ExportPoint,
    pub handle_in: ExportPoint,
    pub handle_out: ExportPoint,
}

impl From<&Knot> for ExportKnot {
    fn from(knot: &Knot) -> Self {
        Self {
            point: knot.point.into(),
            handle_in: (knot.point + knot.tangent_in).into(),
            handle_out: (knot.point + knot.tangent_out).into(),
        }
    }
}

/// Complete scenario export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Final result
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Virtual time consumed, in seconds
    pub duration_sec: f64,

    pub waypoints: Vec<ExportWaypoint>,
    pub knots: Vec<ExportKnot>,

    /// Evenly spaced points along the path
    pub samples: Vec<ExportPoint>,

    /// Arc length of the path in meters
    pub path_length: f64,

    /// Status lines reported during the run
    pub progress: Vec<String>,

    #[serde(skip_deserializing)]
    pub metrics: PipelineMetrics,
}

impl SimExport {
    /// Builds an export from a finished scenario, sampling the path `samples` times.
    pub fn from_result(result: &ScenarioResult, samples: usize) -> Self {
        let (knots, points, path_length) = match &result.trajectory {
            Some(trajectory) => (
                trajectory.knots().iter().map(ExportKnot::from).collect(),
                trajectory
                    .sample_uniform(samples)
                    .into_iter()
                    .map(ExportPoint::from)
                    .collect(),
                trajectory.length(),
            ),
            None => (Vec::new(), Vec::new(), 0.0),
        };

        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            duration_sec: result.virtual_time_secs,
            waypoints: result
                .waypoints
                .iter()
                .map(|w| ExportWaypoint {
                    name: w.name.clone(),
                    position: w.position.into(),
                })
                .collect(),
            knots,
            samples: points,
            path_length,
            progress: result.progress.clone(),
            metrics: result.metrics.clone(),
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
