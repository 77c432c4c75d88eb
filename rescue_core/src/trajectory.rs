//! Trajectory Synthesizer - smooth flight path through ordered waypoints.
//!
//! Each waypoint becomes a knot with mirrored tangents, so the curve is C1 at
//! every knot. Consecutive knots are joined by a cubic Bézier segment
//! `(p0, p0 + out0, p1 + in1, p1)`.
//!
//! Tangent magnitudes follow the distance to neighbors:
//!
//! | knot                  | direction             | magnitude          |
//! |-----------------------|-----------------------|--------------------|
//! | anchor                | toward first waypoint | distance / 3       |
//! | lone waypoint         | +Z                    | 1                  |
//! | first (no anchor)     | toward next           | distance / 3       |
//! | last                  | from previous         | distance / 3       |
//! | interior              | next - previous       | span / 4           |
//!
//! Sampling is by normalized arc length, using per-segment lookup tables
//! built once when the trajectory is constructed.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from trajectory construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrajectoryError {
    /// No waypoints to fly through
    #[error("cannot build a trajectory from an empty route")]
    EmptyRoute,

    /// Lookup resolution was zero
    #[error("samples per segment must be at least 1")]
    NoSamples,
}

/// Control point with its in/out tangents (relative offsets).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub point: Vector3<f64>,
    pub tangent_in: Vector3<f64>,
    pub tangent_out: Vector3<f64>,
}

impl Knot {
    fn with_tangent(point: Vector3<f64>, direction: Vector3<f64>, magnitude: f64) -> Self {
        Self {
            point,
            tangent_in: -direction * magnitude,
            tangent_out: direction * magnitude,
        }
    }
}

/// A sampleable curve through a sequence of knots.
#[derive(Debug, Clone)]
pub struct Trajectory {
    knots: Vec<Knot>,
    /// Cumulative arc length at each lookup sample, per segment
    segment_tables: Vec<Vec<f64>>,
    /// Cumulative length at the start of each segment
    segment_offsets: Vec<f64>,
    total_length: f64,
}

/// Unit vector along `v`, or zero when `v` is degenerate.
fn direction(v: Vector3<f64>) -> Vector3<f64> {
    v.try_normalize(1e-12).unwrap_or_else(Vector3::zeros)
}

impl Trajectory {
    /// Builds a trajectory through `points`, optionally led by `anchor`.
    pub fn build(
        points: &[Vector3<f64>],
        anchor: Option<Vector3<f64>>,
        samples_per_segment: usize,
    ) -> Result<Self, TrajectoryError> {
        if points.is_empty() {
            return Err(TrajectoryError::EmptyRoute);
        }
        if samples_per_segment == 0 {
            return Err(TrajectoryError::NoSamples);
        }

        let mut knots = Vec::with_capacity(points.len() + 1);

        if let Some(start) = anchor {
            let to_first = points[0] - start;
            knots.push(Knot::with_tangent(start, direction(to_first), to_first.norm() / 3.0));
        }

        let n = points.len();
        for (i, &point) in points.iter().enumerate() {
            let (dir, magnitude) = if n == 1 {
                (Vector3::z(), 1.0)
            } else if i == 0 {
                let diff = points[1] - point;
                (direction(diff), diff.norm() / 3.0)
            } else if i == n - 1 {
                let diff = point - points[i - 1];
                (direction(diff), diff.norm() / 3.0)
            } else {
                let diff = points[i + 1] - points[i - 1];
                (direction(diff), diff.norm() / 4.0)
            };
            knots.push(Knot::with_tangent(point, dir, magnitude));
        }

        Ok(Self::from_knots(knots, samples_per_segment))
    }

    fn from_knots(knots: Vec<Knot>, samples_per_segment: usize) -> Self {
        let mut segment_tables = Vec::with_capacity(knots.len().saturating_sub(1));
        let mut segment_offsets = Vec::with_capacity(knots.len().saturating_sub(1));
        let mut total_length = 0.0;

        for pair in knots.windows(2) {
            let controls = segment_controls(&pair[0], &pair[1]);
            let mut table = Vec::with_capacity(samples_per_segment + 1);
            let mut length = 0.0;
            let mut prev = controls[0];
            table.push(0.0);
            for step in 1..=samples_per_segment {
                let u = step as f64 / samples_per_segment as f64;
                let p = bezier(&controls, u);
                length += (p - prev).norm();
                table.push(length);
                prev = p;
            }
            segment_offsets.push(total_length);
            total_length += length;
            segment_tables.push(table);
        }

        Self {
            knots,
            segment_tables,
            segment_offsets,
            total_length,
        }
    }

    pub fn knots(&self) -> &[Knot] {
        &self.knots
    }

    /// Approximate arc length of the whole curve.
    pub fn length(&self) -> f64 {
        self.total_length
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// Position at normalized arc parameter `t` (clamped to `[0, 1]`).
    ///
    /// Returns `None` only for a trajectory without knots.
    pub fn position_at(&self, t: f64) -> Option<Vector3<f64>> {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let (first, last) = (self.knots.first()?, self.knots.last()?);
        if self.segment_tables.is_empty() || self.total_length <= f64::EPSILON {
            return Some(if t < 1.0 { first.point } else { last.point });
        }
        if t >= 1.0 {
            return Some(last.point);
        }

        let target = t * self.total_length;

        // Last segment whose start offset is at or before the target
        let seg = self
            .segment_offsets
            .partition_point(|&offset| offset <= target)
            .saturating_sub(1);
        let local = target - self.segment_offsets[seg];
        let table = &self.segment_tables[seg];
        let u = table_parameter(table, local);

        let controls = segment_controls(&self.knots[seg], &self.knots[seg + 1]);
        Some(bezier(&controls, u))
    }

    /// `count` positions evenly spaced in arc length, endpoints included.
    pub fn sample_uniform(&self, count: usize) -> Vec<Vector3<f64>> {
        match count {
            0 => Vec::new(),
            1 => self.position_at(0.0).into_iter().collect(),
            _ => (0..count)
                .filter_map(|i| self.position_at(i as f64 / (count - 1) as f64))
                .collect(),
        }
    }
}

fn segment_controls(a: &Knot, b: &Knot) -> [Vector3<f64>; 4] {
    [a.point, a.point + a.tangent_out, b.point + b.tangent_in, b.point]
}

fn bezier(c: &[Vector3<f64>; 4], u: f64) -> Vector3<f64> {
    let v = 1.0 - u;
    c[0] * (v * v * v) + c[1] * (3.0 * v * v * u) + c[2] * (3.0 * v * u * u) + c[3] * (u * u * u)
}

/// Inverts a cumulative length table to a segment parameter in `[0, 1]`.
fn table_parameter(table: &[f64], length: f64) -> f64 {
    let steps = table.len() - 1;
    let seg_length = table[steps];
    if seg_length <= f64::EPSILON {
        return 0.0;
    }
    let length = length.clamp(0.0, seg_length);

    let hi = table.partition_point(|&l| l < length).clamp(1, steps);
    let lo = hi - 1;
    let span = table[hi] - table[lo];
    let frac = if span > f64::EPSILON {
        (length - table[lo]) / span
    } else {
        0.0
    };
    (lo as f64 + frac) / steps as f64
}
