//! Pipeline Metrics
//! ================
//!
//! Plain counters owned by the orchestrator. They are updated inside state
//! transitions, so they need no synchronization of their own.

use serde::Serialize;

use crate::surface_snap::SnapMethod;

/// Counters accumulated across every mission an orchestrator runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    /// Missions that passed the start checks
    pub missions_started: u64,
    /// Missions that ended with a flyable path
    pub missions_completed: u64,
    /// Missions that ended in failure
    pub missions_failed: u64,
    /// Missions cancelled while in flight
    pub missions_cancelled: u64,
    /// Start requests turned away (already running, empty prompt)
    pub starts_rejected: u64,
    /// Missions that flew the fallback pattern
    pub fallbacks_used: u64,
    /// Completions dropped because their mission was no longer active
    pub stale_completions: u64,
    /// Candidates snapped by the downward cast
    pub snaps_surface_below: u64,
    /// Candidates snapped along the line of sight
    pub snaps_line_of_sight: u64,
    /// Candidates placed without any geometry hit
    pub snaps_unvalidated: u64,
}

impl PipelineMetrics {
    /// Records one snap outcome.
    pub fn record_snap(&mut self, method: SnapMethod) {
        match method {
            SnapMethod::SurfaceBelow => self.snaps_surface_below += 1,
            SnapMethod::LineOfSight => self.snaps_line_of_sight += 1,
            SnapMethod::Unvalidated => self.snaps_unvalidated += 1,
        }
    }

    /// Total candidates snapped.
    pub fn total_snaps(&self) -> u64 {
        self.snaps_surface_below + self.snaps_line_of_sight + self.snaps_unvalidated
    }

    /// Share of snaps that landed on geometry, in percent.
    pub fn validated_rate(&self) -> f64 {
        let total = self.total_snaps();
        if total > 0 {
            (self.snaps_surface_below + self.snaps_line_of_sight) as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_snap_buckets() {
        let mut metrics = PipelineMetrics::default();
        metrics.record_snap(SnapMethod::SurfaceBelow);
        metrics.record_snap(SnapMethod::SurfaceBelow);
        metrics.record_snap(SnapMethod::LineOfSight);
        metrics.record_snap(SnapMethod::Unvalidated);

        assert_eq!(metrics.snaps_surface_below, 2);
        assert_eq!(metrics.total_snaps(), 4);
        assert!((metrics.validated_rate() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_validated_rate_without_snaps() {
        assert_eq!(PipelineMetrics::default().validated_rate(), 0.0);
    }
}
