//! Health reporting for the ingest pipeline.
//!
//! The orchestrator polls the pipeline on a fixed interval and feeds the
//! result to a [`HealthTracker`], which logs only status transitions so a
//! stuck publisher shows up once rather than on every tick.

use std::time::Instant;

use u2post_core::pipeline::HealthStatus;

/// Point-in-time health report for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonHealth {
    /// Pipeline health status.
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Alerts published since start.
    pub alerts_published: u64,
    /// Failed publish attempts since start.
    pub publish_failures: u64,
    /// Records that failed to decode since start.
    pub decode_errors: u64,
}

/// Tracks the last observed status and logs changes.
#[derive(Debug)]
pub struct HealthTracker {
    last: HealthStatus,
    since: Instant,
}

impl HealthTracker {
    /// Create a tracker that assumes the pipeline starts healthy.
    pub fn new() -> Self {
        Self {
            last: HealthStatus::Healthy,
            since: Instant::now(),
        }
    }

    /// The most recently observed status.
    pub fn last(&self) -> &HealthStatus {
        &self.last
    }

    /// Record a new observation. Returns `true` if the status changed.
    pub fn observe(&mut self, status: HealthStatus) -> bool {
        if status == self.last {
            return false;
        }

        let held_secs = self.since.elapsed().as_secs();
        match &status {
            HealthStatus::Healthy => {
                tracing::info!(previous = %self.last, held_secs, "pipeline healthy again");
            }
            HealthStatus::Degraded(reason) => {
                tracing::warn!(reason = %reason, held_secs, "pipeline degraded");
            }
            HealthStatus::Unhealthy(reason) => {
                tracing::error!(reason = %reason, held_secs, "pipeline unhealthy");
            }
        }

        self.last = status;
        self.since = Instant::now();
        true
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transitions_are_reported() {
        let mut tracker = HealthTracker::new();
        assert!(!tracker.observe(HealthStatus::Healthy));

        let degraded = HealthStatus::Degraded("publisher down".to_owned());
        assert!(tracker.observe(degraded.clone()));
        assert!(!tracker.observe(degraded.clone()));
        assert_eq!(tracker.last(), &degraded);

        assert!(tracker.observe(HealthStatus::Healthy));
        assert!(tracker.last().is_healthy());
    }

    #[test]
    fn reason_change_counts_as_transition() {
        let mut tracker = HealthTracker::new();
        tracker.observe(HealthStatus::Degraded("a".to_owned()));
        assert!(tracker.observe(HealthStatus::Degraded("b".to_owned())));
    }
}
