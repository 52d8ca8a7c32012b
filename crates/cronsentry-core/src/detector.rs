//! Missed-run detection.
//!
//! Each sweep reads the overdue candidates and asks the store to move them to
//! Missing one by one. The store's conditional update decides the outcome, so
//! a candidate that was pinged or already transitioned in the meantime is
//! simply skipped.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use cronsentry_protocols::JobStore;

use crate::clock::Clock;
use crate::error::MonitorError;
use crate::periodic::PeriodicTask;

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub transitioned: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct MissedRunDetector {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl MissedRunDetector {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Run one sweep. Fails only when the candidate scan itself fails;
    /// per-job errors are logged and counted.
    pub async fn sweep(&self) -> Result<SweepReport, MonitorError> {
        let now = self.clock.now();
        let candidates = self.store.sweep_overdue(now).await?;
        let mut report = SweepReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for job in candidates {
            match self
                .store
                .mark_missing_if_still_healthy_or_late(&job.id, now)
                .await
            {
                Ok(true) => {
                    report.transitioned += 1;
                    info!(
                        job_id = %job.id,
                        job_name = %job.name,
                        expected_at = %job.next_expect,
                        "Job missed its check-in"
                    );
                }
                Ok(false) => {
                    report.skipped += 1;
                    debug!(job_id = %job.id, status = %job.status, "Sweep candidate skipped");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(job_id = %job.id, "Failed to mark job missing: {}", e);
                }
            }
        }

        if report.transitioned > 0 {
            info!(
                transitioned = report.transitioned,
                candidates = report.candidates,
                "Sweep complete"
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl PeriodicTask for MissedRunDetector {
    type Report = SweepReport;

    fn name(&self) -> &'static str {
        "missed-run-detector"
    }

    async fn run_once(&self) -> Result<SweepReport, MonitorError> {
        self.sweep().await
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
