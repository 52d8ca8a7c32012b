//! Liveness pings.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use cronsentry_protocols::{JobStore, PingOutcome};

use crate::clock::Clock;
use crate::error::MonitorError;
use crate::schedule::ScheduleRecompute;

/// Records pings and performs the Missing to Healthy recovery.
pub struct PingHandler {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    policy: Arc<ScheduleRecompute>,
}

impl PingHandler {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, policy: ScheduleRecompute) -> Self {
        Self {
            store,
            clock,
            policy: Arc::new(policy),
        }
    }

    /// Record a ping for `job_id`. Not retried; a failure is reported to the
    /// caller as is.
    #[instrument(skip(self))]
    pub async fn handle(&self, job_id: &str) -> Result<PingOutcome, MonitorError> {
        let now = self.clock.now();
        let outcome = self
            .store
            .record_ping_and_maybe_recover(job_id, now, self.policy.clone())
            .await?;

        if outcome.recovered() {
            info!(
                job_id = %outcome.job_id,
                next_expect = %outcome.next_expect,
                basis = %self.policy.basis(),
                "Job recovered"
            );
        } else {
            debug!(
                job_id = %outcome.job_id,
                status = %outcome.status,
                next_expect = %outcome.next_expect,
                "Ping recorded"
            );
        }
        Ok(outcome)
    }
}
