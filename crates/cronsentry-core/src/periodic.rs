//! Fixed-period background loops.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::error::MonitorError;

/// One unit of background work, run once per tick.
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    type Report: Debug + Send;

    fn name(&self) -> &'static str;

    async fn run_once(&self) -> Result<Self::Report, MonitorError>;
}

/// Run `task` every `period` until `stop` turns true or its sender is dropped.
///
/// The first run happens immediately. A run in progress is never cancelled;
/// the stop signal is only observed between runs. Failures are logged and the
/// loop keeps going.
pub async fn run_periodic<T: PeriodicTask>(
    task: Arc<T>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(task = task.name(), period_secs = period.as_secs(), "Periodic task started");

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                match task.run_once().await {
                    Ok(report) => debug!(task = task.name(), ?report, "Periodic run finished"),
                    Err(e) => error!(task = task.name(), "Periodic run failed: {}", e),
                }
            }
        }
    }

    info!(task = task.name(), "Periodic task stopped");
}

/// Spawn [`run_periodic`] on the current runtime.
pub fn spawn_periodic<T: PeriodicTask>(
    task: Arc<T>,
    period: Duration,
    stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_periodic(task, period, stop))
}
