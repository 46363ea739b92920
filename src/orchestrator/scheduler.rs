//! Periodic decision cycle task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::cycle::ReorderCycle;

/// Spawn the scheduled cycle task.
///
/// The first cycle runs immediately, then once per `interval`. A failed
/// cycle is logged and the schedule continues.
#[must_use]
pub fn spawn_cycle_task(
    cycle: Arc<ReorderCycle>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "cycle scheduler started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("cycle scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = cycle.run(false).await {
                        error!(%err, "scheduled reorder cycle failed");
                    }
                }
            }
        }
    })
}
