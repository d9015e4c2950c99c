//! Aggregation scheduler: background task that ticks the engine.
//!
//! Each tick spawns a run and goes back to waiting, so a slow run cannot
//! delay the clock; overlap is prevented by the engine's own guard, which
//! turns a busy tick into a dropped one.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::aggregation_service::AggregationEngine;

/// Spawn the scheduler. It stops when `shutdown` flips to `true` or its
/// sender is dropped.
pub fn spawn_scheduler(
    engine: AggregationEngine,
    period: Duration,
    run_on_start: bool,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            period_secs = period.as_secs(),
            run_on_start,
            "Aggregation scheduler started"
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !run_on_start {
            // The first tick of an interval completes immediately.
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let engine = engine.clone();
                    tokio::spawn(async move { engine.run_logged().await });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Aggregation scheduler stopped");
    })
}
