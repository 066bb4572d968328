// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::coordinator::{Coordinator, RunOutcome};

/// Spawn the periodic cycle driver. The first tick fires immediately,
/// so startup doubles as the initial ingest; a cycle that overruns the
/// interval delays the next tick instead of bursting.
pub fn spawn_cycle_scheduler(coordinator: Arc<Coordinator>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let outcomes = coordinator.run_cycle().await;

            let mut succeeded = 0usize;
            let mut failed = 0usize;
            let mut busy = 0usize;
            for outcome in &outcomes {
                match outcome {
                    RunOutcome::Completed(result) if result.is_success() => succeeded += 1,
                    RunOutcome::Completed(_) => failed += 1,
                    RunOutcome::AlreadyRunning => busy += 1,
                }
            }
            tracing::info!(
                target: "ingest",
                succeeded,
                failed,
                busy,
                "scheduled cycle complete"
            );
        }
    })
}
