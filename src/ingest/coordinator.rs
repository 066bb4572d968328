//! Run coordination: one slot per source guarantees that at most one
//! run of a source is in flight, whether started by the scheduler or by
//! an admin trigger. Slots are claimed synchronously; the pipeline
//! itself runs in a spawned task so a panicking extractor poisons
//! nothing and the slot is always released.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::ExtractError;
use crate::ingest::snapshot::SnapshotSink;
use crate::ingest::types::{RunResult, RunState, SourceKind, SourceSpec};
use crate::ingest::{ensure_metrics_described, prepare_listings};
use crate::store::Store;

/// Synchronous answer to a trigger request; the run itself continues in
/// the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
}

/// Per-source entry of a cycle-wide trigger.
#[derive(Debug, Clone, Serialize)]
pub struct SourceTrigger {
    pub source: &'static str,
    pub outcome: TriggerOutcome,
}

/// Answer of an awaited run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunResult),
    AlreadyRunning,
}

/// Snapshot of one source's slot for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source: &'static str,
    pub kind: SourceKind,
    #[serde(flatten)]
    pub state: RunState,
    pub last_result: Option<RunResult>,
}

struct Slot {
    state: RunState,
    last: Option<RunResult>,
}

pub struct Coordinator {
    sources: Vec<SourceSpec>,
    slots: Vec<Mutex<Slot>>,
    store: Arc<Store>,
    snapshots: Option<Arc<dyn SnapshotSink>>,
    extract_timeout: Duration,
}

impl Coordinator {
    pub fn new(sources: Vec<SourceSpec>, store: Arc<Store>, extract_timeout: Duration) -> Self {
        let slots = sources
            .iter()
            .map(|_| {
                Mutex::new(Slot {
                    state: RunState::Idle,
                    last: None,
                })
            })
            .collect();
        Self {
            sources,
            slots,
            store,
            snapshots: None,
            extract_timeout,
        }
    }

    pub fn with_snapshots(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshots = Some(sink);
        self
    }

    pub fn source_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.id).collect()
    }

    /// Run one source to completion. `None` for an unknown source id.
    pub async fn run_source(self: &Arc<Self>, source: &str) -> Option<RunOutcome> {
        let idx = self.index_of(source)?;
        Some(self.run_idx(idx).await)
    }

    /// Run every source once, concurrently, and wait for all of them.
    /// Outcomes come back in roster order; sources already running are
    /// reported as such and left alone.
    pub async fn run_cycle(self: &Arc<Self>) -> Vec<RunOutcome> {
        let handles: Vec<_> = (0..self.sources.len())
            .map(|idx| {
                let this = Arc::clone(self);
                tokio::spawn(async move { this.run_idx(idx).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (idx, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let source = self.sources[idx].id;
                    error!(source, error = %err, "cycle task aborted");
                    RunOutcome::Completed(RunResult::failed(
                        source,
                        Utc::now(),
                        format!("run aborted: {err}"),
                    ))
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Claim one source and let its run continue in the background.
    /// `None` for an unknown source id.
    pub fn trigger_source(self: &Arc<Self>, source: &str) -> Option<TriggerOutcome> {
        let idx = self.index_of(source)?;
        Some(self.trigger_idx(idx))
    }

    /// Claim every source for a background run.
    pub fn trigger_cycle(self: &Arc<Self>) -> Vec<SourceTrigger> {
        (0..self.sources.len())
            .map(|idx| SourceTrigger {
                source: self.sources[idx].id,
                outcome: self.trigger_idx(idx),
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<SourceStatus> {
        self.sources
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                let slot = self.slots[idx].lock().expect("run slot poisoned");
                SourceStatus {
                    source: spec.id,
                    kind: spec.kind,
                    state: slot.state,
                    last_result: slot.last.clone(),
                }
            })
            .collect()
    }

    fn index_of(&self, source: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.id == source)
    }

    /// Idle -> Running transition under the slot lock; refuses when a
    /// run is already in flight.
    fn try_begin(&self, idx: usize, started_at: DateTime<Utc>) -> bool {
        let mut slot = self.slots[idx].lock().expect("run slot poisoned");
        match slot.state {
            RunState::Idle => {
                slot.state = RunState::Running { started_at };
                true
            }
            RunState::Running { .. } => false,
        }
    }

    fn finish(&self, idx: usize, result: RunResult) {
        let mut slot = self.slots[idx].lock().expect("run slot poisoned");
        slot.state = RunState::Idle;
        slot.last = Some(result);
    }

    async fn run_idx(self: &Arc<Self>, idx: usize) -> RunOutcome {
        let started_at = Utc::now();
        if !self.try_begin(idx, started_at) {
            return RunOutcome::AlreadyRunning;
        }
        RunOutcome::Completed(self.run_claimed(idx, started_at).await)
    }

    fn trigger_idx(self: &Arc<Self>, idx: usize) -> TriggerOutcome {
        let started_at = Utc::now();
        if !self.try_begin(idx, started_at) {
            return TriggerOutcome::AlreadyRunning;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_claimed(idx, started_at).await;
        });
        TriggerOutcome::Started
    }

    /// Drive a claimed run to completion and release the slot. The
    /// pipeline runs in its own task so a panic surfaces as a failed
    /// result instead of wedging the slot.
    async fn run_claimed(self: &Arc<Self>, idx: usize, started_at: DateTime<Utc>) -> RunResult {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.pipeline(idx, started_at).await });
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => {
                let source = self.sources[idx].id;
                error!(source, error = %err, "source run aborted");
                counter!("ingest_source_errors_total", "source" => source).increment(1);
                RunResult::failed(source, started_at, format!("run aborted: {err}"))
            }
        };
        self.finish(idx, result.clone());
        result
    }

    async fn pipeline(&self, idx: usize, started_at: DateTime<Utc>) -> RunResult {
        ensure_metrics_described();
        let spec = &self.sources[idx];
        let source = spec.id;

        let extracted =
            match tokio::time::timeout(self.extract_timeout, spec.extractor.extract()).await {
                Ok(Ok(records)) => records,
                Ok(Err(err)) => {
                    warn!(source, error = %err, "extraction failed");
                    counter!("ingest_source_errors_total", "source" => source).increment(1);
                    return RunResult::failed(source, started_at, err.to_string());
                }
                Err(_) => {
                    let err = ExtractError::Timeout(self.extract_timeout.as_secs());
                    warn!(source, error = %err, "extraction timed out");
                    counter!("ingest_source_errors_total", "source" => source).increment(1);
                    return RunResult::failed(source, started_at, err.to_string());
                }
            };
        counter!("ingest_records_total", "source" => source).increment(extracted.len() as u64);

        let scraped_at = Utc::now();
        let (listings, dropped) = prepare_listings(spec.kind, &extracted, source, scraped_at);
        counter!("ingest_dropped_unknown_total").increment(dropped as u64);

        let counts = self.store.upsert_all(&listings);
        counter!("ingest_upserts_total", "result" => "created").increment(counts.created as u64);
        counter!("ingest_upserts_total", "result" => "updated").increment(counts.updated as u64);
        counter!("ingest_upserts_total", "result" => "skipped").increment(counts.skipped as u64);

        if let Some(sink) = &self.snapshots {
            match serde_json::to_string_pretty(&listings) {
                Ok(payload) => {
                    if let Err(err) = sink.store(source, payload).await {
                        warn!(source, error = %err, "snapshot write failed");
                    }
                }
                Err(err) => warn!(source, error = %err, "snapshot serialization failed"),
            }
        }

        let ended_at = Utc::now();
        counter!("ingest_runs_total").increment(1);
        gauge!("ingest_last_run_ts").set(ended_at.timestamp() as f64);
        info!(
            source,
            extracted = extracted.len(),
            dropped,
            created = counts.created,
            updated = counts.updated,
            skipped = counts.skipped,
            "source run complete"
        );

        RunResult {
            source: source.to_string(),
            started_at,
            ended_at,
            extracted: extracted.len() as u32,
            dropped,
            counts,
            error: None,
        }
    }
}
