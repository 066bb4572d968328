// src/ingest/mod.rs
pub mod coordinator;
pub mod scheduler;
pub mod snapshot;
pub mod sources;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::classify::{classify_title, EventClass};
use crate::ingest::types::SourceKind;
use crate::listing::{Category, NormalizedListing};
use crate::normalize::normalize;
use crate::record::RawRecord;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_records_total",
            "Raw records extracted, labeled by source."
        );
        describe_counter!(
            "ingest_dropped_unknown_total",
            "Event records dropped because no event class matched."
        );
        describe_counter!(
            "ingest_upserts_total",
            "Upsert outcomes, labeled created/updated/skipped."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Failed source runs, labeled by source."
        );
        describe_counter!("ingest_runs_total", "Completed source runs.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when a source run last finished."
        );
        describe_gauge!(
            "ingest_run_interval_seconds",
            "Configured seconds between scheduled cycles."
        );
    });
}

/// Classify and normalize one extraction batch. Event sources are split
/// into hackathons and competitions by title keywords; records matching
/// neither class are dropped and counted. Course and internship sources
/// carry a fixed category, so nothing is dropped.
pub fn prepare_listings(
    kind: SourceKind,
    records: &[RawRecord],
    source: &str,
    scraped_at: DateTime<Utc>,
) -> (Vec<NormalizedListing>, u32) {
    let mut listings = Vec::with_capacity(records.len());
    let mut dropped = 0u32;

    for rec in records {
        let category = match kind.fixed_category() {
            Some(category) => category,
            None => {
                let title = rec.str("title").unwrap_or_default();
                match classify_title(title) {
                    EventClass::Hackathon => Category::Hackathon,
                    EventClass::Competition => Category::Competition,
                    EventClass::Unknown => {
                        dropped += 1;
                        debug!(source, title, "no event class matched, record dropped");
                        continue;
                    }
                }
            }
        };
        listings.push(normalize(rec, category, source, scraped_at));
    }

    (listings, dropped)
}
