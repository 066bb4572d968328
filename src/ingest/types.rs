// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ExtractError;
use crate::listing::Category;
use crate::record::RawRecord;
use crate::store::UpsertCounts;

/// What a source's records become. Event sources mix hackathons and
/// competitions and go through the classifier; the other kinds map to a
/// fixed category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Events,
    Courses,
    Internships,
}

impl SourceKind {
    pub fn fixed_category(&self) -> Option<Category> {
        match self {
            SourceKind::Events => None,
            SourceKind::Courses => Some(Category::Course),
            SourceKind::Internships => Some(Category::Internship),
        }
    }
}

/// One source's fetch+parse step. Implementations own their HTTP client,
/// retries and pagination; a failed extraction aborts that source's run
/// for the current cycle only.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawRecord>, ExtractError>;
    fn name(&self) -> &'static str;
}

/// A registered source: stable id, record kind, extractor.
pub struct SourceSpec {
    pub id: &'static str,
    pub kind: SourceKind,
    pub extractor: Box<dyn Extractor>,
}

impl SourceSpec {
    pub fn new(id: &'static str, kind: SourceKind, extractor: Box<dyn Extractor>) -> Self {
        Self {
            id,
            kind,
            extractor,
        }
    }
}

/// Lifecycle of one source slot. `Running` carries its start time so a
/// hung run is visible on the status surface instead of silently doubled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running { started_at: DateTime<Utc> },
}

/// Outcome of one source's run in one cycle. Kept in memory only; the
/// ops surface exposes the latest one per source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Raw records the extractor yielded.
    pub extracted: u32,
    /// Event records dropped as Unknown by the classifier.
    pub dropped: u32,
    #[serde(flatten)]
    pub counts: UpsertCounts,
    /// Present iff the run failed before completing the pipeline.
    pub error: Option<String>,
}

impl RunResult {
    pub fn failed(source: &str, started_at: DateTime<Utc>, error: String) -> Self {
        Self {
            source: source.to_string(),
            started_at,
            ended_at: Utc::now(),
            extracted: 0,
            dropped: 0,
            counts: UpsertCounts::default(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
