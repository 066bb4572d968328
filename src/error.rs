//! Typed failure taxonomy for the ingestion pipeline.
//!
//! `ExtractError` is fatal to one source's current run only; the next
//! scheduled cycle retries naturally. `StoreError` never aborts a batch:
//! the affected listing is counted as skipped and the rest proceed.

use thiserror::Error;

/// Extraction failures that abort one source's cycle.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Source unreachable after retries (connect/transport/HTTP status).
    #[error("source unreachable: {0}")]
    Http(String),

    /// Body fetched but the expected structure is entirely absent.
    #[error("unrecognized payload structure: {0}")]
    StructureMissing(String),

    /// Extraction exceeded the configured per-run timeout.
    #[error("extraction timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::Http(err.to_string())
    }
}

/// Persistence failures for a single listing.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Listing violates an invariant the store enforces (empty title/link).
    #[error("invalid listing: {0}")]
    InvalidListing(&'static str),

    /// Any other storage failure (connectivity, unrelated constraint).
    #[error("storage error: {0}")]
    Database(#[from] rusqlite::Error),
}
