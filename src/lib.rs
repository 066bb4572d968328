// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod listing;
pub mod metrics;
pub mod normalize;
pub mod record;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::AppConfig;
pub use crate::ingest::coordinator::Coordinator;
pub use crate::ingest::sources::build_sources;
pub use crate::store::Store;
