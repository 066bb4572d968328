//! Per-site extractors and the roster wiring that turns config into
//! runnable sources.
//!
//! Every extractor speaks to one upstream endpoint and yields loosely
//! typed [`RawRecord`]s; mapping those onto listings is the
//! normalizer's job.

pub mod apify;
pub mod coursera;
pub mod devpost;
pub mod lablab;
pub mod udemy;

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::ExtractError;
use crate::ingest::types::{SourceKind, SourceSpec};

pub use apify::ApifyInternshipsExtractor;
pub use coursera::CourseraExtractor;
pub use devpost::DevpostExtractor;
pub use lablab::LablabExtractor;
pub use udemy::UdemyExtractor;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials attached to outgoing requests.
#[derive(Clone, Copy)]
pub(crate) enum Auth<'a> {
    Bearer(&'a str),
    Basic { username: &'a str, password: &'a str },
}

/// Fetch a URL as text, retrying transient failures (transport errors,
/// 429, 5xx) with exponential backoff. Non-retryable statuses fail
/// immediately.
pub(crate) async fn fetch_text_with_retry(
    client: &Client,
    url: &str,
    auth: Option<Auth<'_>>,
) -> Result<String, ExtractError> {
    let mut last_err = String::new();
    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt - 1));
            warn!(
                url,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "retrying fetch after backoff"
            );
            tokio::time::sleep(backoff).await;
        }
        let mut request = client.get(url).timeout(REQUEST_TIMEOUT);
        match auth {
            Some(Auth::Bearer(token)) => request = request.bearer_auth(token),
            Some(Auth::Basic { username, password }) => {
                request = request.basic_auth(username, Some(password));
            }
            None => {}
        }
        match request.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return resp.text().await.map_err(ExtractError::from);
                }
                last_err = format!("{url}: HTTP {status}");
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if !retryable {
                    return Err(ExtractError::Http(last_err));
                }
            }
            Err(err) => {
                last_err = format!("{url}: {err}");
            }
        }
    }
    Err(ExtractError::Http(last_err))
}

/// Trimmed, non-empty string or nothing. Extractors use this to decide
/// whether an upstream field is actually present.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Build the source roster from config. Disabled sources are omitted;
/// a source whose credentials cannot be resolved fails the whole
/// startup rather than silently running a partial roster.
pub fn build_sources(cfg: &AppConfig) -> Result<Vec<SourceSpec>> {
    let mut sources = Vec::new();
    if cfg.sources.devpost.enabled {
        sources.push(SourceSpec::new(
            "devpost",
            SourceKind::Events,
            Box::new(DevpostExtractor::from_config(&cfg.sources.devpost)),
        ));
    }
    if cfg.sources.lablab.enabled {
        sources.push(SourceSpec::new(
            "lablab",
            SourceKind::Events,
            Box::new(LablabExtractor::from_config(&cfg.sources.lablab)),
        ));
    }
    if cfg.sources.coursera.enabled {
        sources.push(SourceSpec::new(
            "coursera",
            SourceKind::Courses,
            Box::new(CourseraExtractor::from_config(&cfg.sources.coursera)),
        ));
    }
    if cfg.sources.udemy.enabled {
        sources.push(SourceSpec::new(
            "udemy",
            SourceKind::Courses,
            Box::new(UdemyExtractor::from_config(&cfg.sources.udemy)),
        ));
    }
    if cfg.sources.apify.enabled {
        let token = cfg.sources.apify.resolved_token()?;
        sources.push(SourceSpec::new(
            "apify-internships",
            SourceKind::Internships,
            Box::new(ApifyInternshipsExtractor::new(
                &cfg.sources.apify.dataset_id,
                token,
            )),
        ));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn roster_honors_enabled_flags() {
        let mut cfg = AppConfig::default();
        cfg.sources.udemy.enabled = false;
        cfg.sources.apify.enabled = false;

        let sources = build_sources(&cfg).unwrap();
        let ids: Vec<&str> = sources.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["devpost", "lablab", "coursera"]);
    }

    #[test]
    #[serial]
    fn roster_fails_without_apify_token() {
        let mut cfg = AppConfig::default();
        cfg.sources.apify.token = "ENV".to_string();
        std::env::remove_var("APIFY_TOKEN");

        assert!(build_sources(&cfg).is_err());
    }

    #[test]
    fn kinds_match_sources() {
        let mut cfg = AppConfig::default();
        cfg.sources.apify.token = "literal-token".to_string();

        let sources = build_sources(&cfg).unwrap();
        let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Events,
                SourceKind::Events,
                SourceKind::Courses,
                SourceKind::Courses,
                SourceKind::Internships,
            ]
        );
    }
}
