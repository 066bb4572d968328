//! Coursera course extractor, backed by the public `courses.v1` search
//! endpoint. Elements carry a display name and a slug; the catalog URL
//! is rebuilt from the slug.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::CourseraConfig;
use crate::error::ExtractError;
use crate::ingest::sources::{fetch_text_with_retry, non_empty};
use crate::ingest::types::Extractor;
use crate::record::RawRecord;

const API_URL: &str = "https://api.coursera.org/api/courses.v1";

pub struct CourseraExtractor {
    mode: Mode,
}

enum Mode {
    /// Canned JSON payload, for tests.
    Fixture { body: String, limit: usize },
    Http {
        query: String,
        limit: usize,
        client: Client,
    },
}

impl CourseraExtractor {
    pub fn from_config(cfg: &CourseraConfig) -> Self {
        Self {
            mode: Mode::Http {
                query: cfg.query.clone(),
                limit: cfg.max_courses.max(1) as usize,
                client: Client::new(),
            },
        }
    }

    pub fn from_fixture(body: &str, limit: usize) -> Self {
        Self {
            mode: Mode::Fixture {
                body: body.to_string(),
                limit,
            },
        }
    }
}

#[async_trait]
impl Extractor for CourseraExtractor {
    async fn extract(&self) -> Result<Vec<RawRecord>, ExtractError> {
        match &self.mode {
            Mode::Fixture { body, limit } => parse_courses(body, *limit),
            Mode::Http {
                query,
                limit,
                client,
            } => {
                let limit_param = limit.to_string();
                let url = reqwest::Url::parse_with_params(
                    API_URL,
                    &[
                        ("q", "search"),
                        ("query", query.as_str()),
                        ("limit", limit_param.as_str()),
                    ],
                )
                .map_err(|e| ExtractError::Http(format!("coursera url: {e}")))?;
                let body = fetch_text_with_retry(client, url.as_str(), None).await?;
                parse_courses(&body, *limit)
            }
        }
    }

    fn name(&self) -> &'static str {
        "coursera"
    }
}

#[derive(Debug, Deserialize)]
struct CoursesPayload {
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    name: Option<String>,
    slug: Option<String>,
}

fn parse_courses(body: &str, limit: usize) -> Result<Vec<RawRecord>, ExtractError> {
    let payload: CoursesPayload = serde_json::from_str(body)
        .map_err(|e| ExtractError::StructureMissing(format!("coursera payload: {e}")))?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for element in payload.elements {
        if out.len() >= limit {
            break;
        }
        let (Some(name), Some(slug)) = (non_empty(element.name), non_empty(element.slug)) else {
            debug!(source = "coursera", "element without name or slug omitted");
            continue;
        };
        let link = format!("https://www.coursera.org/learn/{slug}");
        if !seen.insert(link.clone()) {
            continue;
        }

        let mut rec = RawRecord::new();
        rec.set("title", name);
        rec.set("link", link);
        rec.set("provider", "Coursera");
        out.push(rec);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "elements": [
            { "name": "Machine Learning", "slug": "machine-learning" },
            { "name": "Machine Learning", "slug": "machine-learning" },
            { "slug": "nameless-course" },
            { "name": "Rust Fundamentals", "slug": "rust-fundamentals" }
        ],
        "paging": { "total": 4 }
    }"#;

    #[test]
    fn parses_elements_dedups_and_builds_links() {
        let records = parse_courses(PAYLOAD, 50).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].str("title"), Some("Machine Learning"));
        assert_eq!(
            records[0].str("link"),
            Some("https://www.coursera.org/learn/machine-learning")
        );
        assert_eq!(records[0].str("provider"), Some("Coursera"));
        assert_eq!(records[1].str("title"), Some("Rust Fundamentals"));
    }

    #[test]
    fn respects_limit() {
        let records = parse_courses(PAYLOAD, 1).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn rejects_payload_without_elements() {
        let err = parse_courses(r#"{"message": "maintenance"}"#, 10).unwrap_err();
        assert!(matches!(err, ExtractError::StructureMissing(_)));
    }

    #[tokio::test]
    async fn fixture_mode_extracts() {
        let extractor = CourseraExtractor::from_fixture(PAYLOAD, 10);
        let records = extractor.extract().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(extractor.name(), "coursera");
    }
}
