//! Internship extractor reading a pre-scraped Apify dataset.
//!
//! The dataset items endpoint returns a JSON array of loose objects in
//! the upstream job-board shape (`positionName`, `url`, `jobType`,
//! ...); records pass through untouched and the normalizer resolves
//! the field aliases.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::ExtractError;
use crate::ingest::sources::{fetch_text_with_retry, Auth};
use crate::ingest::types::Extractor;
use crate::record::RawRecord;

pub struct ApifyInternshipsExtractor {
    mode: Mode,
}

enum Mode {
    /// Canned JSON array, for tests.
    Fixture(String),
    Http {
        dataset_id: String,
        token: String,
        client: Client,
    },
}

impl ApifyInternshipsExtractor {
    pub fn new(dataset_id: &str, token: String) -> Self {
        Self {
            mode: Mode::Http {
                dataset_id: dataset_id.to_string(),
                token,
                client: Client::new(),
            },
        }
    }

    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }
}

#[async_trait]
impl Extractor for ApifyInternshipsExtractor {
    async fn extract(&self) -> Result<Vec<RawRecord>, ExtractError> {
        match &self.mode {
            Mode::Fixture(body) => parse_items(body),
            Mode::Http {
                dataset_id,
                token,
                client,
            } => {
                let url = format!(
                    "https://api.apify.com/v2/datasets/{dataset_id}/items?format=json&clean=true"
                );
                let body =
                    fetch_text_with_retry(client, &url, Some(Auth::Bearer(token))).await?;
                parse_items(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "apify-internships"
    }
}

fn parse_items(body: &str) -> Result<Vec<RawRecord>, ExtractError> {
    let items: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| ExtractError::StructureMissing(format!("apify payload: {e}")))?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_object() {
            continue;
        }
        let rec = RawRecord::from_value(item);
        if rec.text_any(&["positionName", "title"]).is_none()
            || rec.text_any(&["url", "link"]).is_none()
        {
            debug!(
                source = "apify-internships",
                "item without position name or url omitted"
            );
            continue;
        }
        out.push(rec);
    }
    Ok(out)
}
