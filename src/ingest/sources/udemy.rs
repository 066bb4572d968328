//! Udemy course extractor, backed by the affiliate `api-2.0/courses`
//! endpoint. Course URLs arrive site-relative; instructor names double
//! as the provider.

use std::collections::HashSet;
use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::UdemyConfig;
use crate::error::ExtractError;
use crate::ingest::sources::{fetch_text_with_retry, non_empty, Auth};
use crate::ingest::types::Extractor;
use crate::record::RawRecord;

const ENV_CLIENT_ID: &str = "UDEMY_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "UDEMY_CLIENT_SECRET";

pub struct UdemyExtractor {
    base_url: String,
    mode: Mode,
}

enum Mode {
    /// Canned JSON payload, for tests.
    Fixture(String),
    Http {
        query: String,
        page_size: u32,
        free_only: bool,
        /// Client credentials from the environment; the endpoint also
        /// answers anonymously at a lower rate limit.
        credentials: Option<(String, String)>,
        client: Client,
    },
}

impl UdemyExtractor {
    pub fn from_config(cfg: &UdemyConfig) -> Self {
        let credentials = match (env::var(ENV_CLIENT_ID), env::var(ENV_CLIENT_SECRET)) {
            (Ok(id), Ok(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        };
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            mode: Mode::Http {
                query: cfg.query.clone(),
                page_size: cfg.page_size.max(1),
                free_only: cfg.free_only,
                credentials,
                client: Client::new(),
            },
        }
    }

    pub fn from_fixture(body: &str) -> Self {
        Self {
            base_url: "https://www.udemy.com".to_string(),
            mode: Mode::Fixture(body.to_string()),
        }
    }
}

#[async_trait]
impl Extractor for UdemyExtractor {
    async fn extract(&self) -> Result<Vec<RawRecord>, ExtractError> {
        match &self.mode {
            Mode::Fixture(body) => parse_results(body, &self.base_url),
            Mode::Http {
                query,
                page_size,
                free_only,
                credentials,
                client,
            } => {
                let mut params = vec![
                    ("search", query.clone()),
                    ("page_size", page_size.to_string()),
                ];
                if *free_only {
                    params.push(("price", "price-free".to_string()));
                }
                let url = reqwest::Url::parse_with_params(
                    &format!("{}/api-2.0/courses/", self.base_url),
                    &params,
                )
                .map_err(|e| ExtractError::Http(format!("udemy url: {e}")))?;
                let auth = credentials.as_ref().map(|(username, password)| Auth::Basic {
                    username,
                    password,
                });
                let body = fetch_text_with_retry(client, url.as_str(), auth).await?;
                parse_results(&body, &self.base_url)
            }
        }
    }

    fn name(&self) -> &'static str {
        "udemy"
    }
}

#[derive(Debug, Deserialize)]
struct CoursesPage {
    results: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    url: Option<String>,
    #[serde(default)]
    visible_instructors: Vec<Instructor>,
}

#[derive(Debug, Deserialize)]
struct Instructor {
    title: Option<String>,
}

fn parse_results(body: &str, base_url: &str) -> Result<Vec<RawRecord>, ExtractError> {
    let page: CoursesPage = serde_json::from_str(body)
        .map_err(|e| ExtractError::StructureMissing(format!("udemy payload: {e}")))?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(page.results.len());
    for item in page.results {
        let Some(url) = non_empty(item.url) else {
            debug!(source = "udemy", "result without url omitted");
            continue;
        };
        let link = if url.starts_with("http") {
            url
        } else {
            format!("{base_url}/{}", url.trim_start_matches('/'))
        };
        if !seen.insert(link.clone()) {
            continue;
        }

        let provider = item
            .visible_instructors
            .into_iter()
            .find_map(|i| non_empty(i.title))
            .unwrap_or_else(|| "Udemy".to_string());

        let mut rec = RawRecord::new();
        rec.set("title", non_empty(item.title).unwrap_or_else(|| "N/A".to_string()));
        rec.set("link", link);
        rec.set("provider", provider);
        out.push(rec);
    }
    Ok(out)
}
