//! Devpost hackathon extractor.
//!
//! Devpost exposes a paginated JSON listing at `/api/hackathons`. Each
//! page carries a `hackathons` array; prize amounts arrive wrapped in
//! markup spans, which the normalizer strips later.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::DevpostConfig;
use crate::error::ExtractError;
use crate::ingest::sources::{fetch_text_with_retry, non_empty};
use crate::ingest::types::Extractor;
use crate::record::RawRecord;

pub struct DevpostExtractor {
    mode: Mode,
}

enum Mode {
    /// Canned JSON page, for tests.
    Fixture(String),
    Http {
        base_url: String,
        max_pages: u32,
        client: Client,
    },
}

impl DevpostExtractor {
    pub fn from_config(cfg: &DevpostConfig) -> Self {
        Self {
            mode: Mode::Http {
                base_url: cfg.base_url.trim_end_matches('/').to_string(),
                max_pages: cfg.max_pages.max(1),
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
impl Extractor for DevpostExtractor {
    async fn extract(&self) -> Result<Vec<RawRecord>, ExtractError> {
        match &self.mode {
            Mode::Fixture(body) => parse_page(body),
            Mode::Http {
                base_url,
                max_pages,
                client,
            } => {
                let mut all = Vec::new();
                for page in 1..=*max_pages {
                    let url = format!("{base_url}/api/hackathons?page={page}");
                    let body = fetch_text_with_retry(client, &url, None).await?;
                    let mut records = parse_page(&body)?;
                    if records.is_empty() {
                        break;
                    }
                    all.append(&mut records);
                }
                Ok(all)
            }
        }
    }

    fn name(&self) -> &'static str {
        "devpost"
    }
}

#[derive(Debug, Deserialize)]
struct HackathonsPage {
    hackathons: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    url: Option<String>,
    open_state: Option<String>,
    time_left_to_submission: Option<String>,
    submission_period_dates: Option<String>,
    prize_amount: Option<String>,
    registrations_count: Option<u32>,
    organization_name: Option<String>,
    displayed_location: Option<DisplayedLocation>,
    #[serde(default)]
    themes: Vec<Theme>,
}

#[derive(Debug, Deserialize)]
struct DisplayedLocation {
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Theme {
    name: String,
}

fn parse_page(body: &str) -> Result<Vec<RawRecord>, ExtractError> {
    let page: HackathonsPage = serde_json::from_str(body)
        .map_err(|e| ExtractError::StructureMissing(format!("devpost payload: {e}")))?;

    let mut out = Vec::with_capacity(page.hackathons.len());
    for item in page.hackathons {
        let title = non_empty(item.title);
        let url = non_empty(item.url);
        let (Some(title), Some(url)) = (title, url) else {
            debug!(source = "devpost", "item without title or url omitted");
            continue;
        };

        let days_left =
            non_empty(item.time_left_to_submission).unwrap_or_else(|| "N/A".to_string());
        let status = status_for(item.open_state.as_deref(), &days_left);

        let mut rec = RawRecord::new();
        rec.set("title", title);
        rec.set("link", url);
        rec.set("status", status);
        rec.set(
            "location",
            item.displayed_location
                .and_then(|loc| non_empty(loc.location))
                .unwrap_or_else(|| "N/A".to_string()),
        );
        rec.set(
            "submission_period",
            non_empty(item.submission_period_dates).unwrap_or_else(|| "N/A".to_string()),
        );
        rec.set(
            "prize_amount",
            non_empty(item.prize_amount).unwrap_or_else(|| "N/A".to_string()),
        );
        if let Some(count) = item.registrations_count {
            rec.set("participants", count);
        }
        rec.set(
            "host",
            non_empty(item.organization_name).unwrap_or_else(|| "N/A".to_string()),
        );
        rec.set(
            "themes",
            item.themes.into_iter().map(|t| t.name).collect::<Vec<_>>(),
        );
        rec.set("days_left", days_left);
        out.push(rec);
    }
    Ok(out)
}

/// Devpost's `open_state` wins when present; otherwise the state is
/// read off the countdown label.
fn status_for(open_state: Option<&str>, days_left: &str) -> String {
    if let Some(state) = open_state {
        let state = state.trim();
        if !state.is_empty() {
            return state.to_lowercase();
        }
    }
    if days_left == "N/A" {
        return "unknown".to_string();
    }
    let label = days_left.to_lowercase();
    if label.contains("left") {
        "open".to_string()
    } else if label.contains("upcoming") {
        "upcoming".to_string()
    } else {
        "ended".to_string()
    }
}
