//! lablab.ai event extractor.
//!
//! The events page is a Next.js app; the full listing rides along in
//! the `__NEXT_DATA__` JSON island, so no rendering is needed. Prize
//! text, themes and the days-left label are derived here because the
//! upstream payload only carries a description and raw dates.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::LablabConfig;
use crate::error::ExtractError;
use crate::ingest::sources::{fetch_text_with_retry, non_empty};
use crate::ingest::types::Extractor;
use crate::record::RawRecord;

static RE_NEXT_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.*?)</script>"#).unwrap()
});

static PRIZE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\$[\d,]+(?:\s*(?:in|of|total))?\s*(?:prizes?|rewards?)?",
        r"(?i)[\d,]+\s*USD",
        r"(?i)[\d,]+\s*dollars?",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const THEME_KEYWORDS: [&str; 19] = [
    "AI",
    "Machine Learning",
    "Deep Learning",
    "NLP",
    "Computer Vision",
    "Blockchain",
    "Web3",
    "Healthcare",
    "Education",
    "Finance",
    "Gaming",
    "Robotics",
    "IoT",
    "Cloud",
    "DevOps",
    "Quantum",
    "Cybersecurity",
    "Data Science",
    "Analytics",
];

pub struct LablabExtractor {
    base_url: String,
    mode: Mode,
}

enum Mode {
    /// Canned HTML page, for tests.
    Fixture(String),
    Http { client: Client },
}

impl LablabExtractor {
    pub fn from_config(cfg: &LablabConfig) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            mode: Mode::Http {
                client: Client::new(),
            },
        }
    }

    pub fn from_fixture(body: &str) -> Self {
        Self {
            base_url: "https://lablab.ai".to_string(),
            mode: Mode::Fixture(body.to_string()),
        }
    }
}

#[async_trait]
impl Extractor for LablabExtractor {
    async fn extract(&self) -> Result<Vec<RawRecord>, ExtractError> {
        match &self.mode {
            Mode::Fixture(body) => parse_events(body, &self.base_url, Utc::now()),
            Mode::Http { client } => {
                let url = format!("{}/event", self.base_url);
                let body = fetch_text_with_retry(client, &url, None).await?;
                parse_events(&body, &self.base_url, Utc::now())
            }
        }
    }

    fn name(&self) -> &'static str {
        "lablab"
    }
}

#[derive(Debug, Deserialize)]
struct NextData {
    props: Props,
}

#[derive(Debug, Deserialize)]
struct Props {
    #[serde(rename = "pageProps")]
    page_props: PageProps,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    hackathons: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    slug: Option<String>,
    url: Option<String>,
    state: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    participants: Option<u32>,
    description: Option<String>,
}

fn parse_events(
    body: &str,
    base_url: &str,
    now: DateTime<Utc>,
) -> Result<Vec<RawRecord>, ExtractError> {
    let island = RE_NEXT_DATA
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| {
            ExtractError::StructureMissing("lablab page: __NEXT_DATA__ script not found".into())
        })?;
    let data: NextData = serde_json::from_str(island.as_str())
        .map_err(|e| ExtractError::StructureMissing(format!("lablab payload: {e}")))?;

    let items = data.props.page_props.hackathons;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let title = non_empty(item.title);
        let link = event_link(base_url, item.url, item.slug);
        let (Some(title), Some(link)) = (title, link) else {
            debug!(source = "lablab", "item without title or link omitted");
            continue;
        };

        let status = status_for(item.state.as_deref());
        let start = item.start_date.as_deref().and_then(parse_iso);
        let end = item.end_date.as_deref().and_then(parse_iso);
        let description = item.description.unwrap_or_default();

        let mut rec = RawRecord::new();
        rec.set("title", title);
        rec.set("link", link);
        rec.set("status", status.clone());
        rec.set("location", "Online");
        // Events here are remote-only, so the location doubles as host.
        rec.set("host", "Online");
        rec.set("submission_period", period_label(start, end));
        if let Some(prize) = extract_prize(&description) {
            rec.set("prize_amount", prize);
        }
        if let Some(count) = item.participants {
            rec.set("participants", count);
        }
        let themes = extract_themes(&description);
        if !themes.is_empty() {
            rec.set("themes", themes);
        }
        rec.set("days_left", days_left_label(&status, end, now));
        out.push(rec);
    }
    Ok(out)
}

fn event_link(base_url: &str, url: Option<String>, slug: Option<String>) -> Option<String> {
    match (non_empty(url), non_empty(slug)) {
        (Some(url), _) if url.starts_with("http") => Some(url),
        (Some(path), _) => Some(format!("{base_url}/{}", path.trim_start_matches('/'))),
        (None, Some(slug)) => Some(format!("{base_url}/event/{slug}")),
        (None, None) => None,
    }
}

fn status_for(state: Option<&str>) -> String {
    let Some(state) = state.map(str::trim).filter(|s| !s.is_empty()) else {
        return "Unknown".to_string();
    };
    let lower = state.to_lowercase();
    if lower.contains("finish") || lower.contains("end") || lower.contains("clos") {
        "Finished".to_string()
    } else {
        "Register".to_string()
    }
}

/// Accepts RFC 3339 as well as bare datetimes/dates, which the island
/// mixes freely.
fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// "NOV 14 - 19" within one month, "NOV 28 - DEC 2" across months.
fn period_label(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> String {
    let (Some(start), Some(end)) = (start, end) else {
        return "TBA".to_string();
    };
    let start_month = start.format("%b").to_string().to_uppercase();
    let end_month = end.format("%b").to_string().to_uppercase();
    if start.year() == end.year() && start.month() == end.month() {
        format!("{} {} - {}", start_month, start.day(), end.day())
    } else {
        format!("{} {} - {} {}", start_month, start.day(), end_month, end.day())
    }
}

fn extract_prize(description: &str) -> Option<String> {
    PRIZE_PATTERNS
        .iter()
        .find_map(|re| re.find(description))
        .map(|m| m.as_str().trim().to_string())
}

/// Substring scan over the uppercased description.
fn extract_themes(description: &str) -> Vec<String> {
    let upper = description.to_uppercase();
    THEME_KEYWORDS
        .iter()
        .filter(|kw| upper.contains(&kw.to_uppercase()))
        .map(|kw| kw.to_string())
        .collect()
}

fn days_left_label(status: &str, end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    if status == "Finished" {
        return "Ended".to_string();
    }
    let Some(end) = end else {
        return "TBA".to_string();
    };
    let days = (end - now).num_seconds().div_euclid(86_400);
    if days < 0 {
        "Ended".to_string()
    } else if days == 0 {
        "Today".to_string()
    } else if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn page(items_json: &str) -> String {
        format!(
            concat!(
                "<!DOCTYPE html><html><body><div id=\"__next\"></div>",
                "<script id=\"__NEXT_DATA__\" type=\"application/json\">",
                "{{\"props\":{{\"pageProps\":{{\"hackathons\":{items}}}}}}}",
                "</script></body></html>"
            ),
            items = items_json
        )
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_island_and_derives_fields() {
        let body = page(
            r#"[
                {
                    "title": "AI Agents Hackathon",
                    "slug": "ai-agents-hackathon",
                    "state": "registration_open",
                    "startDate": "2025-11-14T09:00:00Z",
                    "endDate": "2025-11-19T23:59:59Z",
                    "participants": 3120,
                    "description": "Join us to build with AI and Machine Learning. $10,000 in prizes for the best teams."
                },
                {
                    "title": "Web3 Challenge",
                    "url": "https://lablab.ai/event/web3-challenge",
                    "state": "finished",
                    "startDate": "2025-10-30T09:00:00Z",
                    "endDate": "2025-11-02T00:00:00Z",
                    "description": "Classic Blockchain challenge with 5,000 USD pool."
                },
                { "slug": "card-without-title" }
            ]"#,
        );

        let records = parse_events(&body, "https://lablab.ai", fixed_now()).unwrap();
        assert_eq!(records.len(), 2);

        let open = &records[0];
        assert_eq!(open.str("title"), Some("AI Agents Hackathon"));
        assert_eq!(
            open.str("link"),
            Some("https://lablab.ai/event/ai-agents-hackathon")
        );
        assert_eq!(open.str("status"), Some("Register"));
        assert_eq!(open.str("location"), Some("Online"));
        assert_eq!(open.str("submission_period"), Some("NOV 14 - 19"));
        assert_eq!(open.str("prize_amount"), Some("$10,000 in prizes"));
        assert_eq!(open.u64_like("participants"), Some(3120));
        assert_eq!(open.string_list("themes"), vec!["AI", "Machine Learning"]);
        assert_eq!(open.str("days_left"), Some("3 days"));

        let finished = &records[1];
        assert_eq!(finished.str("status"), Some("Finished"));
        assert_eq!(finished.str("days_left"), Some("Ended"));
        assert_eq!(finished.str("prize_amount"), Some("5,000 USD"));
        // "AI" matches inside "Blockchain"; the scan is substring-based.
        assert_eq!(finished.string_list("themes"), vec!["AI", "Blockchain"]);
    }

    #[test]
    fn prize_patterns_try_in_order() {
        assert_eq!(
            extract_prize("Win $25,000 in rewards this weekend"),
            Some("$25,000 in rewards".to_string())
        );
        assert_eq!(
            extract_prize("prize pool of 3,000 dollars"),
            Some("3,000 dollars".to_string())
        );
        assert_eq!(extract_prize("glory and stickers only"), None);
    }

    #[test]
    fn days_left_ladder() {
        let now = fixed_now();
        let end = |y, m, d, h| Some(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap());

        assert_eq!(days_left_label("Finished", end(2025, 12, 1, 0), now), "Ended");
        assert_eq!(days_left_label("Register", None, now), "TBA");
        assert_eq!(days_left_label("Register", end(2025, 11, 15, 0), now), "Ended");
        assert_eq!(days_left_label("Register", end(2025, 11, 16, 20), now), "Today");
        assert_eq!(days_left_label("Register", end(2025, 11, 17, 18), now), "1 day");
        assert_eq!(days_left_label("Register", end(2025, 11, 21, 12), now), "5 days");
    }

    #[test]
    fn period_crosses_month_boundary() {
        let start = Some(Utc.with_ymd_and_hms(2025, 11, 28, 9, 0, 0).unwrap());
        let end = Some(Utc.with_ymd_and_hms(2025, 12, 2, 23, 0, 0).unwrap());
        assert_eq!(period_label(start, end), "NOV 28 - DEC 2");
        assert_eq!(period_label(start, None), "TBA");
    }

    #[test]
    fn rejects_page_without_island() {
        let err = parse_events("<html><body>maintenance</body></html>", "https://lablab.ai", fixed_now())
            .unwrap_err();
        assert!(matches!(err, ExtractError::StructureMissing(_)));
    }

    #[tokio::test]
    async fn fixture_mode_extracts() {
        let body = page(r#"[{"title": "Quantum Jam", "slug": "quantum-jam", "state": "finished"}]"#);
        let extractor = LablabExtractor::from_fixture(&body);
        let records = extractor.extract().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].str("days_left"), Some("Ended"));
    }
}
