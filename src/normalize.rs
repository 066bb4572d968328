//! Normalization: map one source's raw record into the canonical shape for
//! its category. Total over any record — missing fields become documented
//! defaults (strings empty, sets empty, derived numerics 0) — and pure:
//! the extraction timestamp is injected, no I/O or clock reads happen here.
//!
//! Defaults note: source-specific placeholder text ("N/A", "TBA", "Online")
//! is an extractor concern; by the time a record reaches this module those
//! are ordinary field values.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::listing::{
    limits, Category, CourseListing, EventListing, InternshipListing, NormalizedListing,
};
use crate::record::RawRecord;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
// One or more digits, optional thousands separators, optional decimal part.
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

/// Cleanup for scraped free text: decode HTML entities, strip tags,
/// normalize curly quotes, fold whitespace, trim.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();
    out = RE_TAGS.replace_all(&out, "").to_string();
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    out = RE_WS.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Char-based truncation; byte slicing would split multibyte titles.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// First number found in free text, thousands separators stripped.
/// "$12,500 in prizes" → 12500.0; "$10k–$50k" → 10.0 (first match only).
pub fn first_number(s: &str) -> Option<f64> {
    let m = RE_NUMBER.find(s)?;
    m.as_str().replace(',', "").parse().ok()
}

/// Best-effort numeric floor for prize/salary text; 0.0 when nothing
/// parseable. Parsing never fails the pipeline.
pub fn number_floor(s: &str) -> f64 {
    first_number(s).unwrap_or(0.0)
}

/// Comma-split free text into a set of trimmed, non-empty strings.
pub fn split_set(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// Cleaned free-text field under a length cap, empty when absent.
fn text_field(raw: &RawRecord, keys: &[&str], max: usize) -> String {
    match raw.text_any(keys) {
        Some(s) => truncate_chars(&clean_text(s), max),
        None => String::new(),
    }
}

// Links are trimmed and capped but never entity-decoded or tag-stripped;
// entity decoding can corrupt query strings ("&params=" contains "&para").
fn link_field(raw: &RawRecord, keys: &[&str], max: usize) -> String {
    match raw.text_any(keys) {
        Some(s) => truncate_chars(s.trim(), max),
        None => String::new(),
    }
}

fn set_field(raw: &RawRecord, keys: &[&str], max_joined: usize) -> BTreeSet<String> {
    let mut items: Vec<String> = keys
        .iter()
        .flat_map(|k| raw.string_list(k))
        .map(|s| clean_text(&s))
        .filter(|s| !s.is_empty())
        .collect();
    // Respect the storage cap on the comma-joined representation.
    let mut joined = 0usize;
    items.retain(|item| {
        let next = joined + item.chars().count() + if joined > 0 { 2 } else { 0 };
        if next <= max_joined {
            joined = next;
            true
        } else {
            false
        }
    });
    items.into_iter().collect()
}

/// Normalize one raw record into the canonical shape for `category`.
pub fn normalize(
    raw: &RawRecord,
    category: Category,
    source: &str,
    scraped_at: DateTime<Utc>,
) -> NormalizedListing {
    match category {
        Category::Course => NormalizedListing::Course(normalize_course(raw, source, scraped_at)),
        Category::Hackathon => {
            NormalizedListing::Hackathon(normalize_event(raw, source, scraped_at))
        }
        Category::Competition => {
            NormalizedListing::Competition(normalize_event(raw, source, scraped_at))
        }
        Category::Internship => {
            NormalizedListing::Internship(normalize_internship(raw, source, scraped_at))
        }
    }
}

fn normalize_course(raw: &RawRecord, source: &str, scraped_at: DateTime<Utc>) -> CourseListing {
    CourseListing {
        title: text_field(raw, &["title", "name"], limits::TITLE),
        link: link_field(raw, &["link", "url"], limits::LINK),
        source: source.to_string(),
        provider: text_field(raw, &["provider"], limits::PROVIDER),
        scraped_at,
    }
}

fn normalize_event(raw: &RawRecord, source: &str, scraped_at: DateTime<Utc>) -> EventListing {
    let prize_amount = text_field(raw, &["prize_amount"], limits::PRIZE_AMOUNT);
    EventListing {
        title: text_field(raw, &["title"], limits::TITLE),
        link: link_field(raw, &["link", "url"], limits::LINK),
        source: source.to_string(),
        status: text_field(raw, &["status"], limits::STATUS),
        location: text_field(raw, &["location"], limits::LOCATION),
        submission_period: text_field(raw, &["submission_period"], limits::SUBMISSION_PERIOD),
        prize_floor: number_floor(&prize_amount),
        prize_amount,
        participants: raw.u64_like("participants").unwrap_or(0) as u32,
        host: text_field(raw, &["host"], limits::HOST),
        themes: set_field(raw, &["themes"], limits::THEMES),
        days_left: text_field(raw, &["days_left"], limits::DAYS_LEFT),
        scraped_at,
    }
}

fn normalize_internship(
    raw: &RawRecord,
    source: &str,
    scraped_at: DateTime<Utc>,
) -> InternshipListing {
    let location = text_field(raw, &["location"], limits::INTERNSHIP_LOCATION);
    let description = raw
        .text_any(&["description"])
        .map(clean_text)
        .unwrap_or_default();
    let salary = text_field(raw, &["salary"], limits::SALARY);
    // Remote detection scans location and description together.
    let haystack = format!("{} {}", location, description).to_lowercase();
    let is_remote = haystack.contains("remote") || haystack.contains("work from home");

    InternshipListing {
        title: text_field(raw, &["positionName", "title"], limits::INTERNSHIP_TITLE),
        link: link_field(raw, &["url", "link"], limits::INTERNSHIP_LINK),
        source: source.to_string(),
        company: text_field(raw, &["company"], limits::COMPANY),
        location,
        job_types: set_field(raw, &["jobType", "job_types"], limits::THEMES),
        salary_floor: number_floor(&salary),
        salary,
        rating: raw.f64_like("rating").unwrap_or(0.0).max(0.0),
        reviews_count: raw
            .u64_like("reviewsCount")
            .or_else(|| raw.u64_like("reviews_count"))
            .unwrap_or(0) as u32,
        posted_at: text_field(raw, &["postedAt", "posted_at"], limits::POSTED_AT),
        description,
        is_remote,
        scraped_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> RawRecord {
        RawRecord::from_value(v)
    }

    #[test]
    fn clean_text_strips_tags_and_entities() {
        assert_eq!(
            clean_text("<span data-currency>10,000</span>&nbsp;USD"),
            "10,000 USD"
        );
        assert_eq!(clean_text("  A\u{00A0}\n\tB   C  "), "A B C");
    }

    #[test]
    fn truncation_is_char_safe() {
        let s = "é".repeat(300);
        let t = truncate_chars(&s, 255);
        assert_eq!(t.chars().count(), 255);
    }

    #[test]
    fn first_number_handles_separators_and_decimals() {
        assert_eq!(first_number("$12,500"), Some(12_500.0));
        assert_eq!(first_number("$10,000 in prizes"), Some(10_000.0));
        assert_eq!(first_number("€1,000,000 total"), Some(1_000_000.0));
        assert_eq!(first_number("$15.50 an hour"), Some(15.5));
        assert_eq!(first_number("$10k–$50k"), Some(10.0));
        assert_eq!(first_number("no digits here"), None);
        assert_eq!(number_floor("TBD"), 0.0);
    }

    #[test]
    fn missing_derived_source_field_yields_zero_floor() {
        let l = normalize(
            &raw(json!({ "title": "X Hackathon", "link": "https://x/1" })),
            Category::Hackathon,
            "devpost",
            Utc::now(),
        );
        match l {
            NormalizedListing::Hackathon(e) => {
                assert_eq!(e.prize_floor, 0.0);
                assert_eq!(e.prize_amount, "");
                assert_eq!(e.participants, 0);
                assert!(e.themes.is_empty());
            }
            other => panic!("expected hackathon, got {:?}", other.category()),
        }
    }

    #[test]
    fn event_normalization_end_to_end() {
        let l = normalize(
            &raw(json!({
                "title": "  AI Hackathon ",
                "link": "https://x/1",
                "status": "open",
                "prize_amount": "<span>$10,000</span> in prizes",
                "participants": "1,204",
                "themes": "AI, NLP, ,Web3",
                "days_left": "12 days left"
            })),
            Category::Hackathon,
            "devpost",
            Utc::now(),
        );
        let NormalizedListing::Hackathon(e) = l else {
            panic!("expected hackathon")
        };
        assert_eq!(e.title, "AI Hackathon");
        assert_eq!(e.prize_amount, "$10,000 in prizes");
        assert_eq!(e.prize_floor, 10_000.0);
        assert_eq!(e.participants, 1204);
        assert_eq!(
            e.themes,
            BTreeSet::from(["AI".to_string(), "NLP".to_string(), "Web3".to_string()])
        );
        assert_eq!(e.days_left, "12 days left");
    }

    #[test]
    fn internship_aliases_and_derivations() {
        let l = normalize(
            &raw(json!({
                "positionName": "Software Engineering Intern",
                "url": "https://jobs.test/1",
                "company": "Acme",
                "location": "Anywhere (Remote)",
                "salary": "$25.50 - $30 an hour",
                "jobType": ["Internship", "Full-time"],
                "rating": -2.0,
                "reviewsCount": "1,234",
                "postedAt": "3 days ago",
                "description": "Work from home friendly."
            })),
            Category::Internship,
            "apify",
            Utc::now(),
        );
        let NormalizedListing::Internship(i) = l else {
            panic!("expected internship")
        };
        assert_eq!(i.title, "Software Engineering Intern");
        assert_eq!(i.link, "https://jobs.test/1");
        assert_eq!(i.salary_floor, 25.5);
        assert_eq!(i.rating, 0.0); // clamped
        assert_eq!(i.reviews_count, 1234);
        assert!(i.is_remote);
        assert_eq!(
            i.job_types,
            BTreeSet::from(["Full-time".to_string(), "Internship".to_string()])
        );
    }

    #[test]
    fn links_are_not_entity_decoded() {
        let l = normalize(
            &raw(json!({
                "title": "T",
                "link": "https://x/1?page=2&parallel=1"
            })),
            Category::Competition,
            "devpost",
            Utc::now(),
        );
        assert_eq!(l.link(), "https://x/1?page=2&parallel=1");
    }

    #[test]
    fn normalization_is_deterministic() {
        let r = raw(json!({ "title": "Chess Challenge", "link": "https://x/9" }));
        let at = Utc::now();
        let a = normalize(&r, Category::Competition, "lablab", at);
        let b = normalize(&r, Category::Competition, "lablab", at);
        assert_eq!(a, b);
    }
}
