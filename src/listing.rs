//! Canonical listing shapes: one normalized form per category, plus the
//! stored-row forms the query API consumes. The `link` is the natural key
//! everywhere; derived numeric fields (`prize_floor`, `salary_floor`)
//! default to 0 rather than failing.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Target category of a listing. Determines the normalized shape and the
/// table a record is upserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Course,
    Hackathon,
    Competition,
    Internship,
}

impl Category {
    pub fn table_name(&self) -> &'static str {
        match self {
            Category::Course => "courses",
            Category::Hackathon => "hackathons",
            Category::Competition => "competitions",
            Category::Internship => "internships",
        }
    }

    pub const ALL: [Category; 4] = [
        Category::Course,
        Category::Hackathon,
        Category::Competition,
        Category::Internship,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Column length caps, mirrored from the storage schema. Normalization
/// truncates to these before upsert; truncation is char-based.
pub mod limits {
    // hackathons / competitions / courses
    pub const TITLE: usize = 255;
    pub const LINK: usize = 255;
    pub const STATUS: usize = 50;
    pub const LOCATION: usize = 100;
    pub const SUBMISSION_PERIOD: usize = 100;
    pub const PRIZE_AMOUNT: usize = 50;
    pub const HOST: usize = 100;
    pub const THEMES: usize = 255;
    pub const DAYS_LEFT: usize = 50;
    pub const PROVIDER: usize = 100;

    // internships (wider, the feeds carry long titles and URLs)
    pub const INTERNSHIP_TITLE: usize = 500;
    pub const INTERNSHIP_LINK: usize = 500;
    pub const COMPANY: usize = 300;
    pub const INTERNSHIP_LOCATION: usize = 200;
    pub const SALARY: usize = 100;
    pub const POSTED_AT: usize = 50;
}

/// Normalized course (Coursera, Udemy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseListing {
    pub title: String,
    pub link: String,
    pub source: String,
    pub provider: String,
    pub scraped_at: DateTime<Utc>,
}

/// Normalized hackathon or competition. The two categories share one
/// shape; the enclosing `NormalizedListing` variant picks the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListing {
    pub title: String,
    pub link: String,
    pub source: String,
    pub status: String,
    pub location: String,
    pub submission_period: String,
    pub prize_amount: String,
    /// First number found in `prize_amount`, separators stripped; 0.0 when
    /// nothing parseable.
    pub prize_floor: f64,
    pub participants: u32,
    pub host: String,
    pub themes: BTreeSet<String>,
    /// Passthrough text ("5 days left", "Ended", "TBA"); no date arithmetic
    /// happens at this stage.
    pub days_left: String,
    pub scraped_at: DateTime<Utc>,
}

/// Normalized internship (Apify feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternshipListing {
    pub title: String,
    pub link: String,
    pub source: String,
    pub company: String,
    pub location: String,
    pub job_types: BTreeSet<String>,
    pub salary: String,
    /// First number found in `salary`; 0.0 when nothing parseable.
    pub salary_floor: f64,
    pub rating: f64,
    pub reviews_count: u32,
    pub posted_at: String,
    pub description: String,
    pub is_remote: bool,
    pub scraped_at: DateTime<Utc>,
}

/// One normalized listing, tagged with its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum NormalizedListing {
    Course(CourseListing),
    Hackathon(EventListing),
    Competition(EventListing),
    Internship(InternshipListing),
}

impl NormalizedListing {
    pub fn category(&self) -> Category {
        match self {
            NormalizedListing::Course(_) => Category::Course,
            NormalizedListing::Hackathon(_) => Category::Hackathon,
            NormalizedListing::Competition(_) => Category::Competition,
            NormalizedListing::Internship(_) => Category::Internship,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NormalizedListing::Course(c) => &c.title,
            NormalizedListing::Hackathon(e) | NormalizedListing::Competition(e) => &e.title,
            NormalizedListing::Internship(i) => &i.title,
        }
    }

    /// The natural identifier; unique per category table.
    pub fn link(&self) -> &str {
        match self {
            NormalizedListing::Course(c) => &c.link,
            NormalizedListing::Hackathon(e) | NormalizedListing::Competition(e) => &e.link,
            NormalizedListing::Internship(i) => &i.link,
        }
    }

    pub fn scraped_at(&self) -> DateTime<Utc> {
        match self {
            NormalizedListing::Course(c) => c.scraped_at,
            NormalizedListing::Hackathon(e) | NormalizedListing::Competition(e) => e.scraped_at,
            NormalizedListing::Internship(i) => i.scraped_at,
        }
    }
}

// ---- Stored rows (what the external query API reads) ----
//
// Outward naming follows the consumed contract: event rows stay snake_case
// with the derived floor exposed as "prizeAmount"; internship rows use the
// feed's camelCase with the derived floor exposed as "minSalary".

#[derive(Debug, Clone, Serialize)]
pub struct CourseRow {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub source: String,
    pub provider: String,
    pub scraped_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub source: String,
    pub status: String,
    pub location: String,
    pub submission_period: String,
    pub prize_amount: String,
    #[serde(rename = "prizeAmount")]
    pub prize_floor: f64,
    pub participants: u32,
    pub host: String,
    pub themes: Vec<String>,
    pub days_left: String,
    pub scraped_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternshipRow {
    pub id: i64,
    #[serde(rename = "positionName")]
    pub title: String,
    #[serde(rename = "url")]
    pub link: String,
    pub source: String,
    pub company: String,
    pub location: String,
    #[serde(rename = "jobType")]
    pub job_types: Vec<String>,
    pub salary: String,
    #[serde(rename = "minSalary")]
    pub salary_floor: f64,
    pub rating: f64,
    #[serde(rename = "reviewsCount")]
    pub reviews_count: u32,
    #[serde(rename = "postedAt")]
    pub posted_at: String,
    pub description: String,
    #[serde(rename = "isRemote")]
    pub is_remote: bool,
    pub scraped_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> EventListing {
        EventListing {
            title: "AI Hackathon".into(),
            link: "https://x/1".into(),
            source: "devpost".into(),
            status: "open".into(),
            location: "Online".into(),
            submission_period: "Aug 10 - Sep 20, 2026".into(),
            prize_amount: "$10,000 in prizes".into(),
            prize_floor: 10_000.0,
            participants: 120,
            host: "Example Org".into(),
            themes: BTreeSet::from(["AI".to_string()]),
            days_left: "12 days left".into(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn listing_enum_exposes_key_and_category() {
        let l = NormalizedListing::Hackathon(sample_event());
        assert_eq!(l.category(), Category::Hackathon);
        assert_eq!(l.category().table_name(), "hackathons");
        assert_eq!(l.link(), "https://x/1");
        assert_eq!(l.title(), "AI Hackathon");
    }

    #[test]
    fn event_row_serializes_derived_floor_as_prize_amount_camel() {
        let row = EventRow {
            id: 1,
            title: "AI Hackathon".into(),
            link: "https://x/1".into(),
            source: "devpost".into(),
            status: "open".into(),
            location: "Online".into(),
            submission_period: "".into(),
            prize_amount: "$10,000".into(),
            prize_floor: 10_000.0,
            participants: 0,
            host: "".into(),
            themes: vec!["AI".into()],
            days_left: "".into(),
            scraped_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["prizeAmount"], 10_000.0);
        assert_eq!(v["prize_amount"], "$10,000");
        assert!(v["themes"].is_array());
    }

    #[test]
    fn internship_row_uses_feed_camel_case() {
        let row = InternshipRow {
            id: 7,
            title: "Software Intern".into(),
            link: "https://jobs.test/1".into(),
            source: "apify".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            job_types: vec!["Internship".into()],
            salary: "$25 an hour".into(),
            salary_floor: 25.0,
            rating: 4.1,
            reviews_count: 12,
            posted_at: "3 days ago".into(),
            description: "".into(),
            is_remote: true,
            scraped_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["positionName"], "Software Intern");
        assert_eq!(v["url"], "https://jobs.test/1");
        assert_eq!(v["minSalary"], 25.0);
        assert_eq!(v["jobType"][0], "Internship");
        assert_eq!(v["reviewsCount"], 12);
        assert_eq!(v["isRemote"], true);
    }
}
