//! SQLite-backed listing store. One connection behind a mutex; four tables,
//! one per category, each keyed by `link` (UNIQUE). Upserts are idempotent:
//! re-running a cycle over unchanged feeds creates nothing new.
//!
//! Timestamps are stored as RFC 3339 TEXT. Set-valued columns (`themes`,
//! `job_types`) are stored comma-joined and split again on read.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::listing::{
    Category, CourseListing, CourseRow, EventListing, EventRow, InternshipListing, InternshipRow,
    NormalizedListing,
};

/// Outcome of a single upsert. `Skipped` covers the one unresolvable case:
/// the insert lost a race and the recovery update matched no row either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
}

/// Per-batch upsert tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
}

impl UpsertCounts {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.created + self.updated + self.skipped
    }
}

/// Row counts per category table, for the ops surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TableCounts {
    pub courses: u64,
    pub hackathons: u64,
    pub competitions: u64,
    pub internships: u64,
}

/// Sort keys for the event read surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSort {
    #[default]
    Title,
    PrizeFloor,
    Participants,
}

/// Sort keys for the internship read surface. `Newest` orders by last
/// update, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InternshipSort {
    #[default]
    Newest,
    Salary,
    Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseSort {
    #[default]
    Newest,
    Title,
}

/// Search + pagination options shared by the list functions.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Case-insensitive substring match (title; internships also match
    /// company and description).
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub skip: u32,
}

const DEFAULT_LIMIT: u32 = 100;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema exists.
    /// Parent directories must already exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Insert or overwrite one listing, keyed by `link` within its category
    /// table. Updates overwrite every category field and move `updated_at`
    /// to the incoming `scraped_at`; the stored `scraped_at` keeps its
    /// first-insert value.
    pub fn upsert(&self, listing: &NormalizedListing) -> Result<UpsertOutcome, StoreError> {
        if listing.link().trim().is_empty() {
            return Err(StoreError::InvalidListing("empty link"));
        }
        if listing.title().trim().is_empty() {
            return Err(StoreError::InvalidListing("empty title"));
        }
        let conn = self.conn();
        match listing {
            NormalizedListing::Course(c) => upsert_course(&conn, c),
            NormalizedListing::Hackathon(e) => upsert_event(&conn, "hackathons", e),
            NormalizedListing::Competition(e) => upsert_event(&conn, "competitions", e),
            NormalizedListing::Internship(i) => upsert_internship(&conn, i),
        }
    }

    /// Upsert a whole batch with per-listing isolation: a failing listing is
    /// counted as skipped and logged, the rest proceed.
    pub fn upsert_all(&self, listings: &[NormalizedListing]) -> UpsertCounts {
        let mut counts = UpsertCounts::default();
        for listing in listings {
            match self.upsert(listing) {
                Ok(outcome) => counts.record(outcome),
                Err(err) => {
                    counts.skipped += 1;
                    warn!(
                        category = %listing.category(),
                        link = %listing.link(),
                        error = %err,
                        "listing skipped during upsert"
                    );
                }
            }
        }
        counts
    }

    pub fn counts(&self) -> Result<TableCounts, StoreError> {
        let conn = self.conn();
        let count = |table: &str| -> Result<u64, StoreError> {
            let n: u64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
                r.get(0)
            })?;
            Ok(n)
        };
        Ok(TableCounts {
            courses: count(Category::Course.table_name())?,
            hackathons: count(Category::Hackathon.table_name())?,
            competitions: count(Category::Competition.table_name())?,
            internships: count(Category::Internship.table_name())?,
        })
    }

    pub fn list_hackathons(
        &self,
        query: &ListQuery,
        sort: EventSort,
    ) -> Result<Vec<EventRow>, StoreError> {
        self.list_events_in("hackathons", query, sort)
    }

    pub fn list_competitions(
        &self,
        query: &ListQuery,
        sort: EventSort,
    ) -> Result<Vec<EventRow>, StoreError> {
        self.list_events_in("competitions", query, sort)
    }

    fn list_events_in(
        &self,
        table: &str,
        query: &ListQuery,
        sort: EventSort,
    ) -> Result<Vec<EventRow>, StoreError> {
        let order = match sort {
            EventSort::Title => "title COLLATE NOCASE ASC",
            EventSort::PrizeFloor => "prize_floor DESC",
            EventSort::Participants => "participants DESC",
        };
        let (where_clause, search) = search_clause(query, &["title"]);
        let sql = format!(
            "SELECT id, title, link, source, status, location, submission_period,
                    prize_amount, prize_floor, participants, host, themes, days_left,
                    scraped_at, updated_at
             FROM {table}{where_clause}
             ORDER BY {order}, id ASC
             LIMIT ?1 OFFSET ?2"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<EventRow> {
            Ok(EventRow {
                id: row.get(0)?,
                title: row.get(1)?,
                link: row.get(2)?,
                source: row.get(3)?,
                status: row.get(4)?,
                location: row.get(5)?,
                submission_period: row.get(6)?,
                prize_amount: row.get(7)?,
                prize_floor: row.get(8)?,
                participants: row.get(9)?,
                host: row.get(10)?,
                themes: split_joined(&row.get::<_, String>(11)?),
                days_left: row.get(12)?,
                scraped_at: parse_ts(13, row.get(13)?)?,
                updated_at: parse_ts(14, row.get(14)?)?,
            })
        };
        let rows = match &search {
            Some(pat) => stmt
                .query_map(params![limit, query.skip, pat], map)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![limit, query.skip], map)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    pub fn list_courses(
        &self,
        query: &ListQuery,
        sort: CourseSort,
    ) -> Result<Vec<CourseRow>, StoreError> {
        let order = match sort {
            CourseSort::Newest => "updated_at DESC",
            CourseSort::Title => "title COLLATE NOCASE ASC",
        };
        let (where_clause, search) = search_clause(query, &["title"]);
        let sql = format!(
            "SELECT id, title, link, source, provider, scraped_at, updated_at
             FROM courses{where_clause}
             ORDER BY {order}, id ASC
             LIMIT ?1 OFFSET ?2"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CourseRow> {
            Ok(CourseRow {
                id: row.get(0)?,
                title: row.get(1)?,
                link: row.get(2)?,
                source: row.get(3)?,
                provider: row.get(4)?,
                scraped_at: parse_ts(5, row.get(5)?)?,
                updated_at: parse_ts(6, row.get(6)?)?,
            })
        };
        let rows = match &search {
            Some(pat) => stmt
                .query_map(params![limit, query.skip, pat], map)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![limit, query.skip], map)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    pub fn list_internships(
        &self,
        query: &ListQuery,
        sort: InternshipSort,
    ) -> Result<Vec<InternshipRow>, StoreError> {
        let order = match sort {
            InternshipSort::Newest => "updated_at DESC",
            InternshipSort::Salary => "salary_floor DESC",
            InternshipSort::Rating => "rating DESC",
        };
        let (where_clause, search) = search_clause(query, &["title", "company", "description"]);
        let sql = format!(
            "SELECT id, title, link, source, company, location, job_types, salary,
                    salary_floor, rating, reviews_count, posted_at, description,
                    is_remote, scraped_at, updated_at
             FROM internships{where_clause}
             ORDER BY {order}, id ASC
             LIMIT ?1 OFFSET ?2"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<InternshipRow> {
            Ok(InternshipRow {
                id: row.get(0)?,
                title: row.get(1)?,
                link: row.get(2)?,
                source: row.get(3)?,
                company: row.get(4)?,
                location: row.get(5)?,
                job_types: split_joined(&row.get::<_, String>(6)?),
                salary: row.get(7)?,
                salary_floor: row.get(8)?,
                rating: row.get(9)?,
                reviews_count: row.get(10)?,
                posted_at: row.get(11)?,
                description: row.get(12)?,
                is_remote: row.get(13)?,
                scraped_at: parse_ts(14, row.get(14)?)?,
                updated_at: parse_ts(15, row.get(15)?)?,
            })
        };
        let rows = match &search {
            Some(pat) => stmt
                .query_map(params![limit, query.skip, pat], map)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![limit, query.skip], map)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS courses (
            id         INTEGER PRIMARY KEY,
            title      TEXT NOT NULL,
            link       TEXT NOT NULL UNIQUE,
            source     TEXT NOT NULL,
            provider   TEXT NOT NULL DEFAULT '',
            scraped_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_courses_source ON courses(source);

        CREATE TABLE IF NOT EXISTS internships (
            id            INTEGER PRIMARY KEY,
            title         TEXT NOT NULL,
            link          TEXT NOT NULL UNIQUE,
            source        TEXT NOT NULL,
            company       TEXT NOT NULL DEFAULT '',
            location      TEXT NOT NULL DEFAULT '',
            job_types     TEXT NOT NULL DEFAULT '',
            salary        TEXT NOT NULL DEFAULT '',
            salary_floor  REAL NOT NULL DEFAULT 0,
            rating        REAL NOT NULL DEFAULT 0,
            reviews_count INTEGER NOT NULL DEFAULT 0,
            posted_at     TEXT NOT NULL DEFAULT '',
            description   TEXT NOT NULL DEFAULT '',
            is_remote     INTEGER NOT NULL DEFAULT 0,
            scraped_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_internships_source ON internships(source);
        ",
    )?;
    // hackathons and competitions share one column set.
    for table in ["hackathons", "competitions"] {
        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {table} (
                id                INTEGER PRIMARY KEY,
                title             TEXT NOT NULL,
                link              TEXT NOT NULL UNIQUE,
                source            TEXT NOT NULL,
                status            TEXT NOT NULL DEFAULT '',
                location          TEXT NOT NULL DEFAULT '',
                submission_period TEXT NOT NULL DEFAULT '',
                prize_amount      TEXT NOT NULL DEFAULT '',
                prize_floor       REAL NOT NULL DEFAULT 0,
                participants      INTEGER NOT NULL DEFAULT 0,
                host              TEXT NOT NULL DEFAULT '',
                themes            TEXT NOT NULL DEFAULT '',
                days_left         TEXT NOT NULL DEFAULT '',
                scraped_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source);
            "
        ))?;
    }
    Ok(())
}

fn upsert_course(conn: &Connection, c: &CourseListing) -> Result<UpsertOutcome, StoreError> {
    let update = |conn: &Connection| -> Result<usize, StoreError> {
        let n = conn.execute(
            "UPDATE courses
             SET title=?1, source=?2, provider=?3, updated_at=?4
             WHERE link=?5",
            params![c.title, c.source, c.provider, ts(c.scraped_at), c.link],
        )?;
        Ok(n)
    };
    if update(conn)? > 0 {
        return Ok(UpsertOutcome::Updated);
    }
    let inserted = conn.execute(
        "INSERT INTO courses (title, link, source, provider, scraped_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![c.title, c.link, c.source, c.provider, ts(c.scraped_at)],
    );
    resolve_insert(conn, inserted, &c.link, update)
}

fn upsert_event(
    conn: &Connection,
    table: &str,
    e: &EventListing,
) -> Result<UpsertOutcome, StoreError> {
    let themes = join_set(&e.themes);
    let update = |conn: &Connection| -> Result<usize, StoreError> {
        let n = conn.execute(
            &format!(
                "UPDATE {table}
                 SET title=?1, source=?2, status=?3, location=?4, submission_period=?5,
                     prize_amount=?6, prize_floor=?7, participants=?8, host=?9,
                     themes=?10, days_left=?11, updated_at=?12
                 WHERE link=?13"
            ),
            params![
                e.title,
                e.source,
                e.status,
                e.location,
                e.submission_period,
                e.prize_amount,
                e.prize_floor,
                e.participants,
                e.host,
                themes,
                e.days_left,
                ts(e.scraped_at),
                e.link,
            ],
        )?;
        Ok(n)
    };
    if update(conn)? > 0 {
        return Ok(UpsertOutcome::Updated);
    }
    let inserted = conn.execute(
        &format!(
            "INSERT INTO {table}
             (title, link, source, status, location, submission_period, prize_amount,
              prize_floor, participants, host, themes, days_left, scraped_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)"
        ),
        params![
            e.title,
            e.link,
            e.source,
            e.status,
            e.location,
            e.submission_period,
            e.prize_amount,
            e.prize_floor,
            e.participants,
            e.host,
            themes,
            e.days_left,
            ts(e.scraped_at),
        ],
    );
    resolve_insert(conn, inserted, &e.link, update)
}

fn upsert_internship(conn: &Connection, i: &InternshipListing) -> Result<UpsertOutcome, StoreError> {
    let job_types = join_set(&i.job_types);
    let update = |conn: &Connection| -> Result<usize, StoreError> {
        let n = conn.execute(
            "UPDATE internships
             SET title=?1, source=?2, company=?3, location=?4, job_types=?5, salary=?6,
                 salary_floor=?7, rating=?8, reviews_count=?9, posted_at=?10,
                 description=?11, is_remote=?12, updated_at=?13
             WHERE link=?14",
            params![
                i.title,
                i.source,
                i.company,
                i.location,
                job_types,
                i.salary,
                i.salary_floor,
                i.rating,
                i.reviews_count,
                i.posted_at,
                i.description,
                i.is_remote,
                ts(i.scraped_at),
                i.link,
            ],
        )?;
        Ok(n)
    };
    if update(conn)? > 0 {
        return Ok(UpsertOutcome::Updated);
    }
    let inserted = conn.execute(
        "INSERT INTO internships
         (title, link, source, company, location, job_types, salary, salary_floor,
          rating, reviews_count, posted_at, description, is_remote, scraped_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            i.title,
            i.link,
            i.source,
            i.company,
            i.location,
            job_types,
            i.salary,
            i.salary_floor,
            i.rating,
            i.reviews_count,
            i.posted_at,
            i.description,
            i.is_remote,
            ts(i.scraped_at),
        ],
    );
    resolve_insert(conn, inserted, &i.link, update)
}

/// Map an insert result to an outcome. A unique-constraint failure means a
/// concurrent writer inserted the same link between our update probe and the
/// insert; retry the update once, and give up as `Skipped` if the row
/// vanished again in between.
fn resolve_insert(
    conn: &Connection,
    inserted: rusqlite::Result<usize>,
    link: &str,
    update: impl Fn(&Connection) -> Result<usize, StoreError>,
) -> Result<UpsertOutcome, StoreError> {
    match inserted {
        Ok(_) => Ok(UpsertOutcome::Created),
        Err(err) if is_unique_violation(&err) => {
            if update(conn)? > 0 {
                Ok(UpsertOutcome::Updated)
            } else {
                warn!(link, "insert race could not be resolved; listing skipped");
                Ok(UpsertOutcome::Skipped)
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn split_joined(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// WHERE fragment + LIKE pattern for a case-insensitive substring search
/// over `columns`. `%`/`_`/`\` in the needle are escaped.
fn search_clause(query: &ListQuery, columns: &[&str]) -> (String, Option<String>) {
    match query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(needle) => {
            let escaped = needle
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let clauses = columns
                .iter()
                .map(|c| format!("{c} LIKE ?3 ESCAPE '\\'"))
                .collect::<Vec<_>>()
                .join(" OR ");
            (format!(" WHERE ({clauses})"), Some(format!("%{escaped}%")))
        }
        None => (String::new(), None),
    }
}
