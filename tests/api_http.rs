// tests/api_http.rs
//
// HTTP-level tests for the ops Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET  /health
// - GET  /admin/runs   (roster, idle state, last result after a run)
// - GET  /admin/stats  (table counts)
// - POST /admin/run    (202 + per-source outcomes)
// - POST /admin/run/{source}  (202, and 404 for unknown ids)

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use opportunity_aggregator::create_router;
use opportunity_aggregator::ingest::coordinator::Coordinator;
use opportunity_aggregator::ingest::sources::{
    ApifyInternshipsExtractor, CourseraExtractor, DevpostExtractor, LablabExtractor,
    UdemyExtractor,
};
use opportunity_aggregator::ingest::types::{SourceKind, SourceSpec};
use opportunity_aggregator::store::Store;

const BODY_LIMIT: usize = 1 * 1024 * 1024; // 1MB, safe for tests

const DEVPOST_PAGE: &str = include_str!("fixtures/devpost_hackathons.json");
const LABLAB_PAGE: &str = include_str!("fixtures/lablab_event.html");
const COURSERA_PAGE: &str = include_str!("fixtures/coursera_courses.json");
const UDEMY_PAGE: &str = include_str!("fixtures/udemy_courses.json");
const APIFY_PAGE: &str = include_str!("fixtures/apify_internships.json");

fn fixture_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::new(
            "devpost",
            SourceKind::Events,
            Box::new(DevpostExtractor::from_fixture(DEVPOST_PAGE)),
        ),
        SourceSpec::new(
            "lablab",
            SourceKind::Events,
            Box::new(LablabExtractor::from_fixture(LABLAB_PAGE)),
        ),
        SourceSpec::new(
            "coursera",
            SourceKind::Courses,
            Box::new(CourseraExtractor::from_fixture(COURSERA_PAGE, 50)),
        ),
        SourceSpec::new(
            "udemy",
            SourceKind::Courses,
            Box::new(UdemyExtractor::from_fixture(UDEMY_PAGE)),
        ),
        SourceSpec::new(
            "apify-internships",
            SourceKind::Internships,
            Box::new(ApifyInternshipsExtractor::from_fixture(APIFY_PAGE)),
        ),
    ]
}

/// Build the same Router the binary uses, on fixture sources.
fn test_app() -> (Router, Arc<Coordinator>, Arc<Store>) {
    let store = Arc::new(Store::open_in_memory().expect("open in-memory store"));
    let coordinator = Arc::new(Coordinator::new(
        fixture_sources(),
        Arc::clone(&store),
        Duration::from_secs(5),
    ));
    let app = create_router(Arc::clone(&coordinator), Arc::clone(&store));
    (app, coordinator, store)
}

async fn read_body(resp: axum::response::Response) -> Vec<u8> {
    body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec()
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let (app, _, _) = test_app();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let body = String::from_utf8(read_body(resp).await).expect("utf8");
    assert_eq!(body.trim(), "OK", "health body should be 'OK'");
}

#[tokio::test]
async fn admin_runs_lists_roster_in_idle_state() {
    let (app, _, _) = test_app();

    let req = Request::builder()
        .method("GET")
        .uri("/admin/runs")
        .body(Body::empty())
        .expect("build GET /admin/runs");

    let resp = app.oneshot(req).await.expect("oneshot /admin/runs");
    assert_eq!(resp.status(), StatusCode::OK);

    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("parse runs json");
    let entries = v.as_array().expect("runs response must be an array");
    assert_eq!(entries.len(), 5, "one entry per configured source");

    for entry in entries {
        assert_eq!(entry["state"], "idle");
        assert!(entry["last_result"].is_null(), "no run has happened yet");
    }
    assert_eq!(entries[0]["source"], "devpost");
    assert_eq!(entries[0]["kind"], "events");
    assert_eq!(entries[4]["source"], "apify-internships");
    assert_eq!(entries[4]["kind"], "internships");
}

#[tokio::test]
async fn admin_runs_carries_last_result_after_a_run() {
    let (app, coordinator, _) = test_app();

    coordinator
        .run_source("devpost")
        .await
        .expect("devpost is on the roster");

    let req = Request::builder()
        .method("GET")
        .uri("/admin/runs")
        .body(Body::empty())
        .expect("build GET /admin/runs");

    let resp = app.oneshot(req).await.expect("oneshot /admin/runs");
    assert_eq!(resp.status(), StatusCode::OK);

    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("parse runs json");
    let devpost = v
        .as_array()
        .expect("array")
        .iter()
        .find(|e| e["source"] == "devpost")
        .expect("devpost entry")
        .clone();

    assert_eq!(devpost["state"], "idle", "run has finished");
    let last = &devpost["last_result"];
    assert_eq!(last["extracted"], 3);
    assert_eq!(last["dropped"], 1);
    assert_eq!(last["created"], 2);
    assert!(last["error"].is_null(), "run should have succeeded");
}

#[tokio::test]
async fn admin_stats_reports_table_counts() {
    let (app, coordinator, _) = test_app();
    coordinator.run_cycle().await;

    let req = Request::builder()
        .method("GET")
        .uri("/admin/stats")
        .body(Body::empty())
        .expect("build GET /admin/stats");

    let resp = app.oneshot(req).await.expect("oneshot /admin/stats");
    assert_eq!(resp.status(), StatusCode::OK);

    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("parse stats json");
    assert_eq!(v["hackathons"], 2);
    assert_eq!(v["competitions"], 2);
    assert_eq!(v["courses"], 4);
    assert_eq!(v["internships"], 2);
}

#[tokio::test]
async fn admin_run_accepts_and_reports_each_source() {
    let (app, _, _) = test_app();

    let req = Request::builder()
        .method("POST")
        .uri("/admin/run")
        .body(Body::empty())
        .expect("build POST /admin/run");

    let resp = app.oneshot(req).await.expect("oneshot /admin/run");
    assert_eq!(
        resp.status(),
        StatusCode::ACCEPTED,
        "cycle trigger is asynchronous"
    );

    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("parse trigger json");
    let entries = v.as_array().expect("trigger response must be an array");
    assert_eq!(entries.len(), 5);
    for entry in entries {
        assert_eq!(entry["outcome"], "started", "idle slots all accept");
    }
}

#[tokio::test]
async fn admin_run_source_accepts_known_id() {
    let (app, _, _) = test_app();

    let req = Request::builder()
        .method("POST")
        .uri("/admin/run/devpost")
        .body(Body::empty())
        .expect("build POST /admin/run/devpost");

    let resp = app.oneshot(req).await.expect("oneshot /admin/run/devpost");
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("parse trigger json");
    assert_eq!(v["source"], "devpost");
    assert_eq!(v["outcome"], "started");
}

#[tokio::test]
async fn admin_run_source_rejects_unknown_id() {
    let (app, _, _) = test_app();

    let req = Request::builder()
        .method("POST")
        .uri("/admin/run/geocities")
        .body(Body::empty())
        .expect("build POST /admin/run/geocities");

    let resp = app.oneshot(req).await.expect("oneshot unknown source");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = String::from_utf8(read_body(resp).await).expect("utf8");
    assert!(
        body.contains("unknown source"),
        "404 body should name the problem, got '{body}'"
    );
}
