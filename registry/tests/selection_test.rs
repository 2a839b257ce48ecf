//! Worker selection and location directory integration tests

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use registry::config::AdmissionScope;
use registry::state::AppState;
use registry::{api, db};

async fn setup_test_app() -> (axum::Router, tempfile::TempDir, sqlx::SqlitePool) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test_registry.db");

    let pool = sqlx::SqlitePool::connect_with(
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true),
    )
    .await
    .expect("Failed to open database");
    db::migrate(&pool).await.expect("Migration failed");

    let state = Arc::new(AppState::new(pool.clone(), AdmissionScope::Scoped));
    let app = api::router().with_state(state);
    (app, temp_dir, pool)
}

/// Directory entries are provisioned out of band; tests seed them directly.
async fn insert_location(
    pool: &sqlx::SqlitePool,
    location: &str,
    servername: &str,
    environment: &str,
    kind: &str,
    factor_hundredths: i64,
    status: &str,
) {
    sqlx::query(
        "INSERT INTO locations (id, location, servername, kind, environment, factor, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(location)
    .bind(servername)
    .bind(kind)
    .bind(environment)
    .bind(factor_hundredths)
    .bind(status)
    .execute(pool)
    .await
    .expect("Failed to seed location");
}

fn register_body(factor: f64, workers: &[&str]) -> Value {
    json!({
        "repo": "perf-tests",
        "lac": "emea",
        "stream": "main",
        "test": "checkout-load",
        "type": "load",
        "environment": "PP",
        "triggered_by": "ci",
        "factor": factor,
        "location": "dc1",
        "container_name": "perf-runner-1",
        "execution_type": "distributed",
        "workers": workers,
        "tool": "jmeter",
        "script_version": "a1b2c3d4",
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).expect("Invalid JSON response");
    (status, value)
}

#[tokio::test]
async fn test_single_worker_covers_small_factor() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 50, "up").await;

    let (status, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0.8"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["w1"]));
}

#[tokio::test]
async fn test_factor_above_one_selects_minimal_group() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 80, "up").await;

    // n=1 needs 1.5 (nobody), n=2 needs 0.75 each — w1 and w2 qualify.
    let (status, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=1.5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["w1", "w2"]));
}

#[tokio::test]
async fn test_group_requires_every_member_to_carry_its_share() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 50, "up").await;

    // The pool sums to 1.5 but w2 cannot carry 0.75 on its own.
    let (status, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=1.5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Not enough servers"));
}

#[tokio::test]
async fn test_no_feasible_group_is_a_message_not_an_error() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 50, "up").await;

    let (status, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Not enough servers"));
}

#[tokio::test]
async fn test_unknown_pool_is_a_message() {
    let (app, _temp_dir, _pool) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        get("/workers?location=nowhere&environment=PP&factor=0.5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("No servers found"));
}

#[tokio::test]
async fn test_running_load_subtracts_from_available() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 50, "up").await;

    // 0.6 bound to w1 alone: w1 drops to 0.4, w2 still has 0.5.
    let (_, body) = json_response(&app, post_json("/register", &register_body(0.6, &["w1"]))).await;
    assert_eq!(body["message"], "Test registered");

    let (_, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0.45"),
    )
    .await;
    assert_eq!(body, json!(["w2"]));
}

#[tokio::test]
async fn test_load_splits_evenly_across_bound_workers() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 100, "up").await;

    // 0.8 split across both: each carries 0.4, leaving 0.6 apiece.
    json_response(&app, post_json("/register", &register_body(0.8, &["w1", "w2"]))).await;

    let (_, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0.6"),
    )
    .await;
    // Equal availability — tie broken by servername.
    assert_eq!(body, json!(["w1"]));

    let (_, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0.7"),
    )
    .await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("No single server"));
}

#[tokio::test]
async fn test_unscheduled_execution_charges_no_worker() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;

    // Empty workers list: counts toward admission, not toward any worker.
    json_response(&app, post_json("/register", &register_body(0.6, &[]))).await;

    let (_, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0.9"),
    )
    .await;
    assert_eq!(body, json!(["w1"]));
}

#[tokio::test]
async fn test_down_workers_are_excluded() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "down").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 50, "up").await;

    let (_, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0.8"),
    )
    .await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("No single server"));

    let (_, body) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0.4"),
    )
    .await;
    assert_eq!(body, json!(["w2"]));
}

#[tokio::test]
async fn test_workers_factor_must_be_positive() {
    let (app, _temp_dir, _pool) = setup_test_app().await;

    let (status, _) = json_response(
        &app,
        get("/workers?location=dc1&environment=PP&factor=0"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orchestrator_lookup() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    // orch0 sorts before orch1 but is down, so it must be passed over.
    insert_location(&pool, "dc1", "orch0", "PP", "orchestrator", 100, "down").await;
    insert_location(&pool, "dc1", "orch1", "PP", "orchestrator", 100, "up").await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;

    let (status, body) = json_response(&app, get("/orchestrator?location=dc1&environment=PP")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["servername"], "orch1");

    // A pair whose only orchestrator is down has none available.
    insert_location(&pool, "dc2", "orch2", "PP", "orchestrator", 100, "down").await;
    let (status, body) =
        json_response(&app, get("/orchestrator?location=dc2&environment=PP")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("No orchestrator found"));

    // As does a pair with no entries at all.
    let (status, body) =
        json_response(&app, get("/orchestrator?location=dc3&environment=PP")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("No orchestrator found"));
}

#[tokio::test]
async fn test_location_status_roundtrip() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 100, "up").await;

    let (status, body) =
        json_response(&app, get("/location_status?location=dc1&servername=w1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let (status, body) = json_response(
        &app,
        post_empty("/location_status?location=dc1&servername=w1&status=down"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "down");

    let (_, body) = json_response(&app, get("/location_status?location=dc1&servername=w1")).await;
    assert_eq!(body["status"], "down");

    // Unknown pair
    let (status, _) =
        json_response(&app, get("/location_status?location=dc1&servername=ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Status outside up/down is rejected at the boundary.
    let response = app
        .clone()
        .oneshot(post_empty(
            "/location_status?location=dc1&servername=w1&status=sideways",
        ))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_capacity_report_joins_load() {
    let (app, _temp_dir, pool) = setup_test_app().await;
    insert_location(&pool, "dc1", "w1", "PP", "worker", 150, "up").await;
    insert_location(&pool, "dc1", "w2", "PP", "worker", 50, "down").await;
    insert_location(&pool, "dc1", "orch1", "PP", "orchestrator", 100, "up").await;

    json_response(&app, post_json("/register", &register_body(0.6, &["w1"]))).await;

    let (status, body) = json_response(&app, get("/locations")).await;
    assert_eq!(status, StatusCode::OK);
    let report = body.as_array().expect("report array");

    // Orchestrators are not part of the worker capacity report.
    assert_eq!(report.len(), 2);

    let w1 = &report[0];
    assert_eq!(w1["servername"], "w1");
    assert_eq!(w1["location_factor"], 1.5);
    assert!((w1["running_sum"].as_f64().unwrap() - 0.6).abs() < 1e-9);
    assert!((w1["available_factor"].as_f64().unwrap() - 0.9).abs() < 1e-9);
    assert_eq!(w1["status"], "up");

    // Down workers still appear in the report with zero load.
    let w2 = &report[1];
    assert_eq!(w2["servername"], "w2");
    assert_eq!(w2["running_sum"], 0.0);
    assert_eq!(w2["status"], "down");
}
