//! Integration tests for the import API endpoints

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::util::ServiceExt;

use propsync_common::events::EventBus;
use propsync_import::config::ImportConfig;
use propsync_import::{db, AppState};

/// Build one 70-column wp_wpl_properties tuple with overrides
fn make_row(overrides: &[(usize, &str)]) -> String {
    let mut cols: Vec<String> = (0..70).map(|_| "0".to_string()).collect();
    for (index, value) in overrides {
        cols[*index] = value.to_string();
    }
    format!("({})", cols.join(","))
}

fn property_row(id: i64) -> String {
    make_row(&[
        (0, &id.to_string()),
        (3, &format!("'REF{}'", id)),
        (6, "1"),
        (8, "9"),
        (9, "7"),
        (19, "'Guararema'"),
        (25, "200000"),
        (29, "2"),
        (31, "1"),
        (65, &format!("'Casa {}'", id)),
        (66, "'<p>Casa.</p>'"),
    ])
}

/// Test app backed by a file database so the background run shares it
async fn create_test_app(
    dir: &TempDir,
    record_count: usize,
) -> (axum::Router, sqlx::SqlitePool) {
    let pool = db::init_database_pool(&dir.path().join("propsync.db"))
        .await
        .expect("database init");

    let source_export_path = if record_count > 0 {
        let rows: Vec<String> = (1..=record_count as i64).map(property_row).collect();
        let sql = format!("INSERT INTO `wp_wpl_properties` VALUES {};", rows.join(","));
        let path = dir.path().join("wpl_export.sql");
        std::fs::write(&path, sql).expect("write export");
        Some(path.to_string_lossy().into_owned())
    } else {
        None
    };

    let config = ImportConfig {
        batch_size: 30,
        legacy_photo_host: "legado.example.com.br".to_string(),
        source_export_path,
    };

    let state = AppState::new(pool.clone(), EventBus::new(100), config);
    (propsync_import::build_router(state), pool)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn post_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn put_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Poll the status endpoint until the run leaves RUNNING
async fn wait_for_terminal_state(app: &axum::Router) -> serde_json::Value {
    for _ in 0..100 {
        let (status, json) = get_json(app, "/api/wordpress-import/status").await;
        assert_eq!(status, StatusCode::OK);
        if json["run_state"] != "RUNNING" && json["run_state"] != "IDLE" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("import run did not reach a terminal state in time");
}

#[tokio::test]
async fn health_endpoint_reports_module() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = create_test_app(&dir, 0).await;

    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "propsync-import");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn status_on_fresh_database_is_idle_and_zeroed() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = create_test_app(&dir, 0).await;

    let (status, json) = get_json(&app, "/api/wordpress-import/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["run_state"], "IDLE");
    assert_eq!(json["last_processed_id"], 0);
    assert_eq!(json["total_processed"], 0);
    assert_eq!(json["total_failed"], 0);
    assert_eq!(json["catalog"]["total"], 0);
}

#[tokio::test]
async fn start_without_source_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = create_test_app(&dir, 0).await;

    let (status, json) = post_json(&app, "/api/wordpress-import/start").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn start_runs_one_batch_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = create_test_app(&dir, 4).await;

    let (status, json) = post_json(&app, "/api/wordpress-import/start").await;
    // The run is acknowledged, not awaited
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["state"], "RUNNING");
    assert_eq!(json["resume_from_id"], 0);
    assert_eq!(json["batch_size"], 30);

    let final_status = wait_for_terminal_state(&app).await;
    assert_eq!(final_status["run_state"], "COMPLETED");
    assert_eq!(final_status["total_processed"], 4);
    assert_eq!(final_status["total_failed"], 0);
    assert_eq!(final_status["last_processed_id"], 4);
    assert_eq!(final_status["total_source_records"], 4);
    assert_eq!(final_status["total_catalog_records"], 4);
    assert_eq!(final_status["catalog"]["pending"], 4);
}

#[tokio::test]
async fn start_while_running_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let (app, pool) = create_test_app(&dir, 2).await;

    // Simulate an active run left by another instance
    let mut cp = db::checkpoint::load_checkpoint(&pool).await.unwrap();
    cp.run_state = propsync_import::models::RunState::Running;
    db::checkpoint::save_checkpoint(&pool, &mut cp).await.unwrap();

    let (status, json) = post_json(&app, "/api/wordpress-import/start").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn reset_clears_checkpoint_and_is_refused_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let (app, pool) = create_test_app(&dir, 2).await;

    post_json(&app, "/api/wordpress-import/start").await;
    let done = wait_for_terminal_state(&app).await;
    assert_eq!(done["total_processed"], 2);

    let (status, json) = post_json(&app, "/api/wordpress-import/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "IDLE");
    assert_eq!(json["last_processed_id"], 0);

    let (_, after) = get_json(&app, "/api/wordpress-import/status").await;
    assert_eq!(after["run_state"], "IDLE");
    assert_eq!(after["total_processed"], 0);
    assert_eq!(after["errors"].as_array().unwrap().len(), 0);
    // The catalog itself is untouched by a checkpoint reset
    assert_eq!(after["total_catalog_records"], 2);

    // A running state blocks the reset
    let mut cp = db::checkpoint::load_checkpoint(&pool).await.unwrap();
    cp.run_state = propsync_import::models::RunState::Running;
    db::checkpoint::save_checkpoint(&pool, &mut cp).await.unwrap();

    let (status, _) = post_json(&app, "/api/wordpress-import/reset").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn saved_settings_govern_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _pool) = create_test_app(&dir, 3).await;

    let (status, json) = put_json(
        &app,
        "/api/wordpress-import/settings",
        serde_json::json!({ "batch_size": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["batch_size"], 2);

    let (status, json) = get_json(&app, "/api/wordpress-import/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["batch_size"], 2);

    // The saved batch size caps the run at two of the three records
    let (status, json) = post_json(&app, "/api/wordpress-import/start").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["batch_size"], 2);

    let done = wait_for_terminal_state(&app).await;
    assert_eq!(done["run_state"], "PAUSED");
    assert_eq!(done["total_processed"], 2);
}

#[tokio::test]
async fn stale_running_checkpoint_does_not_block_a_new_start() {
    let dir = tempfile::tempdir().unwrap();
    let (app, pool) = create_test_app(&dir, 2).await;

    // A runner died holding RUNNING well past the lease
    let mut cp = db::checkpoint::load_checkpoint(&pool).await.unwrap();
    cp.run_state = propsync_import::models::RunState::Running;
    db::checkpoint::save_checkpoint(&pool, &mut cp).await.unwrap();
    let stale = chrono::Utc::now()
        - chrono::Duration::seconds(propsync_import::models::RUN_LEASE_SECONDS + 1);
    sqlx::query("UPDATE import_checkpoint SET last_updated_at = ? WHERE id = 1")
        .bind(stale.to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

    let (status, _) = post_json(&app, "/api/wordpress-import/start").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let done = wait_for_terminal_state(&app).await;
    assert_eq!(done["run_state"], "COMPLETED");
    assert_eq!(done["total_processed"], 2);
}

#[tokio::test]
async fn second_start_after_completion_skips_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    let (app, pool) = create_test_app(&dir, 3).await;

    post_json(&app, "/api/wordpress-import/start").await;
    wait_for_terminal_state(&app).await;

    // Operator resets progress and imports again; nothing is duplicated
    post_json(&app, "/api/wordpress-import/reset").await;
    post_json(&app, "/api/wordpress-import/start").await;
    let done = wait_for_terminal_state(&app).await;

    assert_eq!(done["run_state"], "COMPLETED");
    assert_eq!(done["total_processed"], 3);
    assert_eq!(db::properties::count_properties(&pool).await.unwrap(), 3);
}
