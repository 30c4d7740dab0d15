//! Tests for the data app facade

use super::*;
use crate::auth::{DenyReason, RequestHeaders, USER_EMAIL_HEADER, USER_ROLES_HEADER};
use crate::config::AppConfig;
use crate::error::Error;
use crate::frame::TableFrame;
use crate::selection::{SelectionEvent, Stage};
use crate::session::{Secrets, SessionStore};
use crate::types::{Placement, WriteMode};
use crate::warehouse::WarehouseConfig;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TABLE: &str = "in.c-main.users";

fn config_for(server: &MockServer, tmp: &TempDir) -> AppConfig {
    let mut config = AppConfig::new(server.uri(), "app-token");
    config.storage.tmp_data_folder = tmp.path().join("data");
    config.storage.http.max_retries = 0;
    config.storage.http.rate_limit = None;
    config.storage.jobs.poll_interval_ms = 10;
    config.storage.jobs.max_wait_seconds = 5;
    config
}

fn app_for(server: &MockServer, tmp: &TempDir) -> DataApp {
    DataApp::new(config_for(server, tmp)).unwrap()
}

fn proxied(email: &str) -> RequestHeaders {
    RequestHeaders::new().with(USER_EMAIL_HEADER, email)
}

/// Table detail, export job, file and download for `in.c-main.users`
async fn mount_export(server: &MockServer, expected_exports: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/storage/tables/{TABLE}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": TABLE,
            "name": "users",
            "columns": ["id", "name"]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v2/storage/tables/{TABLE}/export-async")))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": 7001,
            "status": "success",
            "operationName": "tableExport",
            "tableId": TABLE,
            "results": {"file": {"id": 9001}}
        })))
        .expect(expected_exports)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/storage/files/9001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9001,
            "name": "users.csv",
            "url": format!("{}/download/users.csv", server.uri()),
            "isSliced": false
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/download/users.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("id,name\n1,Alice\n2,Bob\n"))
        .mount(server)
        .await;
}

async fn mount_event(server: &MockServer, expected: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v2/storage/events"))
        .and(body_partial_json(expected))
        .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v2/storage/buckets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "in.c-main", "name": "c-main", "displayName": "main"},
            {"id": "out.c-reports", "name": "c-reports"}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/storage/buckets/in.c-main/tables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": TABLE, "name": "users"}
        ])))
        .mount(server)
        .await;
}

// ============================================================================
// Headers + Access
// ============================================================================

#[tokio::test]
async fn test_resolve_headers_prefers_proxy() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let mut app = app_for(&server, &tmp);

    assert!(app.resolve_headers(&RequestHeaders::new()).is_empty());

    let dev = proxied("dev@example.com").with(USER_ROLES_HEADER, "admin");
    app.set_dev_mockup_headers(dev.clone());
    assert_eq!(app.resolve_headers(&RequestHeaders::new()), dev);

    let live = proxied("jane@example.com");
    assert_eq!(app.resolve_headers(&live), live);
    assert_eq!(app.identity(&live).token.as_deref(), Some("jane@example.com"));
}

#[tokio::test]
async fn test_auth_check() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let app = DataApp::new(config_for(&server, &tmp).with_required_role("admin")).unwrap();

    let err = app.auth_check(&RequestHeaders::new(), true).unwrap_err();
    assert!(err.halts_app());
    assert!(matches!(
        err,
        Error::AccessDenied {
            reason: DenyReason::Unauthenticated
        }
    ));

    let viewer = proxied("jane@example.com").with(USER_ROLES_HEADER, "viewer");
    let err = app.auth_check(&viewer, false).unwrap_err();
    assert!(matches!(
        err,
        Error::AccessDenied {
            reason: DenyReason::InsufficientRole
        }
    ));

    let admin = proxied("jane@example.com").with(USER_ROLES_HEADER, "viewer, admin");
    let identity = app.auth_check(&admin, true).unwrap();
    assert_eq!(identity.roles, vec!["viewer", "admin"]);
}

#[tokio::test]
async fn test_auth_check_without_role_admits_any_user() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let app = app_for(&server, &tmp);

    assert!(app.auth_check(&proxied("jane@example.com"), false).is_ok());
}

#[tokio::test]
async fn test_logout_link() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let app = app_for(&server, &tmp);

    assert!(app.logout_link(&RequestHeaders::new()).is_none());

    let link = app.logout_link(&proxied("jane@example.com")).unwrap();
    assert_eq!(
        link,
        LogoutLink {
            label: "Logged in as user: jane@example.com".to_string(),
            href: "/_proxy/sign_out".to_string(),
            placement: Placement::Sidebar,
        }
    );
}

// ============================================================================
// Read + Write
// ============================================================================

#[tokio::test]
async fn test_read_table_records_event() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_export(&server, 1).await;
    mount_event(
        &server,
        json!({
            "message": READ_EVENT_MESSAGE,
            "params": {
                "user": "jane@example.com",
                "endpoint": READ_EVENT_ENDPOINT,
                "event_job_id": 7001
            }
        }),
    )
    .await;

    let reported = app_for(&server, &tmp)
        .read_table(&proxied("jane@example.com"), TABLE)
        .await;

    assert!(reported.messages.is_empty());
    assert_eq!(reported.value.num_rows(), 2);
    assert!(tmp.path().join("data").join("in.c-main.users.csv").exists());
}

#[tokio::test]
async fn test_read_table_failure_is_reported() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path(format!("/v2/storage/tables/{TABLE}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "Table not found",
            "code": "storage.tables.notFound"
        })))
        .mount(&server)
        .await;

    let reported = app_for(&server, &tmp)
        .read_table(&RequestHeaders::new(), TABLE)
        .await;

    assert!(reported.value.is_empty());
    assert!(reported.has_errors());
    assert!(reported.messages[0]
        .text
        .starts_with("An error occurred while retrieving data:"));
    assert!(reported.messages[0].text.contains("Table not found"));
}

#[tokio::test]
async fn test_write_table_records_import_job() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/v2/storage/tables/{TABLE}/import")))
        .and(body_string_contains("name=\"incremental\"\r\n\r\n0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "importedColumns": ["id", "name"],
            "warnings": ["Column name was trimmed"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/storage/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 52, "status": "success", "operationName": "tableImport", "tableId": TABLE}
        ])))
        .mount(&server)
        .await;
    mount_event(
        &server,
        json!({
            "message": WRITE_EVENT_MESSAGE,
            "params": {"endpoint": WRITE_EVENT_ENDPOINT, "event_job_id": 52}
        }),
    )
    .await;

    let frame = TableFrame::from_records(&[json!({"id": 1, "name": "Alice"})]).unwrap();
    let reported = app_for(&server, &tmp)
        .write_table(&proxied("jane@example.com"), TABLE, &frame, WriteMode::Overwrite)
        .await;

    assert!(!reported.has_errors());
    assert_eq!(reported.messages.len(), 1);
    assert_eq!(reported.messages[0].text, "Column name was trimmed");
}

#[tokio::test]
async fn test_write_table_failure_is_reported() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path(format!("/v2/storage/tables/{TABLE}/import")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Some columns are missing in the csv file",
            "code": "csvImport.columnsNotMatch"
        })))
        .mount(&server)
        .await;

    let frame = TableFrame::from_records(&[json!({"id": 1})]).unwrap();
    let reported = app_for(&server, &tmp)
        .write_table(&RequestHeaders::new(), TABLE, &frame, WriteMode::Incremental)
        .await;

    assert!(reported.has_errors());
    assert!(reported.messages[0].text.starts_with("Data upload failed with:"));
}

#[test]
fn test_write_event_preview_is_capped() {
    let records: Vec<_> = (0..120).map(|i| json!({"id": i, "name": format!("user-{i}")})).collect();
    let frame = TableFrame::from_records(&records).unwrap();

    let preview = super::facade::event_table_preview(&frame).unwrap();

    assert!(preview.contains("| user-0 "));
    assert!(preview.contains("| user-49 "));
    assert!(!preview.contains("| user-50 "));
    assert!(!preview.contains("| user-119 "));
    assert!(preview.ends_with("[120 rows x 2 columns]"));
}

#[test]
fn test_short_write_event_preview_is_whole_frame() {
    let frame = TableFrame::from_records(&[json!({"id": 1, "name": "Alice"})]).unwrap();

    let preview = super::facade::event_table_preview(&frame).unwrap();

    assert_eq!(preview, frame.pretty().unwrap());
    assert!(!preview.contains("rows x"));
    assert_eq!(EVENT_PREVIEW_ROWS, 50);
}

#[tokio::test]
async fn test_rejected_event_does_not_fail_read() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_export(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/storage/events"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let reported = app_for(&server, &tmp)
        .read_table(&RequestHeaders::new(), TABLE)
        .await;

    assert!(reported.messages.is_empty());
    assert_eq!(reported.value.num_rows(), 2);
}

// ============================================================================
// Table Selection
// ============================================================================

#[tokio::test]
async fn test_table_selection_loads_and_caches_frame() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_catalog(&server).await;
    mount_export(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/v2/storage/events"))
        .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
        .mount(&server)
        .await;

    let app = app_for(&server, &tmp);
    let session = SessionStore::in_memory();
    let headers = proxied("jane@example.com");

    let out = app
        .add_table_selection(&headers, &session, SelectionEvent::PickBucket("in.c-main".into()))
        .await
        .unwrap();
    assert_eq!(out.view.stage, Stage::BucketChosen);
    assert!(out.frame.is_empty());

    let out = app
        .add_table_selection(&headers, &session, SelectionEvent::PickTable(TABLE.into()))
        .await
        .unwrap();
    assert_eq!(out.view.resolved_table.as_deref(), Some(TABLE));
    assert_eq!(out.frame.num_rows(), 2);

    // served from the cache
    let out = app
        .add_table_selection(&headers, &session, SelectionEvent::Refresh)
        .await
        .unwrap();
    assert_eq!(out.frame.num_rows(), 2);

    let out = app
        .add_table_selection(&headers, &session, SelectionEvent::Reconnect)
        .await
        .unwrap();
    assert_eq!(out.view.stage, Stage::NoBucket);
    assert!(out.frame.is_empty());

    app.add_table_selection(&headers, &session, SelectionEvent::PickBucket("in.c-main".into()))
        .await
        .unwrap();
    let out = app
        .add_table_selection(&headers, &session, SelectionEvent::PickTable(TABLE.into()))
        .await
        .unwrap();
    assert_eq!(out.frame.num_rows(), 2);
}

#[tokio::test]
async fn test_table_selection_surfaces_read_errors() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/storage/tables/{TABLE}")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let app = app_for(&server, &tmp);
    let session = SessionStore::in_memory();
    let headers = RequestHeaders::new();

    app.add_table_selection(&headers, &session, SelectionEvent::PickBucket("in.c-main".into()))
        .await
        .unwrap();
    let out = app
        .add_table_selection(&headers, &session, SelectionEvent::PickTable(TABLE.into()))
        .await
        .unwrap();

    assert_eq!(out.view.stage, Stage::TableChosen);
    assert!(out.frame.is_empty());
    assert!(out.view.has_errors());
}

// ============================================================================
// Construction + Warehouse
// ============================================================================

#[tokio::test]
async fn test_from_secrets() {
    let server = MockServer::start().await;
    let secrets = Secrets::new()
        .with("kbc_url", server.uri())
        .with("kbc_token", "secret-token")
        .with("kbc_required_role", "admin");

    let app = DataApp::from_secrets(&secrets).unwrap();
    assert_eq!(app.gate().required_role(), Some("admin"));
    assert_eq!(app.storage().root_url(), server.uri());

    assert!(DataApp::from_secrets(&Secrets::new()).is_err());
}

#[tokio::test]
async fn test_warehouse_session() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    let err = app_for(&server, &tmp).create_warehouse_session().unwrap_err();
    assert!(matches!(err, Error::MissingConfigField { .. }));

    let mut config = config_for(&server, &tmp);
    config.warehouse = Some(WarehouseConfig::default());
    let session = DataApp::new(config).unwrap().create_warehouse_session().unwrap();
    let frame = session.execute_query("SELECT 42 AS answer", true).unwrap();
    assert_eq!(frame.to_records().unwrap(), vec![json!({"answer": 42})]);
}
