//! Tests for the session module

use super::*;
use crate::error::Error;
use serde_json::json;
use tempfile::tempdir;

// ============================================================================
// Store Tests
// ============================================================================

#[tokio::test]
async fn test_get_set_remove() {
    let store = SessionStore::in_memory();
    assert!(store.get("selected_bucket").await.is_none());

    store.set("selected_bucket", "in.c-main").await.unwrap();
    assert_eq!(store.get("selected_bucket").await, Some(json!("in.c-main")));
    assert!(store.contains("selected_bucket").await);

    let previous = store.remove("selected_bucket").await.unwrap();
    assert_eq!(previous, Some(json!("in.c-main")));
    assert!(!store.contains("selected_bucket").await);
}

#[tokio::test]
async fn test_get_as_typed() {
    let store = SessionStore::in_memory();
    store.set("counts", vec![1, 2, 3]).await.unwrap();

    let counts: Option<Vec<u32>> = store.get_as("counts").await.unwrap();
    assert_eq!(counts, Some(vec![1, 2, 3]));

    let missing: Option<String> = store.get_as("missing").await.unwrap();
    assert!(missing.is_none());

    let wrong: Result<Option<String>, Error> = store.get_as("counts").await;
    assert!(matches!(wrong, Err(Error::Session { .. })));
}

#[tokio::test]
async fn test_clones_share_session() {
    let store = SessionStore::in_memory();
    let other = store.clone();

    other.set("k", "v").await.unwrap();
    assert_eq!(store.get("k").await, Some(json!("v")));

    store.clear().await.unwrap();
    assert!(other.keys().await.is_empty());
}

#[tokio::test]
async fn test_commit_if_current() {
    let store = SessionStore::in_memory();
    store.set("drop_me", true).await.unwrap();

    let generation = store.begin_render().await;
    let committed = store
        .commit_if_current(
            generation,
            vec![
                ("selected_bucket".to_string(), Some(json!("b1"))),
                ("drop_me".to_string(), None),
            ],
        )
        .await
        .unwrap();

    assert!(committed);
    assert_eq!(store.get("selected_bucket").await, Some(json!("b1")));
    assert!(!store.contains("drop_me").await);
}

#[tokio::test]
async fn test_stale_render_cannot_commit() {
    let store = SessionStore::in_memory();

    let stale = store.begin_render().await;
    let fresh = store.begin_render().await;
    assert!(fresh > stale);

    let committed = store
        .commit_if_current(stale, vec![("selected_bucket".to_string(), Some(json!("old")))])
        .await
        .unwrap();
    assert!(!committed);
    assert!(store.get("selected_bucket").await.is_none());

    assert!(store
        .commit_if_current(fresh, vec![("selected_bucket".to_string(), Some(json!("new")))])
        .await
        .unwrap());
    assert_eq!(store.generation().await, fresh);
}

#[tokio::test]
async fn test_file_backed_session_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");

    let store = SessionStore::from_file(&path).unwrap();
    assert!(!store.is_in_memory());
    store.set("selected_bucket", "in.c-main").await.unwrap();
    let generation = store.begin_render().await;
    store.save().await.unwrap();

    let reopened = SessionStore::from_file(&path).unwrap();
    assert_eq!(reopened.get("selected_bucket").await, Some(json!("in.c-main")));
    assert_eq!(reopened.generation().await, generation);
}

#[test]
fn test_file_backed_session_rejects_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(matches!(
        SessionStore::from_file(&path),
        Err(Error::Session { .. })
    ));
}

// ============================================================================
// Secrets Tests
// ============================================================================

#[test]
fn test_secrets_from_yaml_flattens() {
    let secrets = Secrets::from_yaml_str(
        r"
kbc_url: https://connection.keboola.com
kbc_token: 123-abc
warehouse:
  database: /tmp/wh.duckdb
  read_only: true
",
    )
    .unwrap();

    assert_eq!(
        secrets.secret("kbc_url").as_deref(),
        Some("https://connection.keboola.com")
    );
    assert_eq!(secrets.secret("warehouse.database").as_deref(), Some("/tmp/wh.duckdb"));
    assert_eq!(secrets.secret("warehouse.read_only").as_deref(), Some("true"));
    assert!(secrets.secret("warehouse").is_none());
}

#[test]
fn test_secrets_require() {
    let secrets = Secrets::new().with("kbc_token", "  ");
    assert!(matches!(
        secrets.require("kbc_token"),
        Err(Error::MissingConfigField { ref field }) if field == "kbc_token"
    ));
    assert!(secrets.require("kbc_url").is_err());
}

#[test]
fn test_secrets_yaml_must_be_mapping() {
    assert!(Secrets::from_yaml_str("- a\n- b\n").is_err());
    assert!(Secrets::from_yaml_str("").unwrap().is_empty());
}

#[test]
fn test_secrets_debug_hides_values() {
    let secrets = Secrets::new().with("kbc_token", "very-secret");
    let printed = format!("{secrets:?}");
    assert!(printed.contains("kbc_token"));
    assert!(!printed.contains("very-secret"));
}

#[test]
fn test_env_var_name() {
    assert_eq!(EnvSecrets::var_name("kbc_url"), "KBC_URL");
    assert_eq!(EnvSecrets::var_name("warehouse.database"), "WAREHOUSE_DATABASE");
}

#[test]
fn test_layered_secrets_precedence() {
    let layered = LayeredSecrets::new()
        .layer(Secrets::new().with("kbc_url", "https://first"))
        .layer(
            Secrets::new()
                .with("kbc_url", "https://second")
                .with("kbc_token", "t"),
        );

    assert_eq!(layered.secret("kbc_url").as_deref(), Some("https://first"));
    assert_eq!(layered.secret("kbc_token").as_deref(), Some("t"));
    assert!(layered.secret("missing").is_none());
}
