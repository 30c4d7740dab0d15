//! Tests for the DuckDB warehouse session

use super::*;
use crate::frame::{ColumnType, TableFrame};
use crate::types::WriteMode;
use pretty_assertions::assert_eq;
use serde_json::json;

fn orders() -> TableFrame {
    TableFrame::from_csv(b"id,customer,amount\n1,ada,10.5\n2,bob,3\n").unwrap()
}

fn memory() -> WarehouseSession {
    WarehouseSession::create_session(&WarehouseConfig::default()).unwrap()
}

#[test]
fn test_config_defaults() {
    let config: WarehouseConfig = serde_yaml::from_str("read_only: false").unwrap();
    assert_eq!(config.database, IN_MEMORY);
    assert!(config.is_in_memory());
    assert!(config.schema.is_none());

    assert!(!WarehouseConfig::new("/data/app.duckdb").is_in_memory());
}

#[test]
fn test_write_then_read_table() {
    let session = memory();

    let rows = session
        .write_table(&orders(), "orders", WriteMode::Overwrite)
        .unwrap();
    assert_eq!(rows, 2);

    let frame = session.read_table("orders").unwrap();
    assert_eq!(frame.column_names(), vec!["id", "customer", "amount"]);
    assert_eq!(frame.num_rows(), 2);
    assert_eq!(frame.columns()[0].column_type, ColumnType::Integer);
    assert_eq!(frame.columns()[2].column_type, ColumnType::Float);
}

#[test]
fn test_overwrite_replaces_and_incremental_appends() {
    let session = memory();
    session
        .write_table(&orders(), "orders", WriteMode::Overwrite)
        .unwrap();
    session
        .write_table(&orders(), "orders", WriteMode::Incremental)
        .unwrap();
    assert_eq!(session.read_table("orders").unwrap().num_rows(), 4);

    session
        .write_table(&orders(), "orders", WriteMode::Overwrite)
        .unwrap();
    assert_eq!(session.read_table("orders").unwrap().num_rows(), 2);
}

#[test]
fn test_incremental_creates_missing_table() {
    let session = memory();
    session
        .write_table(&orders(), "fresh", WriteMode::Incremental)
        .unwrap();
    assert_eq!(session.read_table("fresh").unwrap().num_rows(), 2);
}

#[test]
fn test_execute_query_return_df() {
    let session = memory();
    session
        .write_table(&orders(), "orders", WriteMode::Overwrite)
        .unwrap();

    let frame = session
        .execute_query("SELECT customer FROM orders WHERE amount > 5", true)
        .unwrap();
    assert_eq!(frame.to_records().unwrap(), vec![json!({"customer": "ada"})]);

    let frame = session
        .execute_query("DELETE FROM orders WHERE id = 2", false)
        .unwrap();
    assert!(frame.is_empty());
    assert_eq!(frame.num_columns(), 0);
    assert_eq!(session.read_table("orders").unwrap().num_rows(), 1);
}

#[test]
fn test_empty_result_keeps_columns() {
    let session = memory();
    session
        .write_table(&orders(), "orders", WriteMode::Overwrite)
        .unwrap();

    let frame = session
        .execute_query("SELECT id FROM orders WHERE id > 100", true)
        .unwrap();
    assert_eq!(frame.column_names(), vec!["id"]);
    assert_eq!(frame.num_rows(), 0);
}

#[test]
fn test_schema_qualified_names() {
    let session = WarehouseSession::create_session(
        &WarehouseConfig::default().with_schema("analytics"),
    )
    .unwrap();

    session
        .write_table(&orders(), "orders", WriteMode::Overwrite)
        .unwrap();
    session
        .write_table(&orders(), "main.raw_orders", WriteMode::Overwrite)
        .unwrap();

    assert_eq!(
        session.list_tables().unwrap(),
        vec!["analytics.orders", "main.raw_orders"]
    );
    assert_eq!(session.read_table("analytics.orders").unwrap().num_rows(), 2);
}

#[test]
fn test_null_and_nested_columns_become_text() {
    let frame = TableFrame::from_records(&[
        json!({"id": 1, "note": null, "tags": ["a", "b"]}),
        json!({"id": 2, "note": null, "tags": []}),
    ])
    .unwrap();
    let session = memory();

    session
        .write_table(&frame, "notes", WriteMode::Overwrite)
        .unwrap();

    let back = session.read_table("notes").unwrap();
    assert_eq!(back.columns()[1].column_type, ColumnType::String);
    assert_eq!(back.to_records().unwrap()[0]["note"], json!(null));
}

#[test]
fn test_quoted_identifiers() {
    let frame = TableFrame::from_csv(b"\"order id\",\"select\"\n1,x\n").unwrap();
    let session = memory();

    session
        .write_table(&frame, "my table", WriteMode::Overwrite)
        .unwrap();

    let back = session.read_table("my table").unwrap();
    assert_eq!(back.column_names(), vec!["order id", "select"]);
}

#[test]
fn test_write_empty_frame_fails() {
    let err = memory()
        .write_table(&TableFrame::empty(), "orders", WriteMode::Overwrite)
        .unwrap_err();
    assert!(matches!(err, crate::error::Error::Frame { .. }));
}

#[test]
fn test_missing_table_is_warehouse_error() {
    let err = memory().read_table("nope").unwrap_err();
    assert!(matches!(err, crate::error::Error::Warehouse(_)));
}

#[test]
fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.duckdb");
    let config = WarehouseConfig::new(path.to_string_lossy());

    {
        let session = WarehouseSession::create_session(&config).unwrap();
        session
            .write_table(&orders(), "orders", WriteMode::Overwrite)
            .unwrap();
    }

    let session = WarehouseSession::create_session(&config.read_only(true)).unwrap();
    assert_eq!(session.read_table("orders").unwrap().num_rows(), 2);
    assert!(session
        .execute_query("DROP TABLE orders", false)
        .is_err());
}

#[test]
fn test_frames_share_duckdb_arrow_types() {
    // Fails to compile if duckdb and the crate resolve different arrow versions
    let batch: duckdb::arrow::record_batch::RecordBatch = orders().into_batch();
    let frame = TableFrame::new(batch);
    assert_eq!(frame.num_rows(), 2);
}

#[test]
fn test_query_result_feeds_back_into_writes() {
    let session = memory();
    session
        .write_table(&orders(), "orders", WriteMode::Overwrite)
        .unwrap();

    let big = session
        .execute_query("SELECT id, amount FROM orders WHERE amount > 5", true)
        .unwrap();
    session
        .write_table(&big, "big_orders", WriteMode::Overwrite)
        .unwrap();

    assert_eq!(
        session.read_table("big_orders").unwrap().to_records().unwrap(),
        vec![json!({"id": 1, "amount": 10.5})]
    );
    assert_eq!(big.to_csv().unwrap(), b"id,amount\n1,10.5\n".to_vec());
}

#[test]
fn test_write_creates_missing_schema() {
    let session = memory();

    session
        .write_table(&orders(), "analytics.orders", WriteMode::Overwrite)
        .unwrap();
    session
        .write_table(&orders(), "staging.orders", WriteMode::Incremental)
        .unwrap();

    let totals = session
        .execute_query("SELECT count(*)::BIGINT AS n FROM analytics.orders", true)
        .unwrap();
    assert_eq!(totals.to_records().unwrap(), vec![json!({"n": 2})]);
    assert_eq!(
        session.list_tables().unwrap(),
        vec!["analytics.orders", "staging.orders"]
    );
}
