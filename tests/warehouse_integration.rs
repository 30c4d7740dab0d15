//! Warehouse integration tests with a file-backed DuckDB database

use kbc_app_kit::frame::ParquetOptions;
use kbc_app_kit::warehouse::{WarehouseConfig, WarehouseSession};
use kbc_app_kit::{TableFrame, WriteMode};
use serde_json::json;
use tempfile::TempDir;

fn sales() -> TableFrame {
    TableFrame::from_csv(
        b"day,region,amount\n2024-03-01,north,10\n2024-03-01,south,4\n2024-03-02,north,6\n",
    )
    .unwrap()
}

#[test]
fn test_database_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = WarehouseConfig::new(tmp.path().join("app.duckdb").to_string_lossy())
        .with_schema("analytics");

    {
        let session = WarehouseSession::create_session(&config).unwrap();
        session
            .write_table(&sales(), "sales", WriteMode::Overwrite)
            .unwrap();
        session
            .write_table(&sales(), "sales", WriteMode::Incremental)
            .unwrap();
    }

    let session = WarehouseSession::create_session(&config.clone().read_only(true)).unwrap();
    assert_eq!(session.list_tables().unwrap(), vec!["analytics.sales"]);

    let totals = session
        .execute_query(
            "SELECT region, CAST(sum(amount) AS BIGINT) AS total FROM analytics.sales GROUP BY region ORDER BY region",
            true,
        )
        .unwrap();
    assert_eq!(
        totals.to_records().unwrap(),
        vec![
            json!({"region": "north", "total": 32}),
            json!({"region": "south", "total": 8}),
        ]
    );
}

#[test]
fn test_parquet_export_is_readable_by_warehouse() {
    let tmp = TempDir::new().unwrap();
    let parquet_path = tmp.path().join("sales.parquet");

    let written = sales()
        .write_parquet(&parquet_path, &ParquetOptions::default())
        .unwrap();
    assert_eq!(written, 3);

    let session = WarehouseSession::create_session(&WarehouseConfig::default()).unwrap();
    let frame = session
        .execute_query(
            &format!(
                "SELECT count(*) AS days FROM read_parquet('{}') WHERE region = 'north'",
                parquet_path.display()
            ),
            true,
        )
        .unwrap();

    assert_eq!(frame.to_records().unwrap(), vec![json!({"days": 2})]);
}

#[test]
fn test_dates_round_trip() {
    let session = WarehouseSession::create_session(&WarehouseConfig::default()).unwrap();
    session
        .write_table(&sales(), "sales", WriteMode::Overwrite)
        .unwrap();

    let frame = session
        .execute_query("SELECT max(day) AS last_day FROM sales", true)
        .unwrap();
    assert_eq!(frame.to_records().unwrap(), vec![json!({"last_day": "2024-03-02"})]);
}
