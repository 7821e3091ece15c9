mod common;

use anyhow::Result;
use i94_core::config::{RunConfig, WarehouseFlavour};
use i94_core::pipeline::{derive_tables, write_tables, WriteStatus};
use i94_core::warehouse::{
    create_table_sql, quote_identifier, rows_per_statement, table_schema, PgWarehouse, SqlType,
    TableSink, WarehouseTable, MAX_BIND_PARAMETERS,
};
use i94_core::EtlError;
use polars::prelude::*;
use sqlx::{Connection, PgConnection, Row};

fn mixed_frame() -> DataFrame {
    df!(
        "flag" => [true, false],
        "small" => [1i32, 2],
        "big" => [10i64, 20],
        "unsigned" => [1u32, 2],
        "ratio" => [0.5f64, 1.5],
        "label" => ["a", "b"]
    )
    .expect("mixed frame")
}

#[test]
fn table_names_match_destinations() {
    let names: Vec<&str> = WarehouseTable::ALL.iter().map(|table| table.name()).collect();
    assert_eq!(
        names,
        [
            "arrivals",
            "immigrants",
            "personal_demographics",
            "cities_temperature",
            "cities_demographics"
        ]
    );
}

#[test]
fn dtypes_map_to_sql_types() -> Result<()> {
    let schema = table_schema(WarehouseTable::Arrivals, &mixed_frame())?;
    let types: Vec<SqlType> = schema.iter().map(|(_, sql_type)| *sql_type).collect();
    assert_eq!(
        types,
        [
            SqlType::Boolean,
            SqlType::Integer,
            SqlType::BigInt,
            SqlType::BigInt,
            SqlType::Double,
            SqlType::Text
        ]
    );
    Ok(())
}

#[test]
fn create_table_sql_depends_on_flavour() -> Result<()> {
    let frame = mixed_frame();
    let redshift = create_table_sql(WarehouseTable::Arrivals, &frame, WarehouseFlavour::Redshift)?;
    assert_eq!(
        redshift,
        "CREATE TABLE \"arrivals\" (\"flag\" BOOLEAN, \"small\" INTEGER, \"big\" BIGINT, \
         \"unsigned\" BIGINT, \"ratio\" DOUBLE PRECISION, \"label\" VARCHAR(65535))"
    );

    let postgres = create_table_sql(WarehouseTable::Arrivals, &frame, WarehouseFlavour::Postgres)?;
    assert!(postgres.ends_with("\"label\" TEXT)"));
    Ok(())
}

#[test]
fn nested_columns_are_rejected() -> Result<()> {
    let demographics = common::city_demographics();
    let err = table_schema(WarehouseTable::CitiesDemographics, &demographics).unwrap_err();
    assert!(
        matches!(err, EtlError::Warehouse { table: WarehouseTable::CitiesDemographics, .. }),
        "got {err:?}"
    );

    let empty = DataFrame::empty();
    assert!(table_schema(WarehouseTable::Arrivals, &empty).is_err());
    Ok(())
}

#[test]
fn identifiers_are_quoted() {
    assert_eq!(quote_identifier("cicid"), "\"cicid\"");
    assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
}

#[test]
fn statements_respect_bind_limit() {
    assert_eq!(rows_per_statement(500, 7), 500);
    assert_eq!(rows_per_statement(50_000, 7), MAX_BIND_PARAMETERS / 7);
    assert_eq!(rows_per_statement(0, 3), 1);
    assert!(rows_per_statement(10_000, 12) * 12 <= MAX_BIND_PARAMETERS);
}

#[test]
fn incomplete_warehouse_config_is_rejected() {
    let config = i94_core::config::WarehouseConfig::default();
    let err = PgWarehouse::from_config(&config).unwrap_err();
    assert!(matches!(err, EtlError::Config(_)), "got {err:?}");
}

/// Runs against a real Postgres when `I94_TEST_DATABASE_URL` is set.
#[tokio::test]
async fn replaces_tables_in_live_postgres() -> Result<()> {
    let Ok(url) = std::env::var("I94_TEST_DATABASE_URL") else {
        eprintln!("skipping live warehouse test: I94_TEST_DATABASE_URL not set");
        return Ok(());
    };

    let warehouse = PgWarehouse::from_url(&url, WarehouseFlavour::Postgres, 2)?;
    let tables = derive_tables(&common::sources(), &RunConfig::default())?;

    // Twice, so the second run has to drop what the first created.
    for _ in 0..2 {
        let report = write_tables(&warehouse, &tables).await;
        assert!(
            report.tables.iter().all(|write| write.status == WriteStatus::Written),
            "{report:?}"
        );
    }

    let mut conn = PgConnection::connect(&url).await?;
    let row = sqlx::query("SELECT COUNT(*) AS n, MIN(cityname) AS first FROM arrivals")
        .fetch_one(&mut conn)
        .await?;
    let count: i64 = row.try_get("n")?;
    assert_eq!(count, tables.arrivals.height() as i64);
    let first: String = row.try_get("first")?;
    assert_eq!(first, "BOSTON");

    let row = sqlx::query("SELECT \"MinTemperature\" AS min FROM cities_temperature")
        .fetch_one(&mut conn)
        .await?;
    let min: i32 = row.try_get("min")?;
    assert_eq!(min, 5);

    let written = warehouse
        .replace_table(WarehouseTable::PersonalDemographics, &tables.personal_demographics)
        .await?;
    assert_eq!(written, tables.personal_demographics.height() as u64);

    conn.close().await?;
    Ok(())
}
