use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use polars::prelude::*;
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::query_builder::Separated;
use sqlx::{Connection, Postgres, QueryBuilder};
use tracing::debug;

use crate::config::{SslMode, WarehouseConfig, WarehouseFlavour};
use crate::error::{EtlError, Result};

/// Postgres rejects statements with more bind parameters than this.
pub const MAX_BIND_PARAMETERS: usize = 32_767;

const REDSHIFT_TEXT: &str = "VARCHAR(65535)";
const POSTGRES_TEXT: &str = "TEXT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseTable {
    Arrivals,
    Immigrants,
    PersonalDemographics,
    CitiesTemperature,
    CitiesDemographics,
}

impl WarehouseTable {
    /// Every destination table, in write order.
    pub const ALL: [WarehouseTable; 5] = [
        WarehouseTable::Arrivals,
        WarehouseTable::Immigrants,
        WarehouseTable::PersonalDemographics,
        WarehouseTable::CitiesTemperature,
        WarehouseTable::CitiesDemographics,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WarehouseTable::Arrivals => "arrivals",
            WarehouseTable::Immigrants => "immigrants",
            WarehouseTable::PersonalDemographics => "personal_demographics",
            WarehouseTable::CitiesTemperature => "cities_temperature",
            WarehouseTable::CitiesDemographics => "cities_demographics",
        }
    }
}

impl fmt::Display for WarehouseTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Destination for derived tables.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Replaces the full contents of `table` with `frame`, returning the
    /// number of rows written.
    async fn replace_table(&self, table: WarehouseTable, frame: &DataFrame) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    Integer,
    BigInt,
    Double,
    Text,
}

impl SqlType {
    pub fn for_dtype(table: WarehouseTable, column: &str, dtype: &DataType) -> Result<Self> {
        match dtype {
            DataType::Boolean => Ok(SqlType::Boolean),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::UInt8
            | DataType::UInt16 => Ok(SqlType::Integer),
            DataType::Int64 | DataType::UInt32 | DataType::UInt64 => Ok(SqlType::BigInt),
            DataType::Float32 | DataType::Float64 => Ok(SqlType::Double),
            nested if nested.is_nested() => Err(EtlError::Warehouse {
                table,
                message: format!("column {column} has nested type {nested} and cannot be stored"),
            }),
            _ => Ok(SqlType::Text),
        }
    }

    pub fn ddl(&self, flavour: WarehouseFlavour) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Text => match flavour {
                WarehouseFlavour::Redshift => REDSHIFT_TEXT,
                WarehouseFlavour::Postgres => POSTGRES_TEXT,
            },
        }
    }

    fn storage_dtype(&self) -> DataType {
        match self {
            SqlType::Boolean => DataType::Boolean,
            SqlType::Integer => DataType::Int32,
            SqlType::BigInt => DataType::Int64,
            SqlType::Double => DataType::Float64,
            SqlType::Text => DataType::String,
        }
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column types for `frame`, in frame order. Fails on nested columns and on
/// frames without columns.
pub fn table_schema(table: WarehouseTable, frame: &DataFrame) -> Result<Vec<(String, SqlType)>> {
    if frame.width() == 0 {
        return Err(EtlError::Warehouse {
            table,
            message: "frame has no columns".into(),
        });
    }
    frame
        .get_columns()
        .iter()
        .map(|column| {
            let sql_type = SqlType::for_dtype(table, column.name(), column.dtype())?;
            Ok((column.name().to_string(), sql_type))
        })
        .collect()
}

pub fn create_table_sql(
    table: WarehouseTable,
    frame: &DataFrame,
    flavour: WarehouseFlavour,
) -> Result<String> {
    let columns = table_schema(table, frame)?
        .iter()
        .map(|(name, sql_type)| format!("{} {}", quote_identifier(name), sql_type.ddl(flavour)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "CREATE TABLE {} ({columns})",
        quote_identifier(table.name())
    ))
}

/// Rows per INSERT: at most `batch_rows`, and never more bind parameters than
/// the protocol allows.
pub fn rows_per_statement(batch_rows: usize, column_count: usize) -> usize {
    let by_parameters = MAX_BIND_PARAMETERS / column_count.max(1);
    batch_rows.min(by_parameters).max(1)
}

/// One frame column cast to the type it is stored as.
enum BoundColumn {
    Boolean(BooleanChunked),
    Integer(Int32Chunked),
    BigInt(Int64Chunked),
    Double(Float64Chunked),
    Text(StringChunked),
}

impl BoundColumn {
    fn new(column: &Column, sql_type: SqlType) -> Result<Self> {
        let cast = column
            .as_materialized_series()
            .cast(&sql_type.storage_dtype())?
            .rechunk();
        Ok(match sql_type {
            SqlType::Boolean => BoundColumn::Boolean(cast.bool()?.clone()),
            SqlType::Integer => BoundColumn::Integer(cast.i32()?.clone()),
            SqlType::BigInt => BoundColumn::BigInt(cast.i64()?.clone()),
            SqlType::Double => BoundColumn::Double(cast.f64()?.clone()),
            SqlType::Text => BoundColumn::Text(cast.str()?.clone()),
        })
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>, idx: usize) {
        match self {
            BoundColumn::Boolean(values) => row.push_bind(values.get(idx)),
            BoundColumn::Integer(values) => row.push_bind(values.get(idx)),
            BoundColumn::BigInt(values) => row.push_bind(values.get(idx)),
            BoundColumn::Double(values) => row.push_bind(values.get(idx)),
            BoundColumn::Text(values) => row.push_bind(values.get(idx).map(str::to_owned)),
        };
    }
}

/// Postgres-protocol warehouse (Redshift or Postgres). A connection is opened
/// for each table write.
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    options: PgConnectOptions,
    flavour: WarehouseFlavour,
    batch_rows: usize,
    connect_timeout: Duration,
}

impl PgWarehouse {
    pub fn from_config(config: &WarehouseConfig) -> Result<Self> {
        let missing = |field: &str| EtlError::Config(format!("warehouse.{field} is not set"));
        let host = config.host.as_deref().ok_or_else(|| missing("host"))?;
        let user = config.user.as_deref().ok_or_else(|| missing("user"))?;
        let password = config.password.as_deref().ok_or_else(|| missing("password"))?;

        let ssl_mode = match config.ssl_mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        };
        let options = PgConnectOptions::new()
            .host(host)
            .port(config.port)
            .database(&config.database)
            .username(user)
            .password(password)
            .ssl_mode(ssl_mode);

        Ok(Self {
            options,
            flavour: config.flavour,
            batch_rows: config.batch_rows.max(1),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        })
    }

    /// Connects with a `postgres://` URL.
    pub fn from_url(url: &str, flavour: WarehouseFlavour, batch_rows: usize) -> Result<Self> {
        Ok(Self {
            options: url.parse()?,
            flavour,
            batch_rows: batch_rows.max(1),
            connect_timeout: Duration::from_secs(30),
        })
    }

    async fn connect(&self, table: WarehouseTable) -> Result<PgConnection> {
        tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| EtlError::Warehouse {
                table,
                message: format!(
                    "connection not established within {}s",
                    self.connect_timeout.as_secs()
                ),
            })?
            .map_err(EtlError::from)
    }
}

#[async_trait]
impl TableSink for PgWarehouse {
    async fn replace_table(&self, table: WarehouseTable, frame: &DataFrame) -> Result<u64> {
        let schema = table_schema(table, frame)?;
        let create_sql = create_table_sql(table, frame, self.flavour)?;
        let columns = frame
            .get_columns()
            .iter()
            .zip(&schema)
            .map(|(column, (_, sql_type))| BoundColumn::new(column, *sql_type))
            .collect::<Result<Vec<_>>>()?;

        let insert_prefix = format!(
            "INSERT INTO {} ({}) ",
            quote_identifier(table.name()),
            schema
                .iter()
                .map(|(name, _)| quote_identifier(name))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let chunk_rows = rows_per_statement(self.batch_rows, columns.len());

        let mut conn = self.connect(table).await?;
        let mut tx = conn.begin().await?;

        sqlx::query(&format!(
            "DROP TABLE IF EXISTS {}",
            quote_identifier(table.name())
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&create_sql).execute(&mut *tx).await?;

        let height = frame.height();
        let mut written = 0u64;
        for start in (0..height).step_by(chunk_rows) {
            let end = (start + chunk_rows).min(height);
            let mut builder = QueryBuilder::<Postgres>::new(&insert_prefix);
            builder.push_values(start..end, |mut row, idx| {
                for column in &columns {
                    column.bind(&mut row, idx);
                }
            });
            let result = builder.build().execute(&mut *tx).await?;
            written += result.rows_affected();
            debug!(table = table.name(), rows = end - start, "inserted batch");
        }

        tx.commit().await?;
        conn.close().await?;
        Ok(written)
    }
}
