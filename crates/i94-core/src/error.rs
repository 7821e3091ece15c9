use thiserror::Error;

use crate::warehouse::WarehouseTable;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("SAS7BDAT decoding failed: {0}")]
    Parser(#[from] i94_parser::ParserError),

    #[error("storage access failed: {0}")]
    Bucket(#[from] i94_bucket::BucketError),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("dataset {dataset}: {message}")]
    Source { dataset: String, message: String },

    #[error("table {table}: {message}")]
    Warehouse {
        table: WarehouseTable,
        message: String,
    },

    #[error("{} table write(s) failed: {}", .0.len(), describe_failures(.0))]
    WriteFailures(Vec<TableFailure>),
}

/// One table write that did not complete.
#[derive(Debug, Clone)]
pub struct TableFailure {
    pub table: WarehouseTable,
    pub message: String,
}

fn describe_failures(failures: &[TableFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{} ({})", failure.table, failure.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl EtlError {
    pub fn dataset(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            dataset: dataset.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
