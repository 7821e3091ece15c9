//! I94 immigration star-schema ETL.
//!
//! Reads the raw I94 arrivals (SAS7BDAT) and four reference datasets from a
//! storage root, derives one fact and four dimension tables with polars, and
//! replaces those tables in a Postgres-protocol warehouse.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod reference;
pub mod sources;
pub mod transform;
pub mod warehouse;

pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use pipeline::{
    derive_tables, run, run_with, write_tables, DerivedTables, RunOptions, RunSummary,
};
pub use warehouse::{PgWarehouse, TableSink, WarehouseTable};
