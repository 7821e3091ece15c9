use chrono::{DateTime, Utc};
use i94_bucket::{open_store, BucketStore};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{EtlConfig, RunConfig};
use crate::error::{EtlError, Result, TableFailure};
use crate::quality::canonicalize_arrival_city_names;
use crate::reference::split_country_views;
use crate::sources::{load_sources, SourceTables};
use crate::transform::{
    derive_arrivals, derive_city_demographics, derive_city_temperatures, derive_immigrants,
    derive_personal_demographics,
};
use crate::warehouse::{PgWarehouse, TableSink, WarehouseTable};

/// The five tables produced by one run.
#[derive(Debug, Clone)]
pub struct DerivedTables {
    pub arrivals: DataFrame,
    pub immigrants: DataFrame,
    pub personal_demographics: DataFrame,
    pub cities_temperature: DataFrame,
    pub cities_demographics: DataFrame,
}

impl DerivedTables {
    pub fn get(&self, table: WarehouseTable) -> &DataFrame {
        match table {
            WarehouseTable::Arrivals => &self.arrivals,
            WarehouseTable::Immigrants => &self.immigrants,
            WarehouseTable::PersonalDemographics => &self.personal_demographics,
            WarehouseTable::CitiesTemperature => &self.cities_temperature,
            WarehouseTable::CitiesDemographics => &self.cities_demographics,
        }
    }

    /// Tables in write order.
    pub fn iter(&self) -> impl Iterator<Item = (WarehouseTable, &DataFrame)> + '_ {
        WarehouseTable::ALL
            .into_iter()
            .map(move |table| (table, self.get(table)))
    }
}

/// Runs every derivation over the raw sources. Arrivals are capped to
/// `settings.arrivals_row_cap` rows before any join.
pub fn derive_tables(sources: &SourceTables, settings: &RunConfig) -> Result<DerivedTables> {
    let raw_arrivals = if sources.arrivals.height() > settings.arrivals_row_cap {
        sources.arrivals.head(Some(settings.arrivals_row_cap))
    } else {
        sources.arrivals.clone()
    };

    let countries = split_country_views(&sources.country_codes)?;
    let arrivals = derive_arrivals(&raw_arrivals, &sources.port_codes)?;

    Ok(DerivedTables {
        arrivals: canonicalize_arrival_city_names(&arrivals)?,
        immigrants: derive_immigrants(&raw_arrivals, &countries)?,
        personal_demographics: derive_personal_demographics(&raw_arrivals)?,
        cities_temperature: derive_city_temperatures(
            &sources.city_temperatures,
            &settings.temperature_country,
        )?,
        cities_demographics: derive_city_demographics(&sources.city_demographics)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Written,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableWrite {
    pub table: WarehouseTable,
    pub rows: usize,
    pub columns: usize,
    pub status: WriteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteReport {
    pub tables: Vec<TableWrite>,
}

impl WriteReport {
    pub fn failures(&self) -> Vec<TableFailure> {
        self.tables
            .iter()
            .filter(|write| write.status == WriteStatus::Failed)
            .map(|write| TableFailure {
                table: write.table,
                message: write.error.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// Writes every table. A failed write is logged and recorded; the
/// remaining tables are still written.
pub async fn write_tables(sink: &dyn TableSink, tables: &DerivedTables) -> WriteReport {
    let mut report = WriteReport::default();

    for (table, frame) in tables.iter() {
        info!(table = table.name(), rows = frame.height(), "writing table");
        let outcome = sink.replace_table(table, frame).await;

        let (status, error) = match outcome {
            Ok(written) => {
                info!(table = table.name(), rows = written, "table written");
                (WriteStatus::Written, None)
            }
            Err(err) => {
                error!(table = table.name(), error = %err, "table write failed");
                (WriteStatus::Failed, Some(err.to_string()))
            }
        };

        report.tables.push(TableWrite {
            table,
            rows: frame.height(),
            columns: frame.width(),
            status,
            error,
        });
    }

    report
}

fn skipped(tables: &DerivedTables) -> WriteReport {
    WriteReport {
        tables: tables
            .iter()
            .map(|(table, frame)| TableWrite {
                table,
                rows: frame.height(),
                columns: frame.width(),
                status: WriteStatus::Skipped,
                error: None,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Derive every table but leave the warehouse untouched.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub storage_root: String,
    pub tables: Vec<TableWrite>,
}

impl RunSummary {
    /// Fails with every table whose write did not complete.
    pub fn ensure_success(&self) -> Result<()> {
        let report = WriteReport {
            tables: self.tables.clone(),
        };
        let failures = report.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EtlError::WriteFailures(failures))
        }
    }
}

/// Runs the job against the configured storage root and warehouse.
pub async fn run(config: &EtlConfig, options: RunOptions) -> Result<RunSummary> {
    config.validate()?;
    let warehouse = if options.dry_run {
        None
    } else {
        Some(PgWarehouse::from_config(&config.warehouse)?)
    };

    let root = config.storage_root()?;
    let store = open_store(&root, config.s3_config()).await?;
    let sink = warehouse.as_ref().map(|warehouse| warehouse as &dyn TableSink);

    run_with(store.as_ref(), sink, config, &root.to_string()).await
}

/// Runs the job against explicit storage and sink. Without a sink the run is
/// a dry run.
pub async fn run_with(
    store: &dyn BucketStore,
    sink: Option<&dyn TableSink>,
    config: &EtlConfig,
    storage_root: &str,
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let span = info_span!("etl_run", run_id = %run_id, dry_run = sink.is_none());

    async move {
        info!(storage_root, "starting run");
        let sources = load_sources(store, config).await?;
        let derived = derive_tables(&sources, &config.run)?;

        let report = match sink {
            Some(sink) => write_tables(sink, &derived).await,
            None => {
                info!("dry run, warehouse writes skipped");
                skipped(&derived)
            }
        };

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: sink.is_none(),
            storage_root: storage_root.to_string(),
            tables: report.tables,
        };
        let failed_tables = summary
            .tables
            .iter()
            .filter(|write| write.status == WriteStatus::Failed)
            .count();
        info!(failed_tables, "run finished");
        Ok(summary)
    }
    .instrument(span)
    .await
}
