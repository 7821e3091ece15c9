use std::io::Cursor;

use i94_bucket::BucketStore;
use i94_parser::{parse_sas7bdat, ReadOptions};
use polars::prelude::*;
use tracing::info;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};

pub const ARRIVALS: &str = "arrivals";
pub const PORT_CODES: &str = "port_codes";
pub const COUNTRY_CODES: &str = "country_codes";
pub const CITY_TEMPERATURES: &str = "city_temperatures";
pub const CITY_DEMOGRAPHICS: &str = "city_demographics";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    /// Delimited text. Every column is read as a string.
    Csv { has_header: bool },
    Sas7bdat,
    /// A JSON array of records or newline-delimited records.
    Json,
}

/// One input dataset: where it lives and how to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub key: String,
    pub format: DatasetFormat,
    pub row_limit: Option<usize>,
}

/// The five raw inputs of a run.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub arrivals: DataFrame,
    pub port_codes: DataFrame,
    pub country_codes: DataFrame,
    pub city_temperatures: DataFrame,
    pub city_demographics: DataFrame,
}

pub fn dataset_specs(config: &EtlConfig) -> [DatasetSpec; 5] {
    let keys = &config.datasets;
    let csv = DatasetFormat::Csv { has_header: true };
    [
        DatasetSpec {
            name: ARRIVALS,
            key: keys.arrivals.clone(),
            format: DatasetFormat::Sas7bdat,
            row_limit: Some(config.run.arrivals_row_cap),
        },
        DatasetSpec {
            name: PORT_CODES,
            key: keys.port_codes.clone(),
            format: csv,
            row_limit: None,
        },
        DatasetSpec {
            name: COUNTRY_CODES,
            key: keys.country_codes.clone(),
            format: csv,
            row_limit: None,
        },
        DatasetSpec {
            name: CITY_TEMPERATURES,
            key: keys.city_temperatures.clone(),
            format: csv,
            row_limit: None,
        },
        DatasetSpec {
            name: CITY_DEMOGRAPHICS,
            key: keys.city_demographics.clone(),
            format: DatasetFormat::Json,
            row_limit: None,
        },
    ]
}

/// Decodes raw dataset bytes into a frame, keeping at most `row_limit` rows.
pub fn decode_source(
    bytes: &[u8],
    format: DatasetFormat,
    row_limit: Option<usize>,
) -> Result<DataFrame> {
    let df = match format {
        DatasetFormat::Csv { has_header } => CsvReadOptions::default()
            .with_has_header(has_header)
            .with_infer_schema_length(Some(0))
            .with_n_rows(row_limit)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?,
        DatasetFormat::Sas7bdat => {
            let options = ReadOptions { row_limit };
            parse_sas7bdat(bytes, &options)?.df
        }
        DatasetFormat::Json => decode_json(bytes)?,
    };

    Ok(match row_limit {
        Some(limit) if df.height() > limit => df.head(Some(limit)),
        _ => df,
    })
}

fn decode_json(bytes: &[u8]) -> Result<DataFrame> {
    let first = bytes
        .iter()
        .find(|byte| !byte.is_ascii_whitespace())
        .ok_or_else(|| PolarsError::NoData("JSON input is empty".into()))?;

    let json_format = if *first == b'[' {
        JsonFormat::Json
    } else {
        JsonFormat::JsonLines
    };

    Ok(JsonReader::new(Cursor::new(bytes))
        .with_json_format(json_format)
        .finish()?)
}

/// Fetches and decodes one dataset. Failures name the dataset and its location.
pub async fn read_source(store: &dyn BucketStore, spec: &DatasetSpec) -> Result<DataFrame> {
    let location = store.locate(&spec.key);
    let fail = |err: EtlError| EtlError::dataset(spec.name, format!("{location}: {err}"));

    let bytes = store.get_object(&spec.key).await.map_err(|err| fail(err.into()))?;
    let df = decode_source(&bytes, spec.format, spec.row_limit).map_err(fail)?;

    info!(
        dataset = spec.name,
        key = %location,
        rows = df.height(),
        columns = df.width(),
        "loaded dataset"
    );
    Ok(df)
}

/// Reads every input dataset in order. The first failure aborts the load.
pub async fn load_sources(store: &dyn BucketStore, config: &EtlConfig) -> Result<SourceTables> {
    let [arrivals, port_codes, country_codes, city_temperatures, city_demographics] =
        dataset_specs(config);
    Ok(SourceTables {
        arrivals: read_source(store, &arrivals).await?,
        port_codes: read_source(store, &port_codes).await?,
        country_codes: read_source(store, &country_codes).await?,
        city_temperatures: read_source(store, &city_temperatures).await?,
        city_demographics: read_source(store, &city_demographics).await?,
    })
}

/// Fails with a schema error naming the first of `columns` missing from `df`.
pub fn require_columns(dataset: &str, df: &DataFrame, columns: &[&str]) -> Result<()> {
    let present = |name: &str| {
        df.get_columns()
            .iter()
            .any(|column| column.name().as_str() == name)
    };
    match columns.iter().find(|name| !present(**name)) {
        Some(missing) => Err(EtlError::dataset(
            dataset,
            format!("missing required column {missing}"),
        )),
        None => Ok(()),
    }
}
