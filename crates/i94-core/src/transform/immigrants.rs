use polars::prelude::*;

use super::{columns, log_derivation, sorted_by, RECORD_ID};
use crate::error::Result;
use crate::reference::{CountryViews, CITIZENSHIP_COUNTRY, COUNTRY_CODE, RESIDENCY_COUNTRY};
use crate::sources::{require_columns, ARRIVALS, COUNTRY_CODES};

const IMMIGRANTS_INPUT: [&str; 7] = [
    "cicid", "i94cit", "i94res", "i94visa", "visapost", "dtaddto", "visatype",
];

pub const IMMIGRANTS_COLUMNS: [&str; 6] = [
    "cicid", "i94visa", "dtaddto", "visatype", "cit_country", "res_country",
];

const CITIZENSHIP_KEY: &str = "i94cit_code";
const RESIDENCY_KEY: &str = "i94res_code";

/// Both sides of a country join are compared as doubles, so `"582"`, `"582.0"`
/// and `" 582"` all match `582.0`. Codes that do not parse become null and never
/// match.
fn country_view(view: &DataFrame, name_column: &str) -> Result<LazyFrame> {
    require_columns(COUNTRY_CODES, view, &[COUNTRY_CODE, name_column])?;
    Ok(view.clone().lazy().select([
        col(COUNTRY_CODE)
            .str()
            .strip_chars(lit(NULL))
            .cast(DataType::Float64),
        col(name_column),
    ]))
}

/// Immigrants dimension: each record joined to its citizenship and
/// residency country names.
pub fn derive_immigrants(raw: &DataFrame, countries: &CountryViews) -> Result<DataFrame> {
    require_columns(ARRIVALS, raw, &IMMIGRANTS_INPUT)?;

    let citizenship = country_view(&countries.citizenship, CITIZENSHIP_COUNTRY)?;
    let residency = country_view(&countries.residency, RESIDENCY_COUNTRY)?;

    let joined = raw
        .clone()
        .lazy()
        .select(columns(&IMMIGRANTS_INPUT))
        .with_columns([
            col("i94cit").cast(DataType::Float64).alias(CITIZENSHIP_KEY),
            col("i94res").cast(DataType::Float64).alias(RESIDENCY_KEY),
        ])
        .join(
            citizenship,
            [col(CITIZENSHIP_KEY)],
            [col(COUNTRY_CODE)],
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            residency,
            [col(RESIDENCY_KEY)],
            [col(COUNTRY_CODE)],
            JoinArgs::new(JoinType::Inner),
        )
        .select(columns(&IMMIGRANTS_COLUMNS));

    let immigrants = sorted_by(joined, &[RECORD_ID]).collect()?;
    log_derivation("immigrants", raw.height(), &immigrants);
    Ok(immigrants)
}
