use polars::prelude::*;

use super::log_derivation;
use crate::error::{EtlError, Result};
use crate::sources::{require_columns, CITY_DEMOGRAPHICS};

const ENVELOPE: &str = "fields";
const CITY: &str = "city";

/// Lifts the `fields` struct of each record to top-level columns and
/// upper-cases `city`.
pub fn derive_city_demographics(raw: &DataFrame) -> Result<DataFrame> {
    require_columns(CITY_DEMOGRAPHICS, raw, &[ENVELOPE])?;
    if !matches!(raw.column(ENVELOPE)?.dtype(), DataType::Struct(_)) {
        return Err(EtlError::dataset(
            CITY_DEMOGRAPHICS,
            format!("column {ENVELOPE} is not a record"),
        ));
    }

    let unwrapped = raw.select([ENVELOPE])?.unnest([ENVELOPE])?;
    require_columns(CITY_DEMOGRAPHICS, &unwrapped, &[CITY])?;

    let demographics = unwrapped
        .lazy()
        .with_column(col(CITY).str().to_uppercase())
        .collect()?;

    log_derivation("cities_demographics", raw.height(), &demographics);
    Ok(demographics)
}
