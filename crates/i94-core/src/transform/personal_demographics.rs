use polars::prelude::*;

use super::{columns, log_derivation, sorted_by, RECORD_ID};
use crate::error::Result;
use crate::sources::{require_columns, ARRIVALS};

pub const PERSONAL_DEMOGRAPHICS_COLUMNS: [&str; 3] = ["cicid", "biryear", "gender"];

pub fn derive_personal_demographics(raw: &DataFrame) -> Result<DataFrame> {
    require_columns(ARRIVALS, raw, &PERSONAL_DEMOGRAPHICS_COLUMNS)?;

    let projected = raw
        .clone()
        .lazy()
        .select(columns(&PERSONAL_DEMOGRAPHICS_COLUMNS));
    let demographics = sorted_by(projected, &[RECORD_ID]).collect()?;

    log_derivation("personal_demographics", raw.height(), &demographics);
    Ok(demographics)
}
