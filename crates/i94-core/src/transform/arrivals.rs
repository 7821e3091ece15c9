use polars::prelude::*;

use super::{columns, log_derivation, sorted_by, RECORD_ID};
use crate::error::Result;
use crate::sources::{require_columns, ARRIVALS, PORT_CODES};

const ARRIVALS_INPUT: [&str; 8] = [
    "cicid", "i94port", "airline", "fltno", "depdate", "arrdate", "entdepd", "entdepa",
];

pub const ARRIVALS_COLUMNS: [&str; 7] = [
    "cicid", "i94port", "airline", "depdate", "arrdate", "city", "cityname",
];

const PORT_CODE: &str = "CODE";
const PORT_CITY: &str = "city";
const CITY_NAME: &str = "cityname";

/// The part of a port city label before the first comma, untrimmed.
/// `"NEW YORK, NY"` gives `"NEW YORK"`; a label without a comma is returned whole.
pub fn leading_city_name(label: &str) -> &str {
    label.split_once(',').map_or(label, |(head, _)| head)
}

/// Arrivals fact: each record joined to its port city. Records whose
/// `i94port` has no entry in the port table are dropped.
pub fn derive_arrivals(raw: &DataFrame, port_codes: &DataFrame) -> Result<DataFrame> {
    require_columns(ARRIVALS, raw, &ARRIVALS_INPUT)?;
    require_columns(PORT_CODES, port_codes, &[PORT_CODE, PORT_CITY])?;

    let ports = port_codes
        .clone()
        .lazy()
        .select([col(PORT_CODE), col(PORT_CITY)]);

    let joined = raw
        .clone()
        .lazy()
        .select(columns(&ARRIVALS_INPUT))
        .join(
            ports,
            [col("i94port")],
            [col(PORT_CODE)],
            JoinArgs::new(JoinType::Inner),
        );
    let mut arrivals = sorted_by(joined, &[RECORD_ID]).collect()?;

    let city_names: StringChunked = arrivals
        .column(PORT_CITY)?
        .str()?
        .into_iter()
        .map(|city| city.map(leading_city_name))
        .collect();
    arrivals.with_column(city_names.with_name(CITY_NAME.into()).into_series())?;

    let arrivals = arrivals.select(ARRIVALS_COLUMNS)?;
    log_derivation(ARRIVALS, raw.height(), &arrivals);
    Ok(arrivals)
}
