//! Derivations from the raw sources to the five warehouse tables.
//!
//! Every function borrows its inputs and returns a new frame. Unmatched rows
//! in an inner join are dropped without error.

mod arrivals;
mod city_demographics;
mod immigrants;
mod personal_demographics;
mod temperature;

pub use arrivals::{derive_arrivals, leading_city_name, ARRIVALS_COLUMNS};
pub use city_demographics::derive_city_demographics;
pub use immigrants::{derive_immigrants, IMMIGRANTS_COLUMNS};
pub use personal_demographics::{derive_personal_demographics, PERSONAL_DEMOGRAPHICS_COLUMNS};
pub use temperature::{derive_city_temperatures, CITY_TEMPERATURE_COLUMNS};

use polars::prelude::*;
use tracing::info;

pub(crate) const RECORD_ID: &str = "cicid";

pub(crate) fn columns(names: &[&str]) -> Vec<Expr> {
    names.iter().map(|name| col(*name)).collect()
}

pub(crate) fn sorted_by(frame: LazyFrame, keys: &[&str]) -> LazyFrame {
    frame.sort(
        keys.iter().copied(),
        SortMultipleOptions::default().with_maintain_order(true),
    )
}

pub(crate) fn log_derivation(table: &str, rows_in: usize, output: &DataFrame) {
    info!(
        table,
        rows_in,
        rows_out = output.height(),
        "derived table"
    );
}
