use polars::prelude::*;

use super::{log_derivation, sorted_by};
use crate::error::Result;
use crate::sources::{require_columns, CITY_TEMPERATURES};

pub const CITY_TEMPERATURE_COLUMNS: [&str; 4] =
    ["city", "MinTemperature", "MaxTemperature", "AvgTemperature"];

const CITY: &str = "City";
const COUNTRY: &str = "Country";
const TEMPERATURE: &str = "AverageTemperature";

/// One row per city of `country` with the minimum, maximum and mean of its
/// monthly temperatures. Temperatures are truncated to whole degrees before
/// aggregating; missing samples are ignored.
pub fn derive_city_temperatures(raw: &DataFrame, country: &str) -> Result<DataFrame> {
    require_columns(CITY_TEMPERATURES, raw, &[CITY, COUNTRY, TEMPERATURE])?;

    // CSV columns arrive as strings; parse as float first so "5.7" truncates to 5.
    let samples = raw
        .clone()
        .lazy()
        .filter(col(COUNTRY).eq(lit(country)))
        .select([
            col(CITY),
            col(TEMPERATURE)
                .cast(DataType::Float64)
                .cast(DataType::Int32)
                .alias(TEMPERATURE),
        ]);

    let aggregate = |expr: Expr, name: &str| {
        samples
            .clone()
            .group_by_stable([col(CITY)])
            .agg([expr.alias(name)])
    };
    let minimum = aggregate(col(TEMPERATURE).min(), "MinTemperature");
    let maximum = aggregate(col(TEMPERATURE).max(), "MaxTemperature");
    let mean = aggregate(col(TEMPERATURE).mean(), "AvgTemperature");

    let by_city = || JoinArgs::new(JoinType::Inner);
    let combined = minimum
        .join(maximum, [col(CITY)], [col(CITY)], by_city())
        .join(mean, [col(CITY)], [col(CITY)], by_city())
        .select([
            col(CITY).alias("city"),
            col("MinTemperature"),
            col("MaxTemperature"),
            col("AvgTemperature"),
        ]);

    let temperatures = sorted_by(combined, &["city"]).collect()?;
    log_derivation("cities_temperature", raw.height(), &temperatures);
    Ok(temperatures)
}
