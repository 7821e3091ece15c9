use polars::prelude::*;

use crate::error::Result;
use crate::sources::{require_columns, COUNTRY_CODES};

pub const COUNTRY_CODE: &str = "CODE";
pub const COUNTRY_NAME: &str = "COUNTRY";
pub const CITIZENSHIP_COUNTRY: &str = "cit_country";
pub const RESIDENCY_COUNTRY: &str = "res_country";

/// The country-code table in its two join roles. The copies share no
/// column names beyond `CODE`, so both can join the same immigrant row.
#[derive(Debug, Clone)]
pub struct CountryViews {
    pub citizenship: DataFrame,
    pub residency: DataFrame,
}

pub fn split_country_views(country_codes: &DataFrame) -> Result<CountryViews> {
    require_columns(COUNTRY_CODES, country_codes, &[COUNTRY_CODE, COUNTRY_NAME])?;

    let renamed = |target: &str| -> Result<DataFrame> {
        Ok(country_codes
            .clone()
            .lazy()
            .rename([COUNTRY_NAME], [target], true)
            .collect()?)
    };

    Ok(CountryViews {
        citizenship: renamed(CITIZENSHIP_COUNTRY)?,
        residency: renamed(RESIDENCY_COUNTRY)?,
    })
}
