use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::sources::{require_columns, ARRIVALS};

const CITY_NAME: &str = "cityname";

/// Port city spellings rewritten to the names used by the other datasets.
/// Matched exactly, first match wins.
pub const CITY_NAME_CORRECTIONS: [(&str, &str); 3] = [
    ("NEWARK/TETERBORO", "NEWARK"),
    ("WASHINGTON DC", "WASHINGTON"),
    ("ST PAUL", "SAINT PAUL"),
];

pub fn canonical_city_name(name: &str) -> &str {
    CITY_NAME_CORRECTIONS
        .iter()
        .find(|(variant, _)| *variant == name)
        .map_or(name, |(_, canonical)| *canonical)
}

/// Applies [`CITY_NAME_CORRECTIONS`] to the `cityname` column of the arrivals fact.
pub fn canonicalize_arrival_city_names(arrivals: &DataFrame) -> Result<DataFrame> {
    require_columns(ARRIVALS, arrivals, &[CITY_NAME])?;

    let names = arrivals.column(CITY_NAME)?.str()?;
    let mut corrected_rows = 0usize;
    let corrected: StringChunked = names
        .into_iter()
        .map(|name| {
            name.map(|name| {
                let canonical = canonical_city_name(name);
                if canonical != name {
                    corrected_rows += 1;
                }
                canonical
            })
        })
        .collect();

    let mut output = arrivals.clone();
    output.with_column(corrected.with_name(CITY_NAME.into()).into_series())?;

    info!(table = ARRIVALS, corrected_rows, "canonicalized city names");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrections_are_exact_matches() {
        assert_eq!(canonical_city_name("NEWARK/TETERBORO"), "NEWARK");
        assert_eq!(canonical_city_name("WASHINGTON DC"), "WASHINGTON");
        assert_eq!(canonical_city_name("ST PAUL"), "SAINT PAUL");

        assert_eq!(canonical_city_name("ST PAUL PARK"), "ST PAUL PARK");
        assert_eq!(canonical_city_name("st paul"), "st paul");
        assert_eq!(canonical_city_name("WASHINGTON"), "WASHINGTON");
        assert_eq!(canonical_city_name(""), "");
    }
}
