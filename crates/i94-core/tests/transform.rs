mod common;

use anyhow::Result;
use i94_core::config::RunConfig;
use i94_core::pipeline::derive_tables;
use i94_core::quality::canonicalize_arrival_city_names;
use i94_core::reference::split_country_views;
use i94_core::sources::{require_columns, COUNTRY_CODES};
use i94_core::transform::{
    derive_arrivals, derive_city_demographics, derive_city_temperatures, derive_immigrants,
    derive_personal_demographics, leading_city_name, ARRIVALS_COLUMNS, CITY_TEMPERATURE_COLUMNS,
    IMMIGRANTS_COLUMNS, PERSONAL_DEMOGRAPHICS_COLUMNS,
};
use i94_core::EtlError;
use polars::prelude::*;

use common::{floats, strings};

fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

fn owned(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|value| Some(value.to_string())).collect()
}

#[test]
fn leading_city_name_cuts_at_first_comma() {
    assert_eq!(leading_city_name("NEW YORK, NY"), "NEW YORK");
    assert_eq!(leading_city_name("AGANA, GU, USA"), "AGANA");
    assert_eq!(leading_city_name("NO COMMA"), "NO COMMA");
    assert_eq!(leading_city_name(" LEADING ,X"), " LEADING ");
    assert_eq!(leading_city_name(""), "");
}

#[test]
fn arrivals_join_port_cities_and_drop_unknown_ports() -> Result<()> {
    let arrivals = derive_arrivals(&common::raw_arrivals(), &common::port_codes())?;

    assert_eq!(names(&arrivals), ARRIVALS_COLUMNS);
    assert_eq!(floats(&arrivals, "cicid"), vec![Some(1.0), Some(2.0), Some(4.0), Some(5.0)]);
    assert_eq!(
        strings(&arrivals, "city"),
        owned(&[
            "NEW YORK, NY",
            "BOSTON, MA",
            "WASHINGTON DC, DC",
            "NEWARK/TETERBORO, NJ"
        ])
    );
    assert_eq!(
        strings(&arrivals, "cityname"),
        owned(&["NEW YORK", "BOSTON", "WASHINGTON DC", "NEWARK/TETERBORO"])
    );
    assert!(!strings(&arrivals, "i94port").contains(&Some("XXX".to_string())));
    Ok(())
}

#[test]
fn arrivals_city_names_are_canonicalized() -> Result<()> {
    let arrivals = derive_arrivals(&common::raw_arrivals(), &common::port_codes())?;
    let corrected = canonicalize_arrival_city_names(&arrivals)?;

    assert_eq!(
        strings(&corrected, "cityname"),
        owned(&["NEW YORK", "BOSTON", "WASHINGTON", "NEWARK"])
    );
    assert_eq!(strings(&corrected, "city"), strings(&arrivals, "city"));
    Ok(())
}

#[test]
fn arrivals_missing_columns_are_schema_errors() {
    let raw = common::raw_arrivals().drop("fltno").expect("drop column");
    let err = derive_arrivals(&raw, &common::port_codes()).unwrap_err();
    assert!(
        matches!(&err, EtlError::Source { message, .. } if message.contains("fltno")),
        "got {err:?}"
    );
}

#[test]
fn country_views_rename_independently() -> Result<()> {
    let views = split_country_views(&common::country_codes())?;

    assert_eq!(names(&views.citizenship), ["_c0", "CODE", "cit_country"]);
    assert_eq!(names(&views.residency), ["_c0", "CODE", "res_country"]);
    let schema = views.citizenship.schema();
    assert!(schema.contains("cit_country"));
    assert!(!schema.contains("COUNTRY"));
    require_columns(COUNTRY_CODES, &views.citizenship, &["CODE", "cit_country"])?;
    require_columns(COUNTRY_CODES, &views.residency, &["CODE", "res_country"])?;
    assert!(require_columns(COUNTRY_CODES, &views.residency, &["cit_country"]).is_err());
    assert_eq!(
        strings(&views.citizenship, "cit_country"),
        strings(&views.residency, "res_country")
    );
    assert_eq!(views.citizenship.height(), 3);

    let missing = common::country_codes().drop("COUNTRY")?;
    assert!(split_country_views(&missing).is_err());
    Ok(())
}

#[test]
fn immigrants_need_both_countries_to_match() -> Result<()> {
    let views = split_country_views(&common::country_codes())?;
    let immigrants = derive_immigrants(&common::raw_arrivals(), &views)?;

    assert_eq!(names(&immigrants), IMMIGRANTS_COLUMNS);
    assert_eq!(floats(&immigrants, "cicid"), vec![Some(1.0), Some(2.0), Some(3.0)]);
    assert_eq!(
        strings(&immigrants, "cit_country"),
        owned(&["MEXICO", "JAPAN", "AUSTRALIA"])
    );
    assert_eq!(
        strings(&immigrants, "res_country"),
        owned(&["JAPAN", "JAPAN", "MEXICO"])
    );
    Ok(())
}

#[test]
fn country_codes_match_as_numbers() -> Result<()> {
    let country_codes = df!(
        "CODE" => ["582.0", " 209", "438", "n/a"],
        "COUNTRY" => ["MEXICO", "JAPAN", "AUSTRALIA", "UNKNOWN"]
    )?;
    let views = split_country_views(&country_codes)?;
    let immigrants = derive_immigrants(&common::raw_arrivals(), &views)?;

    assert_eq!(floats(&immigrants, "cicid"), vec![Some(1.0), Some(2.0), Some(3.0)]);
    assert_eq!(
        strings(&immigrants, "cit_country"),
        owned(&["MEXICO", "JAPAN", "AUSTRALIA"])
    );
    Ok(())
}

#[test]
fn personal_demographics_project_three_columns() -> Result<()> {
    let demographics = derive_personal_demographics(&common::raw_arrivals())?;

    assert_eq!(names(&demographics), PERSONAL_DEMOGRAPHICS_COLUMNS);
    assert_eq!(demographics.height(), 5);
    assert_eq!(floats(&demographics, "biryear")[2], None);
    Ok(())
}

#[test]
fn city_temperatures_aggregate_one_row_per_city() -> Result<()> {
    let temperatures = derive_city_temperatures(&common::city_temperatures(), "United States")?;

    assert_eq!(names(&temperatures), CITY_TEMPERATURE_COLUMNS);
    assert_eq!(temperatures.height(), 1);
    assert_eq!(strings(&temperatures, "city"), owned(&["Boston"]));
    assert_eq!(temperatures.column("MinTemperature")?.i32()?.get(0), Some(5));
    assert_eq!(temperatures.column("MaxTemperature")?.i32()?.get(0), Some(15));
    assert_eq!(floats(&temperatures, "AvgTemperature"), vec![Some(10.0)]);
    Ok(())
}

#[test]
fn city_temperatures_truncate_toward_zero() -> Result<()> {
    let raw = df!(
        "AverageTemperature" => ["5.7", "-3.9", "12.2"],
        "City" => ["Fairbanks", "Fairbanks", "Honolulu"],
        "Country" => ["United States", "United States", "United States"]
    )?;
    let temperatures = derive_city_temperatures(&raw, "United States")?;

    assert_eq!(strings(&temperatures, "city"), owned(&["Fairbanks", "Honolulu"]));
    let min = temperatures.column("MinTemperature")?.i32()?;
    let max = temperatures.column("MaxTemperature")?.i32()?;
    assert_eq!((min.get(0), max.get(0)), (Some(-3), Some(5)));
    assert_eq!((min.get(1), max.get(1)), (Some(12), Some(12)));
    assert_eq!(floats(&temperatures, "AvgTemperature")[0], Some(1.0));
    Ok(())
}

#[test]
fn city_temperatures_follow_configured_country() -> Result<()> {
    let temperatures = derive_city_temperatures(&common::city_temperatures(), "France")?;
    assert_eq!(strings(&temperatures, "city"), owned(&["Paris"]));
    Ok(())
}

#[test]
fn city_demographics_unwrap_fields_and_upper_case_city() -> Result<()> {
    let demographics = derive_city_demographics(&common::city_demographics())?;

    assert!(demographics.column("fields").is_err());
    assert!(demographics.column("datasetid").is_err());
    assert!(demographics.column("median_age").is_ok());
    assert_eq!(
        strings(&demographics, "city"),
        owned(&["SILVER SPRING", "QUINCY"])
    );
    assert_eq!(strings(&demographics, "state"), owned(&["Maryland", "Massachusetts"]));
    Ok(())
}

#[test]
fn row_cap_applies_before_joins() -> Result<()> {
    let settings = RunConfig {
        arrivals_row_cap: 2,
        ..RunConfig::default()
    };
    let tables = derive_tables(&common::sources(), &settings)?;

    assert_eq!(tables.personal_demographics.height(), 2);
    assert_eq!(floats(&tables.arrivals, "cicid"), vec![Some(1.0), Some(2.0)]);
    assert_eq!(tables.immigrants.height(), 2);
    Ok(())
}

#[test]
fn derivation_is_idempotent() -> Result<()> {
    let sources = common::sources();
    let settings = RunConfig::default();
    let first = derive_tables(&sources, &settings)?;
    let second = derive_tables(&sources, &settings)?;

    for ((table, a), (_, b)) in first.iter().zip(second.iter()) {
        assert!(a.equals_missing(b), "{table} differs between runs");
    }
    Ok(())
}
