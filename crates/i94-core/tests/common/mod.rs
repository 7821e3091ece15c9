#![allow(dead_code)]

use std::path::{Path, PathBuf};

use i94_core::config::EtlConfig;
use i94_core::sources::{decode_source, DatasetFormat, SourceTables};
use i94_parser::fixtures::{FixtureValue, SasFileBuilder};
use i94_parser::{Endianness, WordSize};
use polars::prelude::*;

pub fn raw_arrivals() -> DataFrame {
    df!(
        "cicid" => [1.0, 2.0, 3.0, 4.0, 5.0],
        "i94port" => ["NYC", "BOS", "XXX", "WAS", "NEW"],
        "airline" => [Some("AA"), Some("B6"), Some("DL"), None, Some("UA")],
        "fltno" => ["100", "200", "300", "400", "500"],
        "depdate" => [Some(20560.0), None, Some(20561.0), Some(20570.0), Some(20580.0)],
        "arrdate" => [20550.0, 20551.0, 20552.0, 20553.0, 20554.0],
        "entdepd" => [Some("O"), None, Some("D"), Some("O"), Some("O")],
        "entdepa" => ["G", "G", "T", "G", "O"],
        "i94cit" => [582.0, 209.0, 438.0, 999.0, 582.0],
        "i94res" => [209.0, 209.0, 582.0, 582.0, 111.0],
        "i94visa" => [2.0, 1.0, 2.0, 3.0, 2.0],
        "visapost" => [Some("MEX"), None, Some("SYD"), None, Some("MEX")],
        "dtaddto" => ["07152016", "04222016", "06012016", "D/S", "05012016"],
        "visatype" => ["B2", "WT", "B2", "F1", "B2"],
        "biryear" => [Some(1980.0), Some(1975.0), None, Some(1990.0), Some(2001.0)],
        "gender" => [Some("F"), Some("M"), Some("M"), None, Some("F")]
    )
    .expect("arrivals fixture")
}

/// The rows of [`raw_arrivals`] as a 64-bit little-endian SAS7BDAT file.
pub fn arrivals_sas() -> Vec<u8> {
    let numbers = |values: [Option<f64>; 5]| values.map(FixtureValue::from);
    let texts = |values: [Option<&str>; 5]| values.map(FixtureValue::from);

    let columns: Vec<(&str, [FixtureValue; 5])> = vec![
        ("cicid", numbers([Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)])),
        ("i94port", texts([Some("NYC"), Some("BOS"), Some("XXX"), Some("WAS"), Some("NEW")])),
        ("airline", texts([Some("AA"), Some("B6"), Some("DL"), None, Some("UA")])),
        ("fltno", texts([Some("100"), Some("200"), Some("300"), Some("400"), Some("500")])),
        ("depdate", numbers([Some(20560.0), None, Some(20561.0), Some(20570.0), Some(20580.0)])),
        (
            "arrdate",
            numbers([Some(20550.0), Some(20551.0), Some(20552.0), Some(20553.0), Some(20554.0)]),
        ),
        ("entdepd", texts([Some("O"), None, Some("D"), Some("O"), Some("O")])),
        ("entdepa", texts([Some("G"), Some("G"), Some("T"), Some("G"), Some("O")])),
        ("i94cit", numbers([Some(582.0), Some(209.0), Some(438.0), Some(999.0), Some(582.0)])),
        ("i94res", numbers([Some(209.0), Some(209.0), Some(582.0), Some(582.0), Some(111.0)])),
        ("i94visa", numbers([Some(2.0), Some(1.0), Some(2.0), Some(3.0), Some(2.0)])),
        ("visapost", texts([Some("MEX"), None, Some("SYD"), None, Some("MEX")])),
        (
            "dtaddto",
            texts([
                Some("07152016"),
                Some("04222016"),
                Some("06012016"),
                Some("D/S"),
                Some("05012016"),
            ]),
        ),
        ("visatype", texts([Some("B2"), Some("WT"), Some("B2"), Some("F1"), Some("B2")])),
        ("biryear", numbers([Some(1980.0), Some(1975.0), None, Some(1990.0), Some(2001.0)])),
        ("gender", texts([Some("F"), Some("M"), Some("M"), None, Some("F")])),
    ];

    let mut builder = SasFileBuilder::new(WordSize::Bits64, Endianness::Little)
        .dataset_name("I94_JAN16_SUB");
    for (name, values) in &columns {
        builder = match values[0] {
            FixtureValue::Number(_) => builder.numeric(name, 8),
            FixtureValue::Text(_) => builder.character(name, 8),
        };
    }
    for idx in 0..5 {
        builder = builder.row(columns.iter().map(|(_, values)| values[idx].clone()).collect());
    }
    builder.build()
}

pub const PORT_CODES_CSV: &str = "CODE,city,state
NYC,\"NEW YORK, NY\",NY
BOS,\"BOSTON, MA\",MA
WAS,\"WASHINGTON DC, DC\",DC
NEW,\"NEWARK/TETERBORO, NJ\",NJ
STP,\"ST PAUL, MN\",MN
";

pub const COUNTRY_CODES_CSV: &str = "_c0,CODE,COUNTRY
0,582,MEXICO
1,209,JAPAN
2,438,AUSTRALIA
";

pub const CITY_TEMPERATURES_CSV: &str = "dt,AverageTemperature,City,Country
1743-11-01,5.0,Boston,United States
1743-12-01,15.0,Boston,United States
1744-01-01,10.0,Paris,France
1744-02-01,,Boston,United States
";

pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("i94-core-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// Writes all five datasets under `root` at the keys `config` names.
pub fn write_datasets(root: &Path, config: &EtlConfig) {
    let keys = &config.datasets;
    let files: [(&str, Vec<u8>); 5] = [
        (keys.arrivals.as_str(), arrivals_sas()),
        (keys.port_codes.as_str(), PORT_CODES_CSV.as_bytes().to_vec()),
        (keys.country_codes.as_str(), COUNTRY_CODES_CSV.as_bytes().to_vec()),
        (keys.city_temperatures.as_str(), CITY_TEMPERATURES_CSV.as_bytes().to_vec()),
        (keys.city_demographics.as_str(), DEMOGRAPHICS_JSON.as_bytes().to_vec()),
    ];
    for (key, bytes) in files {
        let path = root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dataset dir");
        }
        std::fs::write(&path, bytes).expect("write dataset");
    }
}

pub fn port_codes() -> DataFrame {
    df!(
        "CODE" => ["NYC", "BOS", "WAS", "NEW", "STP"],
        "city" => [
            "NEW YORK, NY",
            "BOSTON, MA",
            "WASHINGTON DC, DC",
            "NEWARK/TETERBORO, NJ",
            "ST PAUL, MN",
        ],
        "state" => ["NY", "MA", "DC", "NJ", "MN"]
    )
    .expect("port code fixture")
}

pub fn country_codes() -> DataFrame {
    df!(
        "_c0" => ["0", "1", "2"],
        "CODE" => ["582", "209", "438"],
        "COUNTRY" => ["MEXICO", "JAPAN", "AUSTRALIA"]
    )
    .expect("country code fixture")
}

pub fn city_temperatures() -> DataFrame {
    df!(
        "dt" => ["1743-11-01", "1743-12-01", "1744-01-01", "1744-02-01"],
        "AverageTemperature" => [Some("5.0"), Some("15.0"), Some("10.0"), None],
        "City" => ["Boston", "Boston", "Paris", "Boston"],
        "Country" => ["United States", "United States", "France", "United States"]
    )
    .expect("temperature fixture")
}

pub const DEMOGRAPHICS_JSON: &str = r#"[
  {"datasetid": "us-cities-demographics", "recordid": "a1",
   "fields": {"city": "Silver Spring", "state": "Maryland", "median_age": 33.8, "count": 25924}},
  {"datasetid": "us-cities-demographics", "recordid": "b2",
   "fields": {"city": "Quincy", "state": "Massachusetts", "median_age": 41.0, "count": 58723}}
]"#;

pub fn city_demographics() -> DataFrame {
    decode_source(DEMOGRAPHICS_JSON.as_bytes(), DatasetFormat::Json, None)
        .expect("demographics fixture")
}

pub fn sources() -> SourceTables {
    SourceTables {
        arrivals: raw_arrivals(),
        port_codes: port_codes(),
        country_codes: country_codes(),
        city_temperatures: city_temperatures(),
        city_demographics: city_demographics(),
    }
}

pub fn strings(df: &DataFrame, column: &str) -> Vec<Option<String>> {
    df.column(column)
        .expect("column present")
        .str()
        .expect("string column")
        .into_iter()
        .map(|value| value.map(str::to_owned))
        .collect()
}

pub fn floats(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    df.column(column)
        .expect("column present")
        .f64()
        .expect("float column")
        .into_iter()
        .collect()
}
