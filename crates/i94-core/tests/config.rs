use std::collections::HashMap;

use i94_bucket::StorageRoot;
use i94_core::config::{EtlConfig, SslMode, WarehouseFlavour};
use i94_core::EtlError;

const SAMPLE: &str = r#"
[storage]
root = "s3://capstone-raw/i94"
region = "us-east-1"

[datasets]
port_codes = "reference/port_codes.csv"

[warehouse]
host = "redshift.example.internal"
user = "etl"
password = "secret"
ssl_mode = "require"

[run]
arrivals_row_cap = 5000
"#;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn parses_sections_and_fills_defaults() {
    let config = EtlConfig::from_toml_str(SAMPLE).expect("parse config");

    assert_eq!(config.storage.region, "us-east-1");
    assert_eq!(config.datasets.port_codes, "reference/port_codes.csv");
    assert_eq!(config.datasets.country_codes, "country_codes.csv");
    assert_eq!(
        config.datasets.arrivals,
        "18-83510-I94-Data-2016/i94_jan16_sub.sas7bdat"
    );
    assert_eq!(config.warehouse.port, 5439);
    assert_eq!(config.warehouse.database, "i94");
    assert_eq!(config.warehouse.flavour, WarehouseFlavour::Redshift);
    assert_eq!(config.warehouse.ssl_mode, SslMode::Require);
    assert_eq!(config.run.arrivals_row_cap, 5000);
    assert_eq!(config.run.temperature_country, "United States");
    assert!(config.validate().is_ok());

    assert_eq!(
        config.storage_root().unwrap(),
        StorageRoot::S3 {
            bucket: "capstone-raw".into(),
            prefix: "i94".into(),
        }
    );
    let s3 = config.s3_config();
    assert_eq!(s3.region, "us-east-1");
    assert!(s3.endpoint.is_none());
}

#[test]
fn unknown_keys_are_rejected() {
    let err = EtlConfig::from_toml_str("[warehouse]\nhostname = \"x\"\n").unwrap_err();
    assert!(matches!(err, EtlError::Toml(_)), "got {err:?}");
}

#[test]
fn environment_overrides_file_values() {
    let mut config = EtlConfig::from_toml_str(SAMPLE).unwrap();
    config
        .apply_overrides(env(&[
            ("I94_STORAGE_ROOT", "/srv/i94"),
            ("I94_S3_ENDPOINT_URL", "http://localhost:9000"),
            ("I94_WAREHOUSE_HOST", "localhost"),
            ("I94_WAREHOUSE_PORT", "5432"),
            ("I94_WAREHOUSE_PASSWORD", "from-env"),
            ("I94_ARRIVALS_ROW_CAP", "10"),
        ]))
        .unwrap();

    assert_eq!(config.storage.root, "/srv/i94");
    assert_eq!(config.storage.endpoint_url.as_deref(), Some("http://localhost:9000"));
    assert_eq!(config.warehouse.host.as_deref(), Some("localhost"));
    assert_eq!(config.warehouse.port, 5432);
    assert_eq!(config.warehouse.user.as_deref(), Some("etl"));
    assert_eq!(config.warehouse.password.as_deref(), Some("from-env"));
    assert_eq!(config.run.arrivals_row_cap, 10);
    assert_eq!(
        config.storage_root().unwrap(),
        StorageRoot::Local("/srv/i94".into())
    );
}

#[test]
fn malformed_overrides_are_config_errors() {
    let mut config = EtlConfig::default();
    let err = config
        .apply_overrides(env(&[("I94_WAREHOUSE_PORT", "fifty")]))
        .unwrap_err();
    assert!(matches!(err, EtlError::Config(_)), "got {err:?}");
}

#[test]
fn validation_rejects_missing_root_and_zero_cap() {
    let config = EtlConfig::default();
    assert!(matches!(config.validate(), Err(EtlError::Config(_))));

    let mut config = EtlConfig::from_toml_str(SAMPLE).unwrap();
    config.run.arrivals_row_cap = 0;
    assert!(matches!(config.validate(), Err(EtlError::Config(_))));
}

#[test]
fn debug_output_redacts_password() {
    let config = EtlConfig::from_toml_str(SAMPLE).unwrap();
    let rendered = format!("{:?}", config.warehouse);
    assert!(!rendered.contains("secret"));
    assert!(rendered.contains("<redacted>"));
}
