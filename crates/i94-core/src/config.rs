use std::path::Path;

use i94_bucket::{S3Config, StorageRoot};
use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

pub const ENV_STORAGE_ROOT: &str = "I94_STORAGE_ROOT";
pub const ENV_S3_REGION: &str = "I94_S3_REGION";
pub const ENV_S3_ENDPOINT_URL: &str = "I94_S3_ENDPOINT_URL";
pub const ENV_WAREHOUSE_HOST: &str = "I94_WAREHOUSE_HOST";
pub const ENV_WAREHOUSE_PORT: &str = "I94_WAREHOUSE_PORT";
pub const ENV_WAREHOUSE_DATABASE: &str = "I94_WAREHOUSE_DATABASE";
pub const ENV_WAREHOUSE_USER: &str = "I94_WAREHOUSE_USER";
pub const ENV_WAREHOUSE_PASSWORD: &str = "I94_WAREHOUSE_PASSWORD";
pub const ENV_ARRIVALS_ROW_CAP: &str = "I94_ARRIVALS_ROW_CAP";

/// Full job configuration, read from TOML and then overridden from the
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    pub storage: StorageConfig,
    pub datasets: DatasetKeys,
    pub warehouse: WarehouseConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// `s3://bucket/prefix` or a local directory.
    pub root: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            region: "us-west-2".to_string(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

/// Object keys of the five input datasets, relative to the storage root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetKeys {
    pub arrivals: String,
    pub port_codes: String,
    pub country_codes: String,
    pub city_temperatures: String,
    pub city_demographics: String,
}

impl Default for DatasetKeys {
    fn default() -> Self {
        Self {
            arrivals: "18-83510-I94-Data-2016/i94_jan16_sub.sas7bdat".to_string(),
            port_codes: "port_codes.csv".to_string(),
            country_codes: "country_codes.csv".to_string(),
            city_temperatures: "GlobalLandTemperaturesByCity.csv".to_string(),
            city_demographics: "us-cities-demographics.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseFlavour {
    #[default]
    Redshift,
    Postgres,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    pub host: Option<String>,
    pub port: u16,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub flavour: WarehouseFlavour,
    pub ssl_mode: SslMode,
    /// Upper bound on rows per INSERT statement.
    pub batch_rows: usize,
    pub connect_timeout_secs: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 5439,
            database: "i94".to_string(),
            user: None,
            password: None,
            flavour: WarehouseFlavour::Redshift,
            ssl_mode: SslMode::Prefer,
            batch_rows: 500,
            connect_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("flavour", &self.flavour)
            .field("ssl_mode", &self.ssl_mode)
            .field("batch_rows", &self.batch_rows)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Arrivals are truncated to this many leading rows.
    pub arrivals_row_cap: usize,
    pub temperature_country: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            arrivals_row_cap: 1000,
            temperature_country: "United States".to_string(),
        }
    }
}

impl EtlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads `path` (or starts from defaults), applies process environment
    /// overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `I94_*` overrides. `lookup` returns the value of a variable if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_STORAGE_ROOT) {
            self.storage.root = root;
        }
        if let Some(region) = lookup(ENV_S3_REGION) {
            self.storage.region = region;
        }
        if let Some(endpoint) = lookup(ENV_S3_ENDPOINT_URL) {
            self.storage.endpoint_url = Some(endpoint);
        }
        if let Some(host) = lookup(ENV_WAREHOUSE_HOST) {
            self.warehouse.host = Some(host);
        }
        if let Some(port) = lookup(ENV_WAREHOUSE_PORT) {
            self.warehouse.port = parse_override(ENV_WAREHOUSE_PORT, &port)?;
        }
        if let Some(database) = lookup(ENV_WAREHOUSE_DATABASE) {
            self.warehouse.database = database;
        }
        if let Some(user) = lookup(ENV_WAREHOUSE_USER) {
            self.warehouse.user = Some(user);
        }
        if let Some(password) = lookup(ENV_WAREHOUSE_PASSWORD) {
            self.warehouse.password = Some(password);
        }
        if let Some(cap) = lookup(ENV_ARRIVALS_ROW_CAP) {
            self.run.arrivals_row_cap = parse_override(ENV_ARRIVALS_ROW_CAP, &cap)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.storage_root()?;
        if self.run.arrivals_row_cap == 0 {
            return Err(EtlError::Config(
                "run.arrivals_row_cap must be greater than zero".into(),
            ));
        }
        if self.warehouse.batch_rows == 0 {
            return Err(EtlError::Config(
                "warehouse.batch_rows must be greater than zero".into(),
            ));
        }
        if self.run.temperature_country.trim().is_empty() {
            return Err(EtlError::Config(
                "run.temperature_country cannot be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn storage_root(&self) -> Result<StorageRoot> {
        if self.storage.root.trim().is_empty() {
            return Err(EtlError::Config(format!(
                "storage.root is not set (use the config file or {ENV_STORAGE_ROOT})"
            )));
        }
        Ok(self.storage.root.parse()?)
    }

    /// Connection settings for S3 roots. Credentials come from the standard
    /// AWS provider chain.
    pub fn s3_config(&self) -> S3Config {
        S3Config {
            region: self.storage.region.clone(),
            endpoint: self.storage.endpoint_url.clone(),
            force_path_style: self.storage.force_path_style,
            ..S3Config::default()
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| EtlError::Config(format!("{key}={raw} is not a valid value")))
}
