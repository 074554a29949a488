//! Application configuration.
//!
//! Values are layered from `config/default.toml`, `config/{RUN_MODE}.toml`
//! and `BILLING__*` environment variables. Every field has a default, so an
//! empty environment yields a working local setup.

use crate::error::{BillingError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    pub contract: ContractConstants,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// SQLite database location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("billing.db"),
        }
    }
}

/// Where export files are staged before download.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for temporary export files; the system temp dir when unset
    pub staging_dir: Option<PathBuf>,
}

/// Constants fixed per billing contract.
///
/// Each value fills one column of the fixed-width record, so its width is
/// part of the contract and checked by [`ContractConstants::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContractConstants {
    /// 7 digits
    pub contract_number: String,
    /// 2 digits
    pub county_code: String,
    /// 1 character
    pub form_code: String,
    /// 2 digits
    pub group_size: String,
    /// 2 digits
    pub staff_size: String,
    /// Up to 7 characters, right-justified in the record
    pub work_rate: String,
    /// Up to 7 characters, right-justified in the record
    pub trip_rate: String,
}

impl Default for ContractConstants {
    fn default() -> Self {
        Self {
            contract_number: "2573421".to_string(),
            county_code: "25".to_string(),
            form_code: "2".to_string(),
            group_size: "01".to_string(),
            staff_size: "01".to_string(),
            work_rate: "13.75".to_string(),
            trip_rate: "6.50".to_string(),
        }
    }
}

impl ContractConstants {
    /// Check that every constant has the exact width of its record column.
    pub fn validate(&self) -> Result<()> {
        exact_width("contract_number", &self.contract_number, 7)?;
        exact_width("county_code", &self.county_code, 2)?;
        exact_width("form_code", &self.form_code, 1)?;
        exact_width("group_size", &self.group_size, 2)?;
        exact_width("staff_size", &self.staff_size, 2)?;
        max_width("work_rate", &self.work_rate, 7)?;
        max_width("trip_rate", &self.trip_rate, 7)?;
        Ok(())
    }
}

fn exact_width(name: &str, value: &str, width: usize) -> Result<()> {
    if !value.is_ascii() || value.len() != width {
        return Err(BillingError::Config(format!(
            "contract.{} must be exactly {} ASCII characters, got '{}'",
            name, width, value
        )));
    }
    Ok(())
}

fn max_width(name: &str, value: &str, width: usize) -> Result<()> {
    if !value.is_ascii() || value.is_empty() || value.len() > width {
        return Err(BillingError::Config(format!(
            "contract.{} must be 1 to {} ASCII characters, got '{}'",
            name, width, value
        )));
    }
    Ok(())
}

impl AppConfig {
    /// Loads configuration from config files and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the contract
    /// constants do not fit their record columns.
    pub fn load() -> Result<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("BILLING").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BillingError::Config(e.to_string()))?;

        config.contract.validate()?;
        Ok(config)
    }

    /// `host:port` for the HTTP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
