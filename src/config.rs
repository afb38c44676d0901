//! Configuration management for the container monitoring service.
//!
//! This module handles loading and validating configuration from environment
//! variables and configuration files. Alert thresholds and fleet parameters
//! are policy data, not code: they live here with documented defaults so
//! they can be tuned without redeploying logic.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Main configuration for the monitoring service.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Service-level settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Alert threshold policy
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Fill-rate estimator settings
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Default collection fleet parameters
    #[serde(default)]
    pub fleet: FleetConfig,

    /// The fixed container fleet this deployment monitors
    #[serde(default)]
    pub containers: Vec<ContainerSeed>,
}

/// Service-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name used in logs
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Port for the Prometheus metrics exporter
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Queue size for the ingestion gateway payload channel
    #[serde(default = "default_gateway_queue_size")]
    pub gateway_queue_size: usize,
}

/// Alert threshold policy.
///
/// Defaults match the deployed sensor kit: overflow bands at 60/80 % fill,
/// gas alarm at 800 ppm, ambient temperature band 10–35 °C, and a sensor
/// considered silent after 6 hours without a reading.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    /// Fill level (percent) at which an overflow-risk alert becomes critical
    #[serde(default = "default_level_critical_pct")]
    pub level_critical_pct: f64,

    /// Fill level (percent) at which an overflow-risk warning is raised
    #[serde(default = "default_level_warning_pct")]
    pub level_warning_pct: f64,

    /// Gas concentration (ppm) above which a gas alert is raised
    #[serde(default = "default_gas_ppm")]
    pub gas_ppm: f64,

    /// Lower bound of the normal ambient temperature band (°C)
    #[serde(default = "default_temperature_low_c")]
    pub temperature_low_c: f64,

    /// Upper bound of the normal ambient temperature band (°C)
    #[serde(default = "default_temperature_high_c")]
    pub temperature_high_c: f64,

    /// Hours without a reading before a sensor-fault alert is raised
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

/// Fill-rate estimator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    /// Lookback window for the fill-rate trend, in hours
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
}

/// Collection fleet parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Usable volume of a single collection vehicle, in liters
    #[serde(default = "default_vehicle_capacity_liters")]
    pub vehicle_capacity_liters: f64,

    /// Number of collection vehicles available
    #[serde(default = "default_vehicle_count")]
    pub vehicle_count: u32,
}

/// A container definition used to seed the registry at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSeed {
    /// Stable container id
    pub id: u32,

    /// Display name
    pub name: String,

    /// Street address or placement note
    #[serde(default)]
    pub location: Option<String>,

    /// Total capacity in liters
    #[serde(default = "default_container_capacity_liters")]
    pub capacity_liters: f64,
}

// Default value functions
fn default_service_name() -> String {
    "binsight".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_gateway_queue_size() -> usize {
    100
}
fn default_level_critical_pct() -> f64 {
    80.0
}
fn default_level_warning_pct() -> f64 {
    60.0
}
fn default_gas_ppm() -> f64 {
    800.0
}
fn default_temperature_low_c() -> f64 {
    10.0
}
fn default_temperature_high_c() -> f64 {
    35.0
}
fn default_stale_after_hours() -> u64 {
    6
}
fn default_lookback_hours() -> u64 {
    24
}
fn default_vehicle_capacity_liters() -> f64 {
    12_000.0
}
fn default_vehicle_count() -> u32 {
    2
}
fn default_container_capacity_liters() -> f64 {
    3_300.0
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
            gateway_queue_size: default_gateway_queue_size(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            level_critical_pct: default_level_critical_pct(),
            level_warning_pct: default_level_warning_pct(),
            gas_ppm: default_gas_ppm(),
            temperature_low_c: default_temperature_low_c(),
            temperature_high_c: default_temperature_high_c(),
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            vehicle_capacity_liters: default_vehicle_capacity_liters(),
            vehicle_count: default_vehicle_count(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            thresholds: ThresholdConfig::default(),
            estimator: EstimatorConfig::default(),
            fleet: FleetConfig::default(),
            containers: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default config file (config/default.toml)
    /// 2. Environment-specific config (config/{env}.toml)
    /// 3. Environment variables (prefixed with FLEET_)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("FLEET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Create configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("FLEET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..=100.0).contains(&self.thresholds.level_warning_pct)
            || !(0.0..=100.0).contains(&self.thresholds.level_critical_pct)
        {
            return Err(ConfigValidationError::InvalidValue {
                field: "thresholds.level_warning_pct/level_critical_pct".to_string(),
                message: "Fill level thresholds must be within 0-100".to_string(),
            });
        }

        if self.thresholds.level_warning_pct >= self.thresholds.level_critical_pct {
            return Err(ConfigValidationError::InvalidValue {
                field: "thresholds.level_warning_pct".to_string(),
                message: "Warning threshold must be below the critical threshold".to_string(),
            });
        }

        if self.thresholds.temperature_low_c >= self.thresholds.temperature_high_c {
            return Err(ConfigValidationError::InvalidValue {
                field: "thresholds.temperature_low_c".to_string(),
                message: "Temperature band lower bound must be below the upper bound".to_string(),
            });
        }

        if self.thresholds.gas_ppm <= 0.0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "thresholds.gas_ppm".to_string(),
                message: "Gas threshold must be greater than 0".to_string(),
            });
        }

        if self.estimator.lookback_hours == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "estimator.lookback_hours".to_string(),
                message: "Lookback window must be at least one hour".to_string(),
            });
        }

        if self.fleet.vehicle_capacity_liters <= 0.0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "fleet.vehicle_capacity_liters".to_string(),
                message: "Vehicle capacity must be greater than 0".to_string(),
            });
        }

        for seed in &self.containers {
            if seed.capacity_liters <= 0.0 {
                return Err(ConfigValidationError::InvalidValue {
                    field: format!("containers[{}].capacity_liters", seed.id),
                    message: "Container capacity must be greater than 0".to_string(),
                });
            }
            if seed.name.is_empty() {
                return Err(ConfigValidationError::MissingField(format!(
                    "containers[{}].name",
                    seed.id
                )));
            }
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
