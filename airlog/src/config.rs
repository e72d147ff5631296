//! Configuration for the logger.

use airlog_common::{DEFAULT_CO2_SENTINEL_PPM, LoggingConfig, PLAUSIBLE_CO2_MAX_PPM};
use airlog_exporter_prometheus::{MetricsMode, PrometheusConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound for serial read and settle delays.
pub const MAX_SERIAL_DELAY_MS: u64 = 60_000;

/// Upper bound for the pause between samples.
pub const MAX_SAMPLE_INTERVAL_SECS: f64 = 3600.0;

/// Upper bound for a window (one day).
pub const MAX_WINDOW_MINUTES: f64 = 1440.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete logger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Sensor transports
    #[serde(default)]
    pub sensors: SensorsConfig,

    /// Averaging window
    #[serde(default)]
    pub window: WindowConfig,

    /// Console and file output
    #[serde(default)]
    pub output: OutputConfig,

    /// Prometheus export
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Both sensors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default)]
    pub co2: Co2SensorConfig,

    #[serde(default)]
    pub environment: EnvironmentSensorConfig,
}

/// K30 CO2 analyzer on a serial port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Co2SensorConfig {
    /// Serial port path (default: "/dev/ttyAMA0")
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Baud rate (default: 9600)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// How long to wait for the full response frame (default: 1000 ms)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Delay between writing the command and reading the response (default: 500 ms)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Value substituted for a malformed response (default: 19666)
    #[serde(default = "default_sentinel")]
    pub sentinel_ppm: u16,
}

fn default_serial_port() -> String {
    "/dev/ttyAMA0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_sentinel() -> u16 {
    DEFAULT_CO2_SENTINEL_PPM
}

impl Default for Co2SensorConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            sentinel_ppm: default_sentinel(),
        }
    }
}

impl Co2SensorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// BME280 on an I2C bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSensorConfig {
    /// I2C bus device (default: "/dev/i2c-1")
    #[serde(default = "default_i2c_bus")]
    pub bus: String,

    /// 7-bit device address (default: 0x77)
    #[serde(default = "default_i2c_address")]
    pub address: u8,
}

fn default_i2c_bus() -> String {
    "/dev/i2c-1".to_string()
}

fn default_i2c_address() -> u8 {
    0x77
}

impl Default for EnvironmentSensorConfig {
    fn default() -> Self {
        Self {
            bus: default_i2c_bus(),
            address: default_i2c_address(),
        }
    }
}

/// Averaging window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window length in minutes (default: 0.5)
    #[serde(default = "default_window_minutes")]
    pub window_minutes: f64,

    /// Pause after each sample in seconds (default: 4.9)
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: f64,

    /// Leave degraded CO2 reads out of the window mean (default: false)
    #[serde(default)]
    pub exclude_degraded_co2: bool,
}

fn default_window_minutes() -> f64 {
    0.5
}

fn default_sample_interval() -> f64 {
    4.9
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            sample_interval_secs: default_sample_interval(),
            exclude_degraded_co2: false,
        }
    }
}

impl WindowConfig {
    /// Samples per window: twelve per minute, rounded, at least one.
    pub fn samples_per_window(&self) -> usize {
        ((12.0 * self.window_minutes).round() as usize).max(1)
    }

    /// Out-of-range values are rejected by validation; here they saturate.
    pub fn sample_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sample_interval_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Console and file output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Echo each window to stdout (default: true)
    #[serde(default = "default_true")]
    pub console: bool,

    /// Append each window to a data file (default: true)
    #[serde(default = "default_true")]
    pub file: bool,

    /// Directory for data files and the push failure log (default: "./data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            console: true,
            file: true,
            data_dir: default_data_dir(),
        }
    }
}

/// Which sinks run and where they write. Fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    pub console: bool,
    pub file: bool,
    pub data_dir: PathBuf,
    pub metrics: MetricsMode,
    pub job: String,
    pub gateway: String,
    pub push_timeout: Duration,
}

impl LoggerConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: LoggerConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let co2 = &self.sensors.co2;
        if co2.sentinel_ppm <= PLAUSIBLE_CO2_MAX_PPM {
            return Err(ConfigError::Validation(format!(
                "sentinel_ppm {} collides with plausible readings (0-{} ppm)",
                co2.sentinel_ppm, PLAUSIBLE_CO2_MAX_PPM
            )));
        }

        if co2.port.is_empty() {
            return Err(ConfigError::Validation(
                "Serial port must not be empty".to_string(),
            ));
        }

        if co2.baud_rate == 0 {
            return Err(ConfigError::Validation("baud_rate must be > 0".to_string()));
        }

        if co2.read_timeout_ms == 0 || co2.read_timeout_ms > MAX_SERIAL_DELAY_MS {
            return Err(ConfigError::Validation(format!(
                "read_timeout_ms must be between 1 and {}",
                MAX_SERIAL_DELAY_MS
            )));
        }

        if co2.settle_delay_ms > MAX_SERIAL_DELAY_MS {
            return Err(ConfigError::Validation(format!(
                "settle_delay_ms must be at most {}",
                MAX_SERIAL_DELAY_MS
            )));
        }

        let window = &self.window;
        if !(window.window_minutes > 0.0 && window.window_minutes <= MAX_WINDOW_MINUTES) {
            return Err(ConfigError::Validation(format!(
                "window_minutes must be > 0 and at most {}",
                MAX_WINDOW_MINUTES
            )));
        }

        // NaN fails both comparisons.
        if !(window.sample_interval_secs >= 0.0
            && window.sample_interval_secs <= MAX_SAMPLE_INTERVAL_SECS)
        {
            return Err(ConfigError::Validation(format!(
                "sample_interval_secs must be between 0 and {}",
                MAX_SAMPLE_INTERVAL_SECS
            )));
        }

        self.prometheus
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(())
    }

    /// Resolve the immutable sink settings, filling in the job name.
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            console: self.output.console,
            file: self.output.file,
            data_dir: self.output.data_dir.clone(),
            metrics: self.prometheus.mode,
            job: self.prometheus.job.clone().unwrap_or_else(local_hostname),
            gateway: self.prometheus.gateway.clone(),
            push_timeout: Duration::from_millis(self.prometheus.push_timeout_ms),
        }
    }
}

/// The local host name, used as the default push job.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
