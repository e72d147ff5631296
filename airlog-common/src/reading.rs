use chrono::{DateTime, Local};

/// Default CO2 value substituted for a malformed sensor frame.
///
/// Well outside the 0..=10000 ppm range a K30-class sensor can report, so a
/// window polluted by dropouts is recognizable in every sink.
pub const DEFAULT_CO2_SENTINEL_PPM: u16 = 19666;

/// Upper bound of physically plausible CO2 readings for this sensor class.
pub const PLAUSIBLE_CO2_MAX_PPM: u16 = 10_000;

/// Temperature, pressure and humidity from one environmental acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// Degrees Celsius.
    pub temperature_c: f64,
    /// Hectopascals (millibars).
    pub pressure_hpa: f64,
    /// Relative humidity, percent.
    pub humidity_pct: f64,
}

impl Environment {
    /// Substitute used when the environmental sensor fails before any good read.
    pub const SENTINEL: Environment = Environment {
        temperature_c: -999.0,
        pressure_hpa: -999.0,
        humidity_pct: -999.0,
    };

    pub fn new(temperature_c: f64, pressure_hpa: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c,
            pressure_hpa,
            humidity_pct,
        }
    }
}

/// One instantaneous acquisition from both sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// CO2 concentration, or the configured sentinel when degraded.
    pub co2_ppm: u16,
    pub environment: Environment,
    /// The CO2 frame was malformed and `co2_ppm` holds the sentinel.
    pub co2_degraded: bool,
    /// The environmental read failed and `environment` is a substitute.
    pub environment_degraded: bool,
}

impl RawSample {
    /// A sample where both reads succeeded.
    pub fn new(co2_ppm: u16, environment: Environment) -> Self {
        Self {
            co2_ppm,
            environment,
            co2_degraded: false,
            environment_degraded: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.co2_degraded || self.environment_degraded
    }
}

/// The averaged result of one completed sampling window.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedReading {
    /// Local time at which the window closed.
    pub timestamp: DateTime<Local>,
    pub co2_ppm_avg: f64,
    pub temperature_c_avg: f64,
    pub temperature_f_avg: f64,
    pub pressure_hpa_avg: f64,
    pub humidity_pct_avg: f64,
    /// Heat index in Fahrenheit, derived from the averaged temperature and humidity.
    pub heat_index_f: f64,
    /// Number of samples in the window.
    pub samples: usize,
    /// Samples with at least one degraded read.
    pub degraded_samples: usize,
}

impl AggregatedReading {
    /// Bracketed timestamp prefix, e.g. `[2024-05-01 13:07:42] `.
    pub fn stamp(&self) -> String {
        format_stamp(&self.timestamp)
    }

    /// Comma-separated metric summary shared by the file and push-failure logs.
    ///
    /// Temperature is reported in Fahrenheit.
    pub fn metric_line(&self) -> String {
        format!(
            "CO2: {:.2}, Temp: {:.2}, Pres: {:.2}, Humid: {:.2}",
            self.co2_ppm_avg, self.temperature_f_avg, self.pressure_hpa_avg, self.humidity_pct_avg
        )
    }
}

/// Format a timestamp the way every text sink prefixes its lines.
pub fn format_stamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("[%Y-%m-%d %H:%M:%S] ").to_string()
}
