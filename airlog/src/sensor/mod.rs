//! Sensor acquisition.
//!
//! The [`SensorReader`] owns both transports and turns their raw results
//! into [`Acquisition`] values the sampling loop must handle explicitly:
//! a good value, a degraded substitute, or a fatal transport failure.

mod serial;

#[cfg(target_os = "linux")]
mod i2c;

use std::future::Future;

use airlog_common::{Environment, RawSample};
use thiserror::Error;
use tracing::{debug, warn};

pub use serial::SerialTransport;

#[cfg(target_os = "linux")]
pub use i2c::Bme280Source;

use crate::config::EnvironmentSensorConfig;

/// Read-CO2 command frame for a K30 sensor.
pub const K30_READ_CO2: [u8; 7] = [0xFE, 0x44, 0x00, 0x08, 0x02, 0x9F, 0x25];

/// Length of a well-formed K30 response frame.
pub const K30_RESPONSE_LEN: usize = 7;

/// Error type for sensor operations.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Unable to open {device}: {message}. Hint: {hint}")]
    Open {
        device: String,
        message: String,
        hint: &'static str,
    },

    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environmental sensor read failed: {0}")]
    Environment(String),
}

/// Outcome of one sensor acquisition.
#[derive(Debug)]
pub enum Acquisition<T> {
    /// A well-formed reading.
    Ok(T),
    /// The read failed recoverably; the value is a substitute.
    Degraded(T),
    /// The transport is unusable.
    Fatal(SensorError),
}

/// Sends a command frame and returns whatever response bytes arrive.
pub trait FrameTransport {
    /// Write `command`, then read up to `expected_len` bytes.
    ///
    /// A short read is not an error; only a broken transport is.
    fn transact(
        &mut self,
        command: &[u8],
        expected_len: usize,
    ) -> impl Future<Output = std::io::Result<Vec<u8>>>;
}

/// Instantaneous temperature, pressure and humidity.
pub trait EnvironmentSource {
    fn read(&mut self) -> Result<Environment, SensorError>;
}

/// Open the platform's environmental sensor.
#[cfg(target_os = "linux")]
pub fn open_environment(config: &EnvironmentSensorConfig) -> Result<Bme280Source, SensorError> {
    Bme280Source::open(config)
}

/// Open the platform's environmental sensor.
#[cfg(not(target_os = "linux"))]
pub fn open_environment(config: &EnvironmentSensorConfig) -> Result<NoEnvironment, SensorError> {
    Err(SensorError::Open {
        device: config.bus.clone(),
        message: "I2C access is not supported on this platform".to_string(),
        hint: "run on Linux with I2C enabled",
    })
}

/// Placeholder source for platforms without I2C support. Never constructed.
#[cfg(not(target_os = "linux"))]
pub enum NoEnvironment {}

#[cfg(not(target_os = "linux"))]
impl EnvironmentSource for NoEnvironment {
    fn read(&mut self) -> Result<Environment, SensorError> {
        match *self {}
    }
}

/// Decode a K30 response frame.
///
/// The instrument reports CO2 as `byte[3] * 255 + byte[4]`. This differs
/// from the usual `* 256` big-endian decoding and is kept as the
/// deployed sensor behaves; verify against the datasheet before changing.
pub fn decode_co2_frame(frame: &[u8], sentinel: u16) -> Acquisition<u16> {
    if frame.len() != K30_RESPONSE_LEN {
        return Acquisition::Degraded(sentinel);
    }

    let ppm = u16::from(frame[3]) * 255 + u16::from(frame[4]);
    Acquisition::Ok(ppm)
}

/// Reads both sensors and applies the degraded-read policy.
pub struct SensorReader<T, E> {
    transport: T,
    environment: E,
    sentinel_ppm: u16,
    last_environment: Option<Environment>,
}

impl<T: FrameTransport, E: EnvironmentSource> SensorReader<T, E> {
    pub fn new(transport: T, environment: E, sentinel_ppm: u16) -> Self {
        Self {
            transport,
            environment,
            sentinel_ppm,
            last_environment: None,
        }
    }

    /// Issue one CO2 acquisition.
    pub async fn read_co2(&mut self) -> Acquisition<u16> {
        let frame = match self
            .transport
            .transact(&K30_READ_CO2, K30_RESPONSE_LEN)
            .await
        {
            Ok(frame) => frame,
            Err(e) => return Acquisition::Fatal(SensorError::Io(e)),
        };

        let result = decode_co2_frame(&frame, self.sentinel_ppm);
        match &result {
            Acquisition::Degraded(_) => debug!(
                len = frame.len(),
                frame = ?frame,
                sentinel = self.sentinel_ppm,
                "CO2 response is not {} bytes, substituting sentinel",
                K30_RESPONSE_LEN
            ),
            Acquisition::Ok(ppm) => debug!(ppm, "CO2 read"),
            Acquisition::Fatal(_) => {}
        }
        result
    }

    /// Issue one environmental acquisition.
    ///
    /// A failure reuses the last good reading, or [`Environment::SENTINEL`]
    /// if there has not been one yet.
    pub fn read_environment(&mut self) -> Acquisition<Environment> {
        match self.environment.read() {
            Ok(environment) => {
                self.last_environment = Some(environment);
                Acquisition::Ok(environment)
            }
            Err(e) => {
                let substitute = self.last_environment.unwrap_or(Environment::SENTINEL);
                warn!(
                    error = %e,
                    last_known = self.last_environment.is_some(),
                    "Environmental read failed, substituting"
                );
                Acquisition::Degraded(substitute)
            }
        }
    }

    /// Acquire one raw sample from both sensors.
    ///
    /// Only a fatal transport failure is returned as an error.
    pub async fn acquire(&mut self) -> Result<RawSample, SensorError> {
        let (co2_ppm, co2_degraded) = match self.read_co2().await {
            Acquisition::Ok(ppm) => (ppm, false),
            Acquisition::Degraded(ppm) => (ppm, true),
            Acquisition::Fatal(e) => return Err(e),
        };

        let (environment, environment_degraded) = match self.read_environment() {
            Acquisition::Ok(env) => (env, false),
            Acquisition::Degraded(env) => (env, true),
            Acquisition::Fatal(e) => return Err(e),
        };

        Ok(RawSample {
            co2_ppm,
            environment,
            co2_degraded,
            environment_degraded,
        })
    }
}
