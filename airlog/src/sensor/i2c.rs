//! BME280 environmental sensor on a Linux I2C bus.

use airlog_common::Environment;
use bme280::i2c::BME280;
use linux_embedded_hal::{Delay, I2cdev};
use tracing::info;

use super::{EnvironmentSource, SensorError};
use crate::config::EnvironmentSensorConfig;

pub struct Bme280Source {
    device: BME280<I2cdev>,
    delay: Delay,
}

impl Bme280Source {
    /// Open the bus and initialise the sensor.
    pub fn open(config: &EnvironmentSensorConfig) -> Result<Self, SensorError> {
        let open_error = |message: String| SensorError::Open {
            device: format!("{} @ 0x{:02x}", config.bus, config.address),
            message,
            hint: "check I2C is enabled and the user is in the 'i2c' group",
        };

        let bus = I2cdev::new(&config.bus).map_err(|e| open_error(e.to_string()))?;
        let mut device = BME280::new(bus, config.address);
        let mut delay = Delay;

        device
            .init(&mut delay)
            .map_err(|e| open_error(format!("{:?}", e)))?;

        info!(
            bus = %config.bus,
            address = config.address,
            "Initialised BME280"
        );

        Ok(Self { device, delay })
    }
}

impl EnvironmentSource for Bme280Source {
    fn read(&mut self) -> Result<Environment, SensorError> {
        let m = self
            .device
            .measure(&mut self.delay)
            .map_err(|e| SensorError::Environment(format!("{:?}", e)))?;

        // The driver reports pascals.
        Ok(Environment::new(
            f64::from(m.temperature),
            f64::from(m.pressure) / 100.0,
            f64::from(m.humidity),
        ))
    }
}
