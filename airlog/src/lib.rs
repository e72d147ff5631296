//! CO2 and environment logger.
//!
//! Samples a K30 CO2 analyzer over serial and a BME280 over I2C, averages
//! the readings over fixed windows, and hands every window to the enabled
//! sinks: console, data file, and Prometheus (pull or push).
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐   console
//! │ SensorReader │──>│ WindowAggregator │──>│  SinkRouter  │──> file
//! │ (K30/BME280) │   │  (mean per win)  │   │              │   metrics
//! └──────────────┘   └──────────────────┘   └──────────────┘
//! ```
//!
//! The [`sampler::SamplingLoop`] drives the whole cycle on the main task.

pub mod aggregator;
pub mod config;
pub mod sampler;
pub mod sensor;
pub mod sink;

pub use aggregator::WindowAggregator;
pub use config::{ConfigError, LoggerConfig, SinkConfig};
pub use sampler::{LoopState, SamplingLoop, WindowOutcome};
pub use sensor::{
    Acquisition, EnvironmentSource, FrameTransport, SensorError, SensorReader, SerialTransport,
};
pub use sink::{DispatchReport, SinkError, SinkKind, SinkRouter};
