//! Prometheus export for airlog readings.
//!
//! Every completed window is turned into a [`GaugeSnapshot`] and swapped into
//! the shared [`MetricCollector`]. From there it is either scraped or pushed:
//!
//! ```text
//! ┌────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Sink router   │────>│    Collector    │────>│   HTTP Server   │  pull
//! │ (per window)   │     │   (snapshot)    │     │   (/metrics)    │
//! └────────────────┘     └─────────────────┘     └─────────────────┘
//!                                 │               ┌─────────────────┐
//!                                 └──────────────>│  Push gateway   │  push
//!                                                 └─────────────────┘
//! ```
//!
//! # Configuration
//!
//! See [`config::PrometheusConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod http;
pub mod push;

pub use collector::{GAUGES, GaugeSnapshot, MetricCollector, SharedCollector};
pub use config::{ConfigError, MetricsMode, PrometheusConfig};
pub use http::HttpServer;
pub use push::{PushError, PushGateway};
