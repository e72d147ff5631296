//! Output fan-out for completed windows.
//!
//! Each enabled sink receives every [`AggregatedReading`]. A failing sink is
//! logged and reported but never stops the others or the sampling loop.

mod console;
mod file;
pub mod push_failure;

use std::fmt;
use std::path::{Path, PathBuf};

use airlog_common::AggregatedReading;
use airlog_exporter_prometheus::{
    GaugeSnapshot, MetricsMode, PushError, PushGateway, SharedCollector,
};
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SinkConfig;

pub use console::{ConsoleSink, format_block};
pub use file::{CURRENT_LINK, FileSink};
pub use push_failure::{PUSH_FAILURE_FILE, PushFailureLog};

/// Error type for sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Console write failed: {0}")]
    Console(#[source] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Push(#[from] PushError),
}

impl SinkError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Identifies a sink in a [`DispatchReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    File,
    Metrics,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Console => write!(f, "console"),
            SinkKind::File => write!(f, "file"),
            SinkKind::Metrics => write!(f, "metrics"),
        }
    }
}

/// Which sinks ran and which failed for one window.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<SinkKind>,
    pub failed: Vec<SinkKind>,
}

impl DispatchReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, kind: SinkKind, result: Result<(), SinkError>) {
        match result {
            Ok(()) => self.delivered.push(kind),
            Err(e) => {
                warn!(sink = %kind, error = %e, "Sink failed");
                self.failed.push(kind);
            }
        }
    }
}

/// Publishes gauges into the shared collector and optionally pushes them.
pub struct MetricsSink {
    collector: SharedCollector,
    push: Option<(PushGateway, PushFailureLog)>,
}

impl MetricsSink {
    /// Publish only; the gauges are served by the pull endpoint.
    pub fn pull(collector: SharedCollector) -> Self {
        Self {
            collector,
            push: None,
        }
    }

    /// Publish, then push every window; rejected pushes go to `failures`.
    pub fn push(
        collector: SharedCollector,
        gateway: PushGateway,
        failures: PushFailureLog,
    ) -> Self {
        Self {
            collector,
            push: Some((gateway, failures)),
        }
    }

    pub async fn write(&self, reading: &AggregatedReading) -> Result<(), SinkError> {
        let snapshot = GaugeSnapshot::from(reading);
        self.collector.publish(snapshot);

        let Some((gateway, failures)) = &self.push else {
            return Ok(());
        };

        if let Err(e) = gateway.push(&snapshot).await {
            self.collector.record_push_failure();
            failures.record(&reading.timestamp, &e, reading);
            return Err(e.into());
        }

        Ok(())
    }
}

/// Routes each completed window to the enabled sinks.
pub struct SinkRouter {
    console: Option<ConsoleSink>,
    file: Option<FileSink>,
    metrics: Option<MetricsSink>,
}

impl SinkRouter {
    /// Build the sinks enabled in `config`. `started` fixes the data file name.
    pub fn new(
        config: &SinkConfig,
        collector: SharedCollector,
        started: &DateTime<Local>,
    ) -> Result<Self, SinkError> {
        let metrics = match config.metrics {
            MetricsMode::Disable => None,
            MetricsMode::Pull => Some(MetricsSink::pull(collector)),
            MetricsMode::Push => {
                let gateway = PushGateway::new(&config.gateway, &config.job, config.push_timeout)?;
                debug!(url = %gateway.url(), "Pushing gauges");
                Some(MetricsSink::push(
                    collector,
                    gateway,
                    PushFailureLog::new(&config.data_dir),
                ))
            }
        };

        let file = if config.file {
            let mut sink = FileSink::new(config.data_dir.clone(), started);
            if let Err(e) = sink.prepare() {
                warn!(error = %e, "Data file not ready, retrying on first window");
            }
            Some(sink)
        } else {
            None
        };

        Ok(Self {
            console: config.console.then(ConsoleSink::new),
            file,
            metrics,
        })
    }

    /// Sinks that will receive each window.
    pub fn enabled(&self) -> Vec<SinkKind> {
        let mut kinds = Vec::new();
        if self.console.is_some() {
            kinds.push(SinkKind::Console);
        }
        if self.file.is_some() {
            kinds.push(SinkKind::File);
        }
        if self.metrics.is_some() {
            kinds.push(SinkKind::Metrics);
        }
        kinds
    }

    /// Deliver one window to every enabled sink.
    pub async fn dispatch(&mut self, reading: &AggregatedReading) -> DispatchReport {
        let mut report = DispatchReport::default();

        if let Some(console) = &self.console {
            report.record(SinkKind::Console, console.write(reading));
        }

        if let Some(file) = &mut self.file {
            report.record(SinkKind::File, file.write(reading));
        }

        if let Some(metrics) = &self.metrics {
            report.record(SinkKind::Metrics, metrics.write(reading).await);
        }

        report
    }
}
