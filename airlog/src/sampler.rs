//! The sampling loop: acquire, aggregate, dispatch, repeat.

use std::fmt;
use std::time::Duration;

use airlog_common::{AggregatedReading, RawSample};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::aggregator::WindowAggregator;
use crate::config::WindowConfig;
use crate::sensor::{EnvironmentSource, FrameTransport, SensorError, SensorReader};
use crate::sink::{DispatchReport, SinkRouter};

/// Where the loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Sampling,
    Aggregating,
    Dispatching,
    Shutdown,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Init => "init",
            LoopState::Sampling => "sampling",
            LoopState::Aggregating => "aggregating",
            LoopState::Dispatching => "dispatching",
            LoopState::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// One completed window and what happened to it.
#[derive(Debug, Clone)]
pub struct WindowOutcome {
    pub reading: AggregatedReading,
    pub report: DispatchReport,
}

/// Drives the sensors on a fixed cadence and routes every window to the sinks.
pub struct SamplingLoop<T, E> {
    reader: SensorReader<T, E>,
    aggregator: WindowAggregator,
    sinks: SinkRouter,
    interval: Duration,
    state: LoopState,
    degraded_streak: u32,
}

impl<T: FrameTransport, E: EnvironmentSource> SamplingLoop<T, E> {
    pub fn new(reader: SensorReader<T, E>, window: &WindowConfig, sinks: SinkRouter) -> Self {
        Self {
            reader,
            aggregator: WindowAggregator::new(window),
            sinks,
            interval: window.sample_interval(),
            state: LoopState::Init,
            degraded_streak: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until `shutdown` becomes true, checked between windows.
    ///
    /// A fatal sensor error ends the loop with that error.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<(), SensorError> {
        info!(
            samples_per_window = self.aggregator.samples_per_window(),
            interval_secs = self.interval.as_secs_f64(),
            sinks = ?self.sinks.enabled(),
            "Sampling started"
        );

        while !*shutdown.borrow() {
            self.run_window().await?;
        }

        self.transition(LoopState::Shutdown);
        println!("Goodbye");
        Ok(())
    }

    /// Run exactly `count` windows.
    pub async fn run_windows(&mut self, count: usize) -> Result<Vec<WindowOutcome>, SensorError> {
        let mut outcomes = Vec::with_capacity(count);
        for _ in 0..count {
            outcomes.push(self.run_window().await?);
        }
        Ok(outcomes)
    }

    /// Acquire one full window of samples, then dispatch the average.
    pub async fn run_window(&mut self) -> Result<WindowOutcome, SensorError> {
        self.transition(LoopState::Sampling);

        let reading = loop {
            let sample = match self.reader.acquire().await {
                Ok(sample) => sample,
                Err(e) => {
                    self.transition(LoopState::Shutdown);
                    return Err(e);
                }
            };
            self.track_degraded(&sample);

            tokio::time::sleep(self.interval).await;

            if let Some(reading) = self.aggregator.push(sample) {
                self.transition(LoopState::Aggregating);
                break reading;
            }
        };

        self.transition(LoopState::Dispatching);
        let report = self.sinks.dispatch(&reading).await;
        if !report.is_ok() {
            debug!(failed = ?report.failed, "Window dispatched with failures");
        }

        Ok(WindowOutcome { reading, report })
    }

    fn track_degraded(&mut self, sample: &RawSample) {
        if sample.co2_degraded {
            self.degraded_streak += 1;
            warn!(
                consecutive = self.degraded_streak,
                "Malformed CO2 response, using sentinel"
            );
        } else if self.degraded_streak > 0 {
            info!(after = self.degraded_streak, "CO2 sensor recovered");
            self.degraded_streak = 0;
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Loop state");
            self.state = next;
        }
    }
}
