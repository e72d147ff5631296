//! Fixed-size window averaging.

use airlog_common::{AggregatedReading, RawSample, celsius_to_fahrenheit, heat_index_f};
use chrono::{DateTime, Local};
use tracing::debug;

use crate::config::WindowConfig;

/// Accumulates raw samples and emits one [`AggregatedReading`] per full window.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    samples_per_window: usize,
    exclude_degraded_co2: bool,
    count: usize,
    degraded: usize,
    co2_sum: f64,
    co2_good_sum: f64,
    co2_good_count: usize,
    temperature_sum: f64,
    pressure_sum: f64,
    humidity_sum: f64,
}

impl WindowAggregator {
    pub fn new(config: &WindowConfig) -> Self {
        Self::with_size(config.samples_per_window(), config.exclude_degraded_co2)
    }

    pub fn with_size(samples_per_window: usize, exclude_degraded_co2: bool) -> Self {
        Self {
            samples_per_window: samples_per_window.max(1),
            exclude_degraded_co2,
            count: 0,
            degraded: 0,
            co2_sum: 0.0,
            co2_good_sum: 0.0,
            co2_good_count: 0,
            temperature_sum: 0.0,
            pressure_sum: 0.0,
            humidity_sum: 0.0,
        }
    }

    pub fn samples_per_window(&self) -> usize {
        self.samples_per_window
    }

    /// Samples accumulated in the current window.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add a sample; returns the window's reading when it completes.
    pub fn push(&mut self, sample: RawSample) -> Option<AggregatedReading> {
        self.push_at(sample, Local::now())
    }

    /// Like [`push`](Self::push) with an explicit window-close time.
    pub fn push_at(
        &mut self,
        sample: RawSample,
        timestamp: DateTime<Local>,
    ) -> Option<AggregatedReading> {
        let co2 = f64::from(sample.co2_ppm);
        self.co2_sum += co2;
        if !sample.co2_degraded {
            self.co2_good_sum += co2;
            self.co2_good_count += 1;
        }
        self.temperature_sum += sample.environment.temperature_c;
        self.pressure_sum += sample.environment.pressure_hpa;
        self.humidity_sum += sample.environment.humidity_pct;
        if sample.is_degraded() {
            self.degraded += 1;
        }
        self.count += 1;

        if self.count < self.samples_per_window {
            return None;
        }

        let reading = self.close(timestamp);
        self.reset();
        Some(reading)
    }

    fn close(&self, timestamp: DateTime<Local>) -> AggregatedReading {
        let n = self.count as f64;

        let co2_ppm_avg = if self.exclude_degraded_co2 && self.co2_good_count > 0 {
            self.co2_good_sum / self.co2_good_count as f64
        } else {
            // Degraded reads stay in the mean unless excluded; an all-degraded
            // window reports the sentinel either way.
            self.co2_sum / n
        };

        let temperature_c_avg = self.temperature_sum / n;
        let temperature_f_avg = celsius_to_fahrenheit(temperature_c_avg);
        let humidity_pct_avg = self.humidity_sum / n;

        let reading = AggregatedReading {
            timestamp,
            co2_ppm_avg,
            temperature_c_avg,
            temperature_f_avg,
            pressure_hpa_avg: self.pressure_sum / n,
            humidity_pct_avg,
            heat_index_f: heat_index_f(temperature_f_avg, humidity_pct_avg),
            samples: self.count,
            degraded_samples: self.degraded,
        };

        debug!(
            samples = reading.samples,
            degraded = reading.degraded_samples,
            co2 = reading.co2_ppm_avg,
            "Window closed"
        );

        reading
    }

    fn reset(&mut self) {
        *self = Self::with_size(self.samples_per_window, self.exclude_degraded_co2);
    }
}
