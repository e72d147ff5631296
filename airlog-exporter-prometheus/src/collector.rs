//! Gauge storage shared between the sampling loop and the metrics endpoint.

use std::fmt::Write;
use std::sync::Arc;

use airlog_common::AggregatedReading;
use parking_lot::RwLock;
use tracing::trace;

/// A gauge exported for every window: name and help text.
pub struct GaugeSpec {
    pub name: &'static str,
    pub help: &'static str,
}

/// Gauges exported for every window, in exposition order.
pub const GAUGES: [GaugeSpec; 5] = [
    GaugeSpec {
        name: "CO2_ppm",
        help: "Carbon Dioxide in parts per million",
    },
    GaugeSpec {
        name: "Temp_C",
        help: "Temperature in C",
    },
    GaugeSpec {
        name: "pressure_mbar",
        help: "Barometric pressure in millibars",
    },
    GaugeSpec {
        name: "humidity_perc",
        help: "Humidity, percent",
    },
    GaugeSpec {
        name: "heat_index",
        help: "Heat index in F",
    },
];

/// An immutable set of gauge values taken from one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeSnapshot {
    pub co2_ppm: f64,
    pub temp_c: f64,
    pub pressure_mbar: f64,
    pub humidity_perc: f64,
    pub heat_index: f64,
}

impl GaugeSnapshot {
    /// Values in the same order as [`GAUGES`].
    pub fn values(&self) -> [f64; 5] {
        [
            self.co2_ppm,
            self.temp_c,
            self.pressure_mbar,
            self.humidity_perc,
            self.heat_index,
        ]
    }

    /// Look up a gauge by its exported name.
    pub fn get(&self, name: &str) -> Option<f64> {
        GAUGES
            .iter()
            .zip(self.values())
            .find(|(spec, _)| spec.name == name)
            .map(|(_, value)| value)
    }
}

impl From<&AggregatedReading> for GaugeSnapshot {
    fn from(reading: &AggregatedReading) -> Self {
        Self {
            co2_ppm: reading.co2_ppm_avg,
            temp_c: reading.temperature_c_avg,
            pressure_mbar: reading.pressure_hpa_avg,
            humidity_perc: reading.humidity_pct_avg,
            heat_index: reading.heat_index_f,
        }
    }
}

/// Collector statistics.
#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    /// Windows published into the collector.
    pub windows_published: u64,
    /// Push attempts that failed.
    pub pushes_failed: u64,
}

/// Latest gauge values, written by the sink router and read by scrapes.
///
/// Each window replaces the whole snapshot, so a reader sees either the
/// previous set or the new one, never a mix.
#[derive(Default)]
pub struct MetricCollector {
    current: RwLock<Option<Arc<GaugeSnapshot>>>,
    stats: RwLock<CollectorStats>,
}

impl MetricCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in the gauges for a completed window.
    pub fn publish(&self, snapshot: GaugeSnapshot) {
        trace!(?snapshot, "Publishing gauge snapshot");
        *self.current.write() = Some(Arc::new(snapshot));
        self.stats.write().windows_published += 1;
    }

    /// The most recently published snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<GaugeSnapshot>> {
        self.current.read().clone()
    }

    /// Count a failed push.
    pub fn record_push_failure(&self) {
        self.stats.write().pushes_failed += 1;
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }

    /// Render the current gauges in Prometheus text exposition format.
    ///
    /// Renders nothing until the first window has been published.
    pub fn render(&self) -> String {
        match self.snapshot() {
            Some(snapshot) => render_snapshot(&snapshot),
            None => String::new(),
        }
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<MetricCollector>;

/// Render one snapshot in Prometheus text exposition format.
pub fn render_snapshot(snapshot: &GaugeSnapshot) -> String {
    let mut output = String::with_capacity(GAUGES.len() * 96);

    for (spec, value) in GAUGES.iter().zip(snapshot.values()) {
        writeln!(output, "# HELP {} {}", spec.name, spec.help).ok();
        writeln!(output, "# TYPE {} gauge", spec.name).ok();
        writeln!(output, "{} {}", spec.name, format_value(value)).ok();
    }

    output
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
