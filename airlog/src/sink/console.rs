//! Human-readable window output on stdout.

use std::io::Write;

use airlog_common::AggregatedReading;

use super::SinkError;

/// Prints one block per window.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, reading: &AggregatedReading) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        out.write_all(format_block(reading).as_bytes())
            .and_then(|_| out.flush())
            .map_err(SinkError::Console)
    }
}

/// Render the console block for a window. Temperature is in Fahrenheit.
pub fn format_block(reading: &AggregatedReading) -> String {
    format!(
        "{}\nCO2: {:.2}\nTemp: {:.2}\nHeat Index: {:.2}\nPres: {:.2}\nHumidity: {:.2}\n\n",
        reading.stamp(),
        reading.co2_ppm_avg,
        reading.temperature_f_avg,
        reading.heat_index_f,
        reading.pressure_hpa_avg,
        reading.humidity_pct_avg,
    )
}
