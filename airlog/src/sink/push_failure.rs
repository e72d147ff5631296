//! Local record of windows the push gateway did not accept.

use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use airlog_common::{AggregatedReading, format_stamp};
use chrono::{DateTime, Local};
use tracing::warn;

/// File name of the push failure log inside the data directory.
pub const PUSH_FAILURE_FILE: &str = "prometheus-push-failed-data.txt";

#[derive(Debug, Clone)]
pub struct PushFailureLog {
    path: PathBuf,
}

impl PushFailureLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(PUSH_FAILURE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[timestamp] <error> | <metric line>`. Best effort.
    pub fn record(
        &self,
        timestamp: &DateTime<Local>,
        error: &dyn Display,
        reading: &AggregatedReading,
    ) {
        let line = format!(
            "{}{} | {}\n",
            format_stamp(timestamp),
            error,
            reading.metric_line()
        );

        if let Err(e) = self.append(&line) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to record push failure"
            );
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}
