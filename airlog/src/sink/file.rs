//! Append-only data file with a `current` symlink.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use airlog_common::AggregatedReading;
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::SinkError;

/// Name of the symlink that points at the active data file.
pub const CURRENT_LINK: &str = "current";

/// Appends one line per window to a file named after the process start time.
#[derive(Debug)]
pub struct FileSink {
    data_dir: PathBuf,
    file_name: String,
    linked: bool,
}

impl FileSink {
    /// The file name is fixed here. Call [`prepare`](Self::prepare) to create it.
    pub fn new(data_dir: impl Into<PathBuf>, started: &DateTime<Local>) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_name: started.format("%Y-%m-%d-%H:%M.txt").to_string(),
            linked: false,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }

    pub fn link_path(&self) -> PathBuf {
        self.data_dir.join(CURRENT_LINK)
    }

    /// Append one line. A `current` link that cannot be refreshed only warns.
    pub fn write(&mut self, reading: &AggregatedReading) -> Result<(), SinkError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| SinkError::io(&self.data_dir, e))?;

        let path = self.path();
        let line = format!("{}{}\n", reading.stamp(), reading.metric_line());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| SinkError::io(&path, e))?;

        debug!(path = %path.display(), "Appended window");

        if !self.linked {
            if let Err(e) = self.refresh_link() {
                warn!(error = %e, "Failed to update current data file link");
            }
        }

        Ok(())
    }

    /// Create the data directory and repoint `current`.
    pub fn prepare(&mut self) -> Result<(), SinkError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| SinkError::io(&self.data_dir, e))?;
        self.refresh_link()?;

        info!(path = %self.path().display(), "Writing data file");
        Ok(())
    }

    fn refresh_link(&mut self) -> Result<(), SinkError> {
        let link = self.link_path();
        replace_symlink(Path::new(&self.file_name), &link).map_err(|e| SinkError::io(&link, e))?;
        self.linked = true;
        Ok(())
    }
}

/// Remove `link` if present, then point it at `target`.
#[cfg(unix)]
fn replace_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    match fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn replace_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(co2: f64) -> AggregatedReading {
        AggregatedReading {
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 13, 7, 42).unwrap(),
            co2_ppm_avg: co2,
            temperature_c_avg: 21.0,
            temperature_f_avg: 69.8,
            pressure_hpa_avg: 1012.0,
            humidity_pct_avg: 51.0,
            heat_index_f: 68.877,
            samples: 3,
            degraded_samples: 0,
        }
    }

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 13, 7, 0).unwrap()
    }

    #[test]
    fn test_file_named_after_start() {
        let sink = FileSink::new("/tmp/airlog", &started());
        assert_eq!(sink.path(), PathBuf::from("/tmp/airlog/2024-05-01-13:07.txt"));
    }

    #[test]
    fn test_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("data"), &started());

        sink.write(&reading(410.0)).unwrap();
        sink.write(&reading(420.0)).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(
            content,
            "[2024-05-01 13:07:42] CO2: 410.00, Temp: 69.80, Pres: 1012.00, Humid: 51.00\n\
             [2024-05-01 13:07:42] CO2: 420.00, Temp: 69.80, Pres: 1012.00, Humid: 51.00\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_current_link_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join(CURRENT_LINK);
        std::os::unix::fs::symlink("stale.txt", &link).unwrap();

        let mut sink = FileSink::new(dir.path(), &started());
        sink.write(&reading(410.0)).unwrap();

        assert_eq!(
            fs::read_link(&link).unwrap(),
            PathBuf::from("2024-05-01-13:07.txt")
        );
        assert!(fs::read_to_string(&link).unwrap().contains("CO2: 410.00"));
    }

    #[cfg(unix)]
    #[test]
    fn test_blocked_link_still_appends() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join(CURRENT_LINK);
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "").unwrap();

        let mut sink = FileSink::new(dir.path(), &started());
        assert!(sink.prepare().is_err());
        for co2 in [410.0, 420.0, 430.0] {
            sink.write(&reading(co2)).unwrap();
        }

        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("CO2: 430.00"));
        assert!(blocked.is_dir());
    }

    #[test]
    fn test_unwritable_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut sink = FileSink::new(blocker.join("data"), &started());
        assert!(sink.write(&reading(410.0)).is_err());
    }
}
