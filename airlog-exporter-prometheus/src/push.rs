//! Push-gateway delivery of gauge snapshots.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use crate::collector::{GaugeSnapshot, render_snapshot};

/// Errors from a single push attempt.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Failed to build push client: {0}")]
    Client(String),

    #[error("Invalid push gateway {gateway}: {message}")]
    InvalidUrl { gateway: String, message: String },

    #[error("Push to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Push gateway {url} returned {status}")]
    Status { url: String, status: u16 },
}

/// Client for a Prometheus push gateway.
///
/// Every push replaces the metrics grouped under the configured job.
#[derive(Debug, Clone)]
pub struct PushGateway {
    client: reqwest::Client,
    url: Url,
}

impl PushGateway {
    /// Create a client for `gateway` (`host:port`, or a full `http://` URL).
    pub fn new(gateway: &str, job: &str, timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: push_url(gateway, job)?,
        })
    }

    /// The grouping URL pushes are sent to.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Deliver one snapshot synchronously from the caller's point of view.
    pub async fn push(&self, snapshot: &GaugeSnapshot) -> Result<(), PushError> {
        let body = render_snapshot(snapshot);

        let response = self
            .client
            .put(self.url.clone())
            .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|source| PushError::Transport {
                url: self.url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Status {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(url = %self.url, "Pushed gauges");
        Ok(())
    }
}

/// Build the push-gateway grouping URL for a job.
///
/// The job becomes a single path segment, so `/` and spaces are percent-encoded.
pub fn push_url(gateway: &str, job: &str) -> Result<Url, PushError> {
    let base = gateway.trim_end_matches('/');
    let base = if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("http://{}", base)
    };

    let invalid = |message: String| PushError::InvalidUrl {
        gateway: gateway.to_string(),
        message,
    };

    let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base URL".to_string()))?
        .pop_if_empty()
        .extend(["metrics", "job", job]);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_url_host_port() {
        assert_eq!(
            push_url("localhost:9091", "raspberrypi").unwrap().as_str(),
            "http://localhost:9091/metrics/job/raspberrypi"
        );
    }

    #[test]
    fn test_push_url_full_url() {
        assert_eq!(
            push_url("https://push.example.org/", "lab").unwrap().as_str(),
            "https://push.example.org/metrics/job/lab"
        );
    }

    #[test]
    fn test_push_url_escapes_job() {
        assert_eq!(
            push_url("gw:9091", "green house/1").unwrap().as_str(),
            "http://gw:9091/metrics/job/green%20house%2F1"
        );
    }

    #[test]
    fn test_push_url_rejects_malformed_gateway() {
        let err = push_url("gw:notaport", "lab").unwrap_err();
        assert!(matches!(err, PushError::InvalidUrl { .. }));
        assert!(PushGateway::new("gw:notaport", "lab", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_push_to_unreachable_gateway_fails() {
        // Port 1 on loopback is not listening in any sane test environment.
        let gateway =
            PushGateway::new("127.0.0.1:1", "test", Duration::from_millis(500)).unwrap();
        let snapshot = GaugeSnapshot {
            co2_ppm: 400.0,
            temp_c: 20.0,
            pressure_mbar: 1013.0,
            humidity_perc: 50.0,
            heat_index: 67.0,
        };

        let err = gateway.push(&snapshot).await.unwrap_err();
        assert!(matches!(err, PushError::Transport { .. }));
        assert!(err.to_string().contains("127.0.0.1:1"));
    }
}
