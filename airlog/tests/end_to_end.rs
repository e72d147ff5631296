//! End-to-end tests for the sampling loop.
//!
//! The CO2 sensor is simulated behind the real serial transport with an
//! in-memory duplex stream; the push gateway is a local axum server.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use airlog::config::{SinkConfig, WindowConfig};
use airlog::SamplingLoop;
use airlog::sensor::{
    EnvironmentSource, K30_READ_CO2, SensorError, SensorReader, SerialTransport,
};
use airlog::sink::{CURRENT_LINK, PUSH_FAILURE_FILE, SinkKind, SinkRouter};
use airlog_common::Environment;
use airlog_exporter_prometheus::{MetricCollector, MetricsMode, SharedCollector};
use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::put;
use chrono::Local;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::net::TcpListener;

/// Simulated K30: answers each read command with the next scripted frame.
fn spawn_k30(mut port: DuplexStream, frames: Vec<Vec<u8>>) {
    tokio::spawn(async move {
        for frame in frames {
            let mut command = [0u8; 7];
            if port.read_exact(&mut command).await.is_err() {
                return;
            }
            assert_eq!(command, K30_READ_CO2);
            if port.write_all(&frame).await.is_err() {
                return;
            }
        }
        // Hold the port open so a missing reply times out instead of hitting EOF.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });
}

fn frame(ppm: u16) -> Vec<u8> {
    vec![0xFE, 0x44, 0x02, (ppm / 255) as u8, (ppm % 255) as u8, 0x00, 0x00]
}

struct FixedEnvironment(VecDeque<Environment>);

impl FixedEnvironment {
    fn cycle(n: usize) -> Self {
        Self(
            (0..n)
                .map(|i| {
                    let k = (i % 3) as f64;
                    Environment::new(20.0 + k, 1013.0 - k, 50.0 + k)
                })
                .collect(),
        )
    }
}

impl EnvironmentSource for FixedEnvironment {
    fn read(&mut self) -> Result<Environment, SensorError> {
        self.0
            .pop_front()
            .ok_or_else(|| SensorError::Environment("no more readings".into()))
    }
}

fn reader(frames: Vec<Vec<u8>>) -> SensorReader<SerialTransport<DuplexStream>, FixedEnvironment> {
    let n = frames.len();
    let (ours, theirs) = duplex(64);
    spawn_k30(theirs, frames);
    let transport =
        SerialTransport::new(ours, Duration::from_millis(1), Duration::from_millis(200));
    SensorReader::new(transport, FixedEnvironment::cycle(n), 19666)
}

fn window(samples: usize) -> WindowConfig {
    WindowConfig {
        window_minutes: samples as f64 / 12.0,
        sample_interval_secs: 0.0,
        exclude_degraded_co2: false,
    }
}

fn sink_config(dir: &Path, metrics: MetricsMode, gateway: String) -> SinkConfig {
    SinkConfig {
        console: true,
        file: true,
        data_dir: dir.to_path_buf(),
        metrics,
        job: "greenhouse".to_string(),
        gateway,
        push_timeout: Duration::from_secs(2),
    }
}

type Received = Arc<Mutex<Vec<(String, String)>>>;

#[derive(Clone)]
struct Gateway {
    received: Received,
    status: StatusCode,
}

async fn accept_push(
    State(gateway): State<Gateway>,
    UrlPath(job): UrlPath<String>,
    body: String,
) -> StatusCode {
    gateway.received.lock().unwrap().push((job, body));
    gateway.status
}

async fn fake_gateway(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .route("/metrics/job/:job", put(accept_push))
        .with_state(Gateway {
            received: received.clone(),
            status,
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr.to_string(), received)
}

#[tokio::test]
async fn test_windows_reach_every_sink() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, received) = fake_gateway(StatusCode::OK).await;
    let collector: SharedCollector = Arc::new(MetricCollector::new());

    let sinks = SinkRouter::new(
        &sink_config(dir.path(), MetricsMode::Push, gateway),
        collector.clone(),
        &Local::now(),
    )
    .unwrap();
    let frames = [400, 410, 420, 500, 500, 500].map(frame).to_vec();
    let mut sampler = SamplingLoop::new(reader(frames), &window(3), sinks);

    let outcomes = sampler.run_windows(2).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(outcome.report.is_ok());
        assert_eq!(
            outcome.report.delivered,
            vec![SinkKind::Console, SinkKind::File, SinkKind::Metrics]
        );
    }
    assert!((outcomes[0].reading.co2_ppm_avg - 410.0).abs() < 1e-9);
    assert!((outcomes[1].reading.co2_ppm_avg - 500.0).abs() < 1e-9);

    let pushes = received.lock().unwrap().clone();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0].0, "greenhouse");
    assert!(pushes[0].1.contains("CO2_ppm 410"));
    assert!(pushes[1].1.contains("CO2_ppm 500"));

    let data = std::fs::read_to_string(dir.path().join(CURRENT_LINK)).unwrap();
    let lines: Vec<_> = data.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("CO2: 410.00, Temp: 69.80, Pres: 1012.00, Humid: 51.00"));
    assert!(lines[1].starts_with('['));

    assert!(!dir.path().join(PUSH_FAILURE_FILE).exists());
    assert_eq!(collector.stats().windows_published, 2);
}

#[tokio::test]
async fn test_rejected_push_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, received) = fake_gateway(StatusCode::INTERNAL_SERVER_ERROR).await;
    let collector: SharedCollector = Arc::new(MetricCollector::new());

    let sinks = SinkRouter::new(
        &sink_config(dir.path(), MetricsMode::Push, gateway),
        collector.clone(),
        &Local::now(),
    )
    .unwrap();
    let frames = [400, 410, 420].map(frame).to_vec();
    let mut sampler = SamplingLoop::new(reader(frames), &window(3), sinks);

    let outcome = sampler.run_window().await.unwrap();

    assert_eq!(outcome.report.failed, vec![SinkKind::Metrics]);
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(collector.stats().pushes_failed, 1);

    let failures = std::fs::read_to_string(dir.path().join(PUSH_FAILURE_FILE)).unwrap();
    assert_eq!(failures.lines().count(), 1);
    assert!(failures.contains("500"));
    assert!(failures.contains("| CO2: 410.00, Temp: 69.80, Pres: 1012.00, Humid: 51.00"));
}

#[tokio::test]
async fn test_silent_sensor_degrades_to_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let collector: SharedCollector = Arc::new(MetricCollector::new());

    let mut config = sink_config(dir.path(), MetricsMode::Pull, String::new());
    config.console = false;
    let sinks = SinkRouter::new(&config, collector.clone(), &Local::now()).unwrap();

    // Second reply is truncated; the simulated device then stays silent.
    let frames = vec![frame(400), vec![0xFE, 0x44, 0x02]];
    let (ours, theirs) = duplex(64);
    spawn_k30(theirs, frames);
    let transport =
        SerialTransport::new(ours, Duration::from_millis(1), Duration::from_millis(100));
    let reader = SensorReader::new(transport, FixedEnvironment::cycle(2), 19666);

    let mut sampler = SamplingLoop::new(reader, &window(2), sinks);
    let outcome = sampler.run_window().await.unwrap();

    assert!((outcome.reading.co2_ppm_avg - (400.0 + 19666.0) / 2.0).abs() < 1e-9);
    assert_eq!(outcome.reading.degraded_samples, 1);

    let snapshot = collector.snapshot().unwrap();
    assert_eq!(snapshot.get("CO2_ppm"), Some((400.0 + 19666.0) / 2.0));
}
