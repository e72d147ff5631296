//! Integration tests for the Prometheus exporter.
//!
//! These tests run the real pull endpoint and a fake push gateway over
//! loopback TCP.

use std::sync::Arc;
use std::time::Duration;

use airlog_exporter_prometheus::{
    GAUGES, GaugeSnapshot, HttpServer, MetricCollector, PushGateway, SharedCollector,
};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;

fn snapshot(co2: f64) -> GaugeSnapshot {
    GaugeSnapshot {
        co2_ppm: co2,
        temp_c: 21.0,
        pressure_mbar: 1012.0,
        humidity_perc: 51.0,
        heat_index: 68.877,
    }
}

/// Helper to parse Prometheus text format into (name, value) pairs.
fn parse_samples(body: &str) -> Vec<(String, f64)> {
    body.lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?.to_string();
            let value = parts.next()?.parse().ok()?;
            Some((name, value))
        })
        .collect()
}

#[tokio::test]
async fn test_scrape_over_http() {
    let collector: SharedCollector = Arc::new(MetricCollector::new());
    collector.publish(snapshot(410.0));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(collector.clone(), addr, "/metrics".to_string());
    let server_handle = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

    let client = reqwest::Client::new();
    let body = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let samples = parse_samples(&body);
    let names: Vec<&str> = samples.iter().map(|(n, _)| n.as_str()).collect();
    let expected: Vec<&str> = GAUGES.iter().map(|g| g.name).collect();
    assert_eq!(names, expected);
    assert_eq!(samples[0].1, 410.0);

    // A later window is visible on the next scrape.
    collector.publish(snapshot(999.0));
    let body = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("CO2_ppm 999"));

    shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server_handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[derive(Clone, Default)]
struct Received {
    pushes: Arc<Mutex<Vec<(String, String)>>>,
}

async fn accept_push(
    State(received): State<Received>,
    Path(job): Path<String>,
    body: String,
) -> StatusCode {
    received.pushes.lock().push((job, body));
    StatusCode::OK
}

async fn reject_push() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn spawn_gateway(router: Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_push_delivers_exposition_body() {
    let received = Received::default();
    let router = Router::new()
        .route("/metrics/job/:job", put(accept_push))
        .with_state(received.clone());
    let addr = spawn_gateway(router).await;

    let gateway =
        PushGateway::new(&addr.to_string(), "greenhouse", Duration::from_secs(2)).unwrap();
    gateway.push(&snapshot(512.0)).await.unwrap();

    let pushes = received.pushes.lock();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "greenhouse");
    assert!(pushes[0].1.contains("# TYPE CO2_ppm gauge"));
    assert!(pushes[0].1.contains("CO2_ppm 512"));
    assert!(pushes[0].1.contains("heat_index 68.877"));
}

#[tokio::test]
async fn test_push_non_success_status_is_error() {
    let router = Router::new().route("/metrics/job/:job", put(reject_push));
    let addr = spawn_gateway(router).await;

    let gateway = PushGateway::new(&addr.to_string(), "lab", Duration::from_secs(2)).unwrap();
    let err = gateway.push(&snapshot(400.0)).await.unwrap_err();

    assert!(err.to_string().contains("500"));
}
