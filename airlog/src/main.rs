//! CO2 and environment logger.
//!
//! Samples a K30 and a BME280, averages each window, and writes the result
//! to the console, a data file and Prometheus.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use airlog::config::LoggerConfig;
use airlog::sampler::SamplingLoop;
use airlog::sensor::{self, SensorReader, SerialTransport};
use airlog::sink::SinkRouter;
use airlog_exporter_prometheus::{HttpServer, MetricCollector, MetricsMode};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Log CO2, temperature, pressure and humidity readings.
#[derive(Parser, Debug)]
#[command(name = "airlog")]
#[command(about = "Logs K30 CO2 and BME280 readings to console, file and Prometheus")]
#[command(version)]
struct Args {
    /// Do not print readings to the console
    #[arg(short = 'c', long = "console")]
    no_console: bool,

    /// Do not write readings to the data file
    #[arg(short = 'f', long = "file")]
    no_file: bool,

    /// Prometheus export mode
    #[arg(short = 'p', long = "prom", value_enum)]
    prom: Option<MetricsMode>,

    /// Job name for pushed metrics (default: host name)
    #[arg(short = 'j', long)]
    job: Option<String>,

    /// Path to configuration file (JSON5 format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Push gateway address (host:port)
    #[arg(long)]
    gateway: Option<String>,

    /// Directory for data files
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl Args {
    /// Layer command line flags over the file configuration.
    fn apply(&self, config: &mut LoggerConfig) {
        if self.no_console {
            config.output.console = false;
        }
        if self.no_file {
            config.output.file = false;
        }
        if let Some(mode) = self.prom {
            config.prometheus.mode = mode;
        }
        if let Some(job) = &self.job {
            config.prometheus.job = Some(job.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(gateway) = &self.gateway {
            config.prometheus.gateway = gateway.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.output.data_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LoggerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => LoggerConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    airlog_common::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting airlog");
    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let co2 = SerialTransport::open(&config.sensors.co2)?;
    let environment = sensor::open_environment(&config.sensors.environment)?;
    let reader = SensorReader::new(co2, environment, config.sensors.co2.sentinel_ppm);

    let sink_config = config.sink_config();
    let collector = Arc::new(MetricCollector::new());
    let sinks = SinkRouter::new(&sink_config, collector.clone(), &chrono::Local::now())
        .context("Failed to set up outputs")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let server = if sink_config.metrics == MetricsMode::Pull {
        let addr: SocketAddr = config
            .prometheus
            .listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", config.prometheus.listen))?;
        let listener = bind_metrics_listener(addr).await?;
        let server = HttpServer::new(collector.clone(), addr, config.prometheus.path.clone());
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, rx).await {
                error!(error = %e, "Metrics endpoint failed");
            }
        }))
    } else {
        None
    };

    if sink_config.metrics == MetricsMode::Push {
        info!(gateway = %sink_config.gateway, job = %sink_config.job, "Pushing metrics");
    }

    spawn_signal_handler(shutdown_tx.clone());

    let mut sampler = SamplingLoop::new(reader, &config.window, sinks);
    let result = sampler.run(shutdown_rx).await;

    shutdown_tx.send_replace(true);
    if let Some(handle) = server {
        if tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .is_err()
        {
            warn!("Metrics endpoint did not stop in time");
        }
    }

    let stats = collector.stats();
    info!(
        windows = stats.windows_published,
        push_failures = stats.pushes_failed,
        "airlog stopped"
    );

    result.context("Sensor failure")
}

/// Bind the pull endpoint up front so a busy port fails at startup.
async fn bind_metrics_listener(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint to {}", addr))
}

/// Flip the shutdown flag on Ctrl+C or SIGTERM.
fn spawn_signal_handler(shutdown: Arc<watch::Sender<bool>>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, stopping after the current window");
        shutdown.send_replace(true);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to listen for SIGTERM");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        }
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
}
