//! Binsight service binary.
//!
//! Wires the configuration, logging and metrics layers around the core
//! pipeline and drives it from newline-delimited JSON reading payloads on
//! stdin. Modes:
//!
//! - `ingest` (default): feed stdin payloads through the telemetry gateway,
//!   then print the resulting collection plan
//! - `plan`: print a collection plan from the current (seeded) state
//! - `stats`: print the fleet summary

use anyhow::{Context, Result};
use binsight::prelude::*;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = MonitorConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        containers = config.containers.len(),
        "Starting Binsight monitoring service"
    );

    let store = Arc::new(InMemoryReadingStore::new());
    let service = Arc::new(MonitorService::new(&config, store));

    let args: Vec<String> = std::env::args().collect();
    let mode = args.get(1).map(|s| s.as_str()).unwrap_or("ingest");

    match mode {
        "ingest" => {
            init_metrics(config.service.metrics_port)?;
            run_ingest(service, config.service.gateway_queue_size).await?;
        }
        "plan" => {
            let plan = service.collection_plan(None);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        "stats" => {
            let stats = service.fleet_stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        _ => {
            println!("Usage: binsight [ingest|plan|stats]");
            println!();
            println!("Modes:");
            println!("  ingest - Feed JSON reading payloads from stdin, then print the plan");
            println!("  plan   - Print a collection plan for the seeded fleet");
            println!("  stats  - Print the fleet summary");
            println!();
            println!("Configuration is read from config/default.toml, config/{{RUN_MODE}}.toml");
            println!("and FLEET_-prefixed environment variables.");
        }
    }

    Ok(())
}

/// Pump stdin payloads through the gateway, then report the plan and any
/// stale sensors.
async fn run_ingest(service: Arc<MonitorService>, queue_size: usize) -> Result<()> {
    let (gateway, payload_tx) = TelemetryGateway::new(queue_size);
    let gateway = Arc::new(gateway);
    let handler = Arc::new(ServiceHandler::new(service.clone()));

    let gateway_task = {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.run(handler).await {
                error!(error = %e, "Telemetry gateway error");
            }
        })
    };

    let mut feed_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if payload_tx.send(line.into_bytes()).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read from stdin");
                    break;
                }
            }
        }
        // Dropping the sender closes the gateway's channel.
    });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            gateway.shutdown();
        }
        _ = &mut feed_task => {}
    }

    feed_task.abort();
    gateway_task.await.ok();

    let stale = service.flag_stale_sensors();
    if !stale.is_empty() {
        info!(transitions = stale.len(), "Staleness sweep produced alert transitions");
    }

    let plan = service.collection_plan(None);
    println!("{}", serde_json::to_string_pretty(&plan)?);

    let alerts = service.active_alerts(None);
    if !alerts.is_empty() {
        println!("{}", serde_json::to_string_pretty(&alerts)?);
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
