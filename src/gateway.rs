//! Telemetry ingestion gateway.
//!
//! The explicit, injected boundary between the external transport (broker,
//! device gateway, replay tool) and the core. The transport pushes raw
//! payload bytes into the gateway's channel; the gateway decodes them into
//! reading payloads and hands them to a `ReadingHandler`. It owns its own
//! lifecycle: `run` consumes until every sender is dropped or `shutdown` is
//! called, and a malformed or rejected payload is logged and skipped, never
//! fatal to the loop.

use crate::readings::NewReading;
use crate::service::{IngestError, MonitorService};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Errors that can occur while running the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("reading rejected: {0}")]
    Rejected(#[from] IngestError),

    #[error("gateway is already running or was shut down")]
    AlreadyStarted,
}

/// Handler invoked for each decoded reading payload.
#[async_trait]
pub trait ReadingHandler: Send + Sync {
    /// Process a single decoded payload.
    async fn handle(&self, payload: NewReading) -> Result<(), GatewayError>;

    /// Called when a payload could not be processed. Defaults to a warning.
    async fn on_error(&self, error: GatewayError) {
        warn!(error = %error, "Reading payload dropped");
    }
}

/// Handler that feeds readings into the monitoring service.
pub struct ServiceHandler {
    service: Arc<MonitorService>,
}

impl ServiceHandler {
    pub fn new(service: Arc<MonitorService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ReadingHandler for ServiceHandler {
    async fn handle(&self, payload: NewReading) -> Result<(), GatewayError> {
        let reading = self.service.ingest_reading(payload)?;
        debug!(
            container_id = reading.container_id,
            level = reading.level_percent,
            "Reading ingested via gateway"
        );
        Ok(())
    }
}

/// Ingestion gateway with an explicit start/stop lifecycle.
///
/// `new` hands back the sender half of the payload channel for the external
/// transport; the gateway keeps only the receiving side.
pub struct TelemetryGateway {
    payload_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: AtomicBool,
    running: AtomicBool,
}

impl TelemetryGateway {
    /// Create a gateway with the given payload queue size, returning the
    /// sender the transport pushes raw payloads into.
    pub fn new(queue_size: usize) -> (Self, mpsc::Sender<Vec<u8>>) {
        let (payload_tx, payload_rx) = mpsc::channel(queue_size);
        let (shutdown_tx, _) = broadcast::channel(1);

        let gateway = Self {
            payload_rx: Mutex::new(Some(payload_rx)),
            shutdown_tx,
            shutdown_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
        };
        (gateway, payload_tx)
    }

    /// Whether the consume loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the consume loop to stop. Safe to call before or after `run`.
    pub fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        // Fails only when no receiver is listening; the flag covers that.
        let _ = self.shutdown_tx.send(());
    }

    /// Consume payloads until every sender is dropped or `shutdown` is
    /// called.
    ///
    /// Each payload is decoded as a JSON reading and handed to the handler.
    /// Decode failures and handler rejections are reported through
    /// `on_error` and the loop continues with the next payload.
    pub async fn run(&self, handler: Arc<dyn ReadingHandler>) -> Result<(), GatewayError> {
        let mut payload_rx = self
            .payload_rx
            .lock()
            .take()
            .ok_or(GatewayError::AlreadyStarted)?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.running.store(true, Ordering::SeqCst);
        info!("Telemetry gateway started");

        while !self.shutdown_requested.load(Ordering::SeqCst) {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Telemetry gateway shutting down");
                    break;
                }
                payload = payload_rx.recv() => {
                    match payload {
                        Some(bytes) => self.process_payload(&bytes, handler.as_ref()).await,
                        None => {
                            info!("Payload channel closed");
                            break;
                        }
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Telemetry gateway stopped");
        Ok(())
    }

    async fn process_payload(&self, bytes: &[u8], handler: &dyn ReadingHandler) {
        let payload: NewReading = match serde_json::from_slice(bytes) {
            Ok(payload) => payload,
            Err(e) => {
                metrics::counter!("gateway.payloads.malformed").increment(1);
                handler.on_error(GatewayError::Decode(e.to_string())).await;
                return;
            }
        };

        match handler.handle(payload).await {
            Ok(()) => {
                metrics::counter!("gateway.payloads.processed").increment(1);
            }
            Err(e) => {
                metrics::counter!("gateway.payloads.rejected").increment(1);
                handler.on_error(e).await;
            }
        }
    }
}
