//! Binsight - telemetry-to-decision pipeline for a waste container fleet
//!
//! This library ingests periodic fill-level readings from instrumented
//! containers and turns them into collection decisions. It handles:
//!
//! - Per-container reading storage and fill-rate trends
//! - Priority scoring and high/medium/low tier classification
//! - Vehicle capacity checks for the high-priority tier
//! - A deduplicated, per-category alert lifecycle
//!
//! # Example
//!
//! ```rust,no_run
//! use binsight::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MonitorConfig::load()?;
//!     config.validate()?;
//!
//!     let store = Arc::new(InMemoryReadingStore::new());
//!     let service = Arc::new(MonitorService::new(&config, store));
//!
//!     let (gateway, payload_tx) = TelemetryGateway::new(100);
//!     let handler = Arc::new(ServiceHandler::new(service.clone()));
//!
//!     payload_tx
//!         .send(br#"{"container_id": 1, "level_percent": 72.5}"#.to_vec())
//!         .await?;
//!     drop(payload_tx);
//!     gateway.run(handler).await?;
//!
//!     let plan = service.collection_plan(None);
//!     println!("{} containers need collection first", plan.high.len());
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod config;
pub mod container;
pub mod fill_rate;
pub mod gateway;
pub mod planner;
pub mod readings;
pub mod scoring;
pub mod service;

// Re-export main types
pub use alerts::{
    Alert, AlertCategory, AlertError, AlertEvent, AlertManager, AlertSeverity, AlertState,
    AlertStats,
};
pub use config::{
    ConfigValidationError, ContainerSeed, EstimatorConfig, FleetConfig, MonitorConfig,
    ServiceConfig, ThresholdConfig,
};
pub use container::{Container, ContainerRegistry, ContainerState, RegistryError};
pub use fill_rate::FillRateEstimator;
pub use gateway::{GatewayError, ReadingHandler, ServiceHandler, TelemetryGateway};
pub use planner::{build_plan, vehicles_required, CapacityCheck, CollectionPlan};
pub use readings::{InMemoryReadingStore, NewReading, ReadingStore, SensorReading, StoreError};
pub use scoring::{assess, hours_to_full, PriorityAssessment, Tier};
pub use service::{FleetStats, IngestError, MonitorService};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{FleetConfig, MonitorConfig};
    pub use crate::gateway::{ReadingHandler, ServiceHandler, TelemetryGateway};
    pub use crate::planner::CollectionPlan;
    pub use crate::readings::{InMemoryReadingStore, NewReading, ReadingStore};
    pub use crate::scoring::{PriorityAssessment, Tier};
    pub use crate::service::MonitorService;
}
