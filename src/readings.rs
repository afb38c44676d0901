//! Sensor readings and the reading store.
//!
//! The store keeps an append-only, per-container sequence of readings.
//! Newest-first is the canonical read order. The `ReadingStore` trait is the
//! seam between the core and whatever persistence actually backs it: every
//! query is bounded and reports failure instead of hanging, so downstream
//! computations can degrade rather than block.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A single sensor reading for one container. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Owning container id
    pub container_id: u32,

    /// Fill percentage, 0-100 inclusive
    pub level_percent: f64,

    /// Ambient temperature in °C
    pub temperature: Option<f64>,

    /// Relative humidity in percent
    pub humidity: Option<f64>,

    /// Gas concentration in ppm
    pub gas_ppm: Option<f64>,

    /// Raw ultrasonic distance in centimeters
    pub distance_cm: Option<f64>,

    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
}

/// Incoming reading payload, as delivered by the device gateway.
///
/// A missing timestamp is assigned at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReading {
    pub container_id: u32,
    pub level_percent: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub gas_ppm: Option<f64>,
    #[serde(default)]
    pub distance_cm: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Errors reported by a reading store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage could not serve the request.
    #[error("reading store unavailable: {0}")]
    Unavailable(String),
}

/// Query contract for reading storage.
///
/// `latest` and `since` are the two queries the pipeline depends on:
/// "most recent reading for container X" and "readings for container X since
/// time T". Any storage technology may serve them.
pub trait ReadingStore: Send + Sync {
    /// Append a reading to its container's sequence.
    fn append(&self, reading: SensorReading) -> Result<(), StoreError>;

    /// Most recent reading for a container, if any.
    fn latest(&self, container_id: u32) -> Result<Option<SensorReading>, StoreError>;

    /// Readings at or after `cutoff`, ordered oldest to newest.
    fn since(
        &self,
        container_id: u32,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StoreError>;

    /// Reading history for a container in canonical newest-first order,
    /// optionally truncated to `limit` entries.
    fn history(
        &self,
        container_id: u32,
        limit: Option<usize>,
    ) -> Result<Vec<SensorReading>, StoreError>;

    /// Drop every reading owned by a container. Returns how many were
    /// removed. Used by administrative container deletion.
    fn remove_container(&self, container_id: u32) -> Result<usize, StoreError>;
}

/// In-memory reading store.
///
/// Sequences are kept sorted by timestamp so out-of-order delivery from the
/// transport does not corrupt window queries.
#[derive(Debug, Default)]
pub struct InMemoryReadingStore {
    // Ascending by timestamp internally; reversed for newest-first reads.
    readings: RwLock<HashMap<u32, Vec<SensorReading>>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total readings across all containers.
    pub fn len(&self) -> usize {
        self.readings.read().values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadingStore for InMemoryReadingStore {
    fn append(&self, reading: SensorReading) -> Result<(), StoreError> {
        let mut readings = self.readings.write();
        let sequence = readings.entry(reading.container_id).or_default();
        let at = sequence.partition_point(|r| r.timestamp <= reading.timestamp);
        sequence.insert(at, reading);
        Ok(())
    }

    fn latest(&self, container_id: u32) -> Result<Option<SensorReading>, StoreError> {
        Ok(self
            .readings
            .read()
            .get(&container_id)
            .and_then(|seq| seq.last().cloned()))
    }

    fn since(
        &self,
        container_id: u32,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StoreError> {
        let readings = self.readings.read();
        let Some(sequence) = readings.get(&container_id) else {
            return Ok(Vec::new());
        };
        let from = sequence.partition_point(|r| r.timestamp < cutoff);
        Ok(sequence[from..].to_vec())
    }

    fn history(
        &self,
        container_id: u32,
        limit: Option<usize>,
    ) -> Result<Vec<SensorReading>, StoreError> {
        let readings = self.readings.read();
        let Some(sequence) = readings.get(&container_id) else {
            return Ok(Vec::new());
        };
        let newest_first = sequence.iter().rev().cloned();
        Ok(match limit {
            Some(n) => newest_first.take(n).collect(),
            None => newest_first.collect(),
        })
    }

    fn remove_container(&self, container_id: u32) -> Result<usize, StoreError> {
        Ok(self
            .readings
            .write()
            .remove(&container_id)
            .map(|seq| seq.len())
            .unwrap_or(0))
    }
}
