//! Alert lifecycle management.
//!
//! One state machine per (container, category) pair: `none → active →
//! resolved`, with `acknowledged` as an optional stop between active and
//! resolved. At most one alert per pair is ever active; a repeat trigger in
//! the same severity band is a no-op, a higher band escalates by resolving
//! the old alert and raising a new one, and falling back under the lowest
//! threshold auto-resolves. Alert history is never deleted by the lifecycle,
//! only marked resolved.
//!
//! Transitions serialize per container behind a per-key mutex so the
//! at-most-one invariant holds under concurrent ingestion.

use crate::config::ThresholdConfig;
use crate::container::Container;
use crate::readings::SensorReading;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Alert categories, one state machine each per container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    OverflowRisk,
    Gas,
    TemperatureAnomaly,
    SensorFault,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::OverflowRisk => "overflow_risk",
            AlertCategory::Gas => "gas",
            AlertCategory::TemperatureAnomaly => "temperature_anomaly",
            AlertCategory::SensorFault => "sensor_fault",
        }
    }
}

/// Alert severity, ascending. The derived ordering drives escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Active,
    Acknowledged,
    Resolved,
}

/// An alert raised for a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub container_id: u32,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub message: String,

    /// The metric value that crossed the threshold
    pub triggering_value: f64,

    /// The threshold that was crossed
    pub threshold: f64,

    pub state: AlertState,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl Alert {
    /// Whether the alert still occupies its (container, category) slot.
    /// Acknowledged alerts do: acknowledging is not resolving.
    pub fn is_active(&self) -> bool {
        matches!(self.state, AlertState::Active | AlertState::Acknowledged)
    }
}

/// A lifecycle transition produced by evaluating a reading.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    Raised(Alert),
    Resolved(Alert),
}

/// Alert operation errors.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert {0} not found")]
    NotFound(Uuid),

    #[error("alert {0} is already resolved")]
    AlreadyResolved(Uuid),
}

/// Active-alert counts for the whole fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    pub active_critical: usize,
    pub active_warning: usize,
    pub active_info: usize,
    pub active_overflow_risk: usize,
    pub active_gas: usize,
    pub active_temperature_anomaly: usize,
    pub active_sensor_fault: usize,
}

/// A severity band a metric landed in, with everything needed to raise the
/// corresponding alert.
#[derive(Debug, Clone)]
struct Band {
    severity: AlertSeverity,
    threshold: f64,
    value: f64,
    message: String,
}

fn overflow_band(thresholds: &ThresholdConfig, level_percent: f64) -> Option<Band> {
    if level_percent >= thresholds.level_critical_pct {
        Some(Band {
            severity: AlertSeverity::Critical,
            threshold: thresholds.level_critical_pct,
            value: level_percent,
            message: format!("Critical fill level: {:.1}%", level_percent),
        })
    } else if level_percent >= thresholds.level_warning_pct {
        Some(Band {
            severity: AlertSeverity::Warning,
            threshold: thresholds.level_warning_pct,
            value: level_percent,
            message: format!("Fill level approaching capacity: {:.1}%", level_percent),
        })
    } else {
        None
    }
}

fn gas_band(thresholds: &ThresholdConfig, gas_ppm: f64) -> Option<Band> {
    if gas_ppm >= thresholds.gas_ppm {
        Some(Band {
            severity: AlertSeverity::Warning,
            threshold: thresholds.gas_ppm,
            value: gas_ppm,
            message: format!("Elevated gas concentration: {:.0} ppm", gas_ppm),
        })
    } else {
        None
    }
}

fn temperature_band(thresholds: &ThresholdConfig, temperature: f64) -> Option<Band> {
    if temperature > thresholds.temperature_high_c {
        Some(Band {
            severity: AlertSeverity::Info,
            threshold: thresholds.temperature_high_c,
            value: temperature,
            message: format!("Abnormal temperature: {:.1} °C", temperature),
        })
    } else if temperature < thresholds.temperature_low_c {
        Some(Band {
            severity: AlertSeverity::Info,
            threshold: thresholds.temperature_low_c,
            value: temperature,
            message: format!("Abnormal temperature: {:.1} °C", temperature),
        })
    } else {
        None
    }
}

type CategoryStates = HashMap<AlertCategory, Uuid>;

/// Per-container, per-category alert state machine.
pub struct AlertManager {
    thresholds: ThresholdConfig,

    /// Full alert history, keyed by id. Never pruned by the lifecycle.
    alerts: RwLock<HashMap<Uuid, Alert>>,

    /// Active alert id per category, one map per container, each behind its
    /// own mutex so containers evaluate independently.
    active: RwLock<HashMap<u32, Arc<Mutex<CategoryStates>>>>,
}

impl AlertManager {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self {
            thresholds,
            alerts: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
        }
    }

    fn container_states(&self, container_id: u32) -> Arc<Mutex<CategoryStates>> {
        if let Some(states) = self.active.read().get(&container_id) {
            return states.clone();
        }
        self.active
            .write()
            .entry(container_id)
            .or_default()
            .clone()
    }

    /// Evaluate every alert category against a new reading.
    ///
    /// A reading that carries no value for a metric leaves that category
    /// untouched: absence of a gas sample neither raises nor resolves a gas
    /// alert. The reading's own timestamp stamps any transitions.
    pub fn evaluate_reading(&self, reading: &SensorReading) -> Vec<AlertEvent> {
        let states = self.container_states(reading.container_id);
        let mut guard = states.lock();
        let mut events = Vec::new();

        events.extend(self.apply_band(
            &mut guard,
            reading.container_id,
            AlertCategory::OverflowRisk,
            overflow_band(&self.thresholds, reading.level_percent),
            reading.timestamp,
        ));

        if let Some(gas_ppm) = reading.gas_ppm {
            events.extend(self.apply_band(
                &mut guard,
                reading.container_id,
                AlertCategory::Gas,
                gas_band(&self.thresholds, gas_ppm),
                reading.timestamp,
            ));
        }

        if let Some(temperature) = reading.temperature {
            events.extend(self.apply_band(
                &mut guard,
                reading.container_id,
                AlertCategory::TemperatureAnomaly,
                temperature_band(&self.thresholds, temperature),
                reading.timestamp,
            ));
        }

        events
    }

    /// Evaluate the sensor-fault category from the age of a container's
    /// newest reading. A container that has never reported is left alone:
    /// there is no history to have gone quiet.
    pub fn evaluate_staleness(
        &self,
        container: &Container,
        newest_reading_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let band = newest_reading_at.and_then(|at| {
            let age_hours = (now - at).num_seconds() as f64 / 3600.0;
            let cutoff = self.thresholds.stale_after_hours as f64;
            if age_hours > cutoff {
                Some(Band {
                    severity: AlertSeverity::Warning,
                    threshold: cutoff,
                    value: age_hours,
                    message: format!(
                        "No telemetry from {} for {:.1} h",
                        container.name, age_hours
                    ),
                })
            } else {
                None
            }
        });

        let states = self.container_states(container.id);
        let mut guard = states.lock();
        self.apply_band(&mut guard, container.id, AlertCategory::SensorFault, band, now)
    }

    /// Core transition rules for one category. Caller holds the container's
    /// mutex.
    fn apply_band(
        &self,
        states: &mut CategoryStates,
        container_id: u32,
        category: AlertCategory,
        band: Option<Band>,
        at: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let current_id = states.get(&category).copied();
        let current_severity =
            current_id.and_then(|id| self.alerts.read().get(&id).map(|a| a.severity));

        match (band, current_id) {
            // Back under the lowest threshold: auto-resolve.
            (None, Some(id)) => {
                states.remove(&category);
                match self.mark_resolved(id, at, None) {
                    Some(alert) => {
                        info!(
                            container_id = container_id,
                            category = category.as_str(),
                            alert_id = %id,
                            "Alert auto-resolved"
                        );
                        metrics::counter!("alerts.resolved").increment(1);
                        vec![AlertEvent::Resolved(alert)]
                    }
                    None => Vec::new(),
                }
            }

            // Nothing crossed, nothing active.
            (None, None) => Vec::new(),

            // First crossing: raise.
            (Some(band), None) => {
                vec![AlertEvent::Raised(self.raise(
                    states,
                    container_id,
                    category,
                    band,
                    at,
                ))]
            }

            // Already active: escalate on a higher band, otherwise no-op.
            (Some(band), Some(id)) => {
                let escalates = current_severity.is_some_and(|sev| band.severity > sev);
                if escalates {
                    states.remove(&category);
                    let mut events = Vec::new();
                    if let Some(resolved) = self.mark_resolved(id, at, None) {
                        metrics::counter!("alerts.resolved").increment(1);
                        events.push(AlertEvent::Resolved(resolved));
                    }
                    events.push(AlertEvent::Raised(self.raise(
                        states,
                        container_id,
                        category,
                        band,
                        at,
                    )));
                    events
                } else {
                    debug!(
                        container_id = container_id,
                        category = category.as_str(),
                        "Alert already active at equal or higher severity, suppressed"
                    );
                    Vec::new()
                }
            }
        }
    }

    fn raise(
        &self,
        states: &mut CategoryStates,
        container_id: u32,
        category: AlertCategory,
        band: Band,
        at: DateTime<Utc>,
    ) -> Alert {
        let alert = Alert {
            id: Uuid::new_v4(),
            container_id,
            category,
            severity: band.severity,
            message: band.message,
            triggering_value: band.value,
            threshold: band.threshold,
            state: AlertState::Active,
            created_at: at,
            resolved_at: None,
            resolution_note: None,
        };

        info!(
            container_id = container_id,
            category = category.as_str(),
            severity = ?alert.severity,
            value = alert.triggering_value,
            threshold = alert.threshold,
            "Alert raised"
        );
        metrics::counter!("alerts.raised").increment(1);

        states.insert(category, alert.id);
        self.alerts.write().insert(alert.id, alert.clone());
        alert
    }

    fn mark_resolved(
        &self,
        alert_id: Uuid,
        at: DateTime<Utc>,
        note: Option<String>,
    ) -> Option<Alert> {
        let mut alerts = self.alerts.write();
        let alert = alerts.get_mut(&alert_id)?;
        alert.state = AlertState::Resolved;
        alert.resolved_at = Some(at);
        alert.resolution_note = note;
        Some(alert.clone())
    }

    /// Manually resolve an active alert. Fails on unknown ids and on alerts
    /// that were already resolved.
    pub fn resolve(&self, alert_id: Uuid, note: Option<String>) -> Result<Alert, AlertError> {
        let container_id = {
            let alerts = self.alerts.read();
            let alert = alerts.get(&alert_id).ok_or(AlertError::NotFound(alert_id))?;
            if !alert.is_active() {
                return Err(AlertError::AlreadyResolved(alert_id));
            }
            alert.container_id
        };

        // Take the container's lock so the manual resolve cannot race an
        // escalation on the same slot.
        let states = self.container_states(container_id);
        let mut guard = states.lock();

        let category = {
            let alerts = self.alerts.read();
            let alert = alerts.get(&alert_id).ok_or(AlertError::NotFound(alert_id))?;
            if !alert.is_active() {
                return Err(AlertError::AlreadyResolved(alert_id));
            }
            alert.category
        };

        if guard.get(&category) == Some(&alert_id) {
            guard.remove(&category);
        }

        let alert = self
            .mark_resolved(alert_id, Utc::now(), note)
            .ok_or(AlertError::NotFound(alert_id))?;

        info!(
            container_id = container_id,
            category = alert.category.as_str(),
            alert_id = %alert_id,
            "Alert manually resolved"
        );
        metrics::counter!("alerts.resolved").increment(1);

        Ok(alert)
    }

    /// Acknowledge an active alert. Idempotent on already-acknowledged
    /// alerts; fails on resolved ones.
    pub fn acknowledge(&self, alert_id: Uuid) -> Result<Alert, AlertError> {
        let mut alerts = self.alerts.write();
        let alert = alerts
            .get_mut(&alert_id)
            .ok_or(AlertError::NotFound(alert_id))?;
        match alert.state {
            AlertState::Resolved => Err(AlertError::AlreadyResolved(alert_id)),
            _ => {
                alert.state = AlertState::Acknowledged;
                Ok(alert.clone())
            }
        }
    }

    pub fn get(&self, alert_id: Uuid) -> Option<Alert> {
        self.alerts.read().get(&alert_id).cloned()
    }

    /// All active alerts across the fleet, most severe and newest first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut active: Vec<Alert> = self
            .alerts
            .read()
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.created_at.cmp(&a.created_at))
        });
        active
    }

    /// Active alerts for one container.
    pub fn active_for(&self, container_id: u32) -> Vec<Alert> {
        self.active_alerts()
            .into_iter()
            .filter(|a| a.container_id == container_id)
            .collect()
    }

    /// Fleet-wide alert counts.
    pub fn stats(&self) -> AlertStats {
        let alerts = self.alerts.read();
        let mut stats = AlertStats {
            total: alerts.len(),
            ..AlertStats::default()
        };

        for alert in alerts.values() {
            if !alert.is_active() {
                stats.resolved += 1;
                continue;
            }
            stats.active += 1;
            match alert.severity {
                AlertSeverity::Critical => stats.active_critical += 1,
                AlertSeverity::Warning => stats.active_warning += 1,
                AlertSeverity::Info => stats.active_info += 1,
            }
            match alert.category {
                AlertCategory::OverflowRisk => stats.active_overflow_risk += 1,
                AlertCategory::Gas => stats.active_gas += 1,
                AlertCategory::TemperatureAnomaly => stats.active_temperature_anomaly += 1,
                AlertCategory::SensorFault => stats.active_sensor_fault += 1,
            }
        }

        stats
    }

    /// Administrative cascade: drop every alert owned by a container.
    /// Returns how many were removed.
    pub fn remove_container(&self, container_id: u32) -> usize {
        let states = self.container_states(container_id);
        let mut guard = states.lock();
        guard.clear();

        let mut alerts = self.alerts.write();
        let before = alerts.len();
        alerts.retain(|_, a| a.container_id != container_id);
        before - alerts.len()
    }
}
