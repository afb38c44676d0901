//! The monitoring service facade.
//!
//! Ties the registry, reading store, estimator, scorer, planner and alert
//! manager together behind the three boundary operations: reading ingress,
//! plan queries and the alert feed. Ingestion validates before it mutates
//! anything, so a rejected reading leaves no trace; plan queries always
//! return a complete result, isolating containers whose data cannot be
//! fetched behind their cached level.

use crate::alerts::{Alert, AlertError, AlertEvent, AlertManager, AlertStats};
use crate::config::{FleetConfig, MonitorConfig};
use crate::container::{Container, ContainerRegistry, RegistryError};
use crate::fill_rate::FillRateEstimator;
use crate::planner::{self, CollectionPlan};
use crate::readings::{NewReading, ReadingStore, SensorReading, StoreError};
use crate::scoring;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Ingestion and lookup errors surfaced to the boundary.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fill level outside 0-100. Rejected before any state mutation.
    #[error("fill level {0} is outside the valid range 0-100")]
    InvalidLevel(f64),

    /// The reading names a container the registry does not know.
    #[error("unknown container id {0}")]
    UnknownContainer(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fleet-wide summary for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetStats {
    pub total_containers: usize,
    pub active_containers: usize,
    pub inactive_containers: usize,
    pub maintenance_containers: usize,

    /// Mean current level across the fleet, from latest readings with
    /// cached fallback
    pub average_level_percent: f64,

    pub alerts: AlertStats,
}

/// The telemetry-to-decision pipeline behind the service boundary.
pub struct MonitorService {
    registry: ContainerRegistry,
    store: Arc<dyn ReadingStore>,
    estimator: FillRateEstimator,
    alerts: AlertManager,
    fleet_defaults: FleetConfig,
}

impl MonitorService {
    pub fn new(config: &MonitorConfig, store: Arc<dyn ReadingStore>) -> Self {
        let registry = ContainerRegistry::new();
        for seed in &config.containers {
            // Seeds are validated with the config; duplicate ids would have
            // been refused there as well.
            if let Err(RegistryError::DuplicateId(id)) =
                registry.insert(Container::from_seed(seed))
            {
                warn!(container_id = id, "Duplicate container seed skipped");
            }
        }

        Self {
            registry,
            store,
            estimator: FillRateEstimator::new(config.estimator.lookback_hours),
            alerts: AlertManager::new(config.thresholds.clone()),
            fleet_defaults: config.fleet.clone(),
        }
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn ReadingStore {
        self.store.as_ref()
    }

    /// Ingest one reading: validate, append, refresh the cached level, then
    /// run the alert evaluation for this container.
    ///
    /// Validation failures reject the payload outright; nothing is written
    /// and no alert side effects happen.
    #[instrument(skip(self, payload), fields(container_id = payload.container_id))]
    pub fn ingest_reading(&self, payload: NewReading) -> Result<SensorReading, IngestError> {
        if !(0.0..=100.0).contains(&payload.level_percent) {
            metrics::counter!("readings.rejected").increment(1);
            return Err(IngestError::InvalidLevel(payload.level_percent));
        }
        if !self.registry.contains(payload.container_id) {
            metrics::counter!("readings.rejected").increment(1);
            return Err(IngestError::UnknownContainer(payload.container_id));
        }

        let reading = SensorReading {
            container_id: payload.container_id,
            level_percent: payload.level_percent,
            temperature: payload.temperature,
            humidity: payload.humidity,
            gas_ppm: payload.gas_ppm,
            distance_cm: payload.distance_cm,
            timestamp: payload.timestamp.unwrap_or_else(Utc::now),
        };

        self.store.append(reading.clone())?;
        self.registry
            .set_last_known_level(reading.container_id, reading.level_percent);

        let events = self.alerts.evaluate_reading(&reading);
        for event in &events {
            match event {
                AlertEvent::Raised(alert) => debug!(
                    alert_id = %alert.id,
                    severity = ?alert.severity,
                    "Reading raised alert"
                ),
                AlertEvent::Resolved(alert) => debug!(
                    alert_id = %alert.id,
                    "Reading resolved alert"
                ),
            }
        }

        metrics::counter!("readings.ingested").increment(1);
        debug!(
            level = reading.level_percent,
            transitions = events.len(),
            "Reading stored"
        );

        Ok(reading)
    }

    /// Build a collection plan over the active fleet.
    ///
    /// Always returns a complete plan: a container whose readings cannot be
    /// fetched is ranked on its cached last-known level with a zero rate
    /// instead of failing the query.
    #[instrument(skip(self, fleet))]
    pub fn collection_plan(&self, fleet: Option<&FleetConfig>) -> CollectionPlan {
        let now = Utc::now();
        let fleet = fleet.unwrap_or(&self.fleet_defaults);

        let assessments = self
            .registry
            .active()
            .iter()
            .map(|container| {
                let level = match self.store.latest(container.id) {
                    Ok(Some(reading)) => reading.level_percent,
                    Ok(None) => container.last_known_level,
                    Err(e) => {
                        warn!(
                            container_id = container.id,
                            error = %e,
                            "Reading lookup failed, falling back to cached level"
                        );
                        container.last_known_level
                    }
                };
                let rate = self.estimator.rate_for(self.store.as_ref(), container.id, now);
                scoring::assess(container, level, rate)
            })
            .collect();

        let plan = planner::build_plan(assessments, fleet, now);

        info!(
            high = plan.high.len(),
            medium = plan.medium.len(),
            low = plan.low.len(),
            vehicles_required = plan.capacity.vehicles_required,
            sufficient = plan.capacity.sufficient,
            "Collection plan computed"
        );
        metrics::counter!("plans.computed").increment(1);

        plan
    }

    /// Active alerts, fleet-wide or for one container.
    pub fn active_alerts(&self, container_id: Option<u32>) -> Vec<Alert> {
        match container_id {
            Some(id) => self.alerts.active_for(id),
            None => self.alerts.active_alerts(),
        }
    }

    /// Manually resolve an active alert.
    pub fn resolve_alert(
        &self,
        alert_id: uuid::Uuid,
        note: Option<String>,
    ) -> Result<Alert, AlertError> {
        self.alerts.resolve(alert_id, note)
    }

    /// Acknowledge an active alert.
    pub fn acknowledge_alert(&self, alert_id: uuid::Uuid) -> Result<Alert, AlertError> {
        self.alerts.acknowledge(alert_id)
    }

    /// Sweep the active fleet for silent sensors, raising or resolving
    /// sensor-fault alerts. Intended to be called by the external scheduler
    /// alongside plan recomputation.
    pub fn flag_stale_sensors(&self) -> Vec<AlertEvent> {
        let now = Utc::now();
        let mut events = Vec::new();

        for container in self.registry.active() {
            let newest = match self.store.latest(container.id) {
                Ok(reading) => reading.map(|r| r.timestamp),
                Err(e) => {
                    warn!(
                        container_id = container.id,
                        error = %e,
                        "Reading lookup failed during staleness sweep"
                    );
                    continue;
                }
            };
            events.extend(self.alerts.evaluate_staleness(&container, newest, now));
        }

        events
    }

    /// Reading history for a container, newest first.
    pub fn reading_history(
        &self,
        container_id: u32,
        limit: Option<usize>,
    ) -> Result<Vec<SensorReading>, IngestError> {
        if !self.registry.contains(container_id) {
            return Err(IngestError::UnknownContainer(container_id));
        }
        Ok(self.store.history(container_id, limit)?)
    }

    /// Fleet summary for dashboards.
    pub fn fleet_stats(&self) -> FleetStats {
        let containers = self.registry.all();
        let total = containers.len();
        let mut active = 0;
        let mut inactive = 0;
        let mut maintenance = 0;
        let mut level_sum = 0.0;

        for container in &containers {
            match container.state {
                crate::container::ContainerState::Active => active += 1,
                crate::container::ContainerState::Inactive => inactive += 1,
                crate::container::ContainerState::Maintenance => maintenance += 1,
            }
            level_sum += match self.store.latest(container.id) {
                Ok(Some(reading)) => reading.level_percent,
                _ => container.last_known_level,
            };
        }

        FleetStats {
            total_containers: total,
            active_containers: active,
            inactive_containers: inactive,
            maintenance_containers: maintenance,
            average_level_percent: if total > 0 {
                level_sum / total as f64
            } else {
                0.0
            },
            alerts: self.alerts.stats(),
        }
    }

    /// Administrative removal of a container, cascading its readings and
    /// alerts.
    pub fn remove_container(&self, container_id: u32) -> Result<Container, IngestError> {
        let container = self
            .registry
            .remove(container_id)
            .ok_or(IngestError::UnknownContainer(container_id))?;

        let readings = self.store.remove_container(container_id)?;
        let alerts = self.alerts.remove_container(container_id);

        info!(
            container_id = container_id,
            readings_removed = readings,
            alerts_removed = alerts,
            "Container removed"
        );

        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertCategory;
    use crate::config::ContainerSeed;
    use crate::readings::InMemoryReadingStore;
    use chrono::Duration;

    fn make_service(container_ids: &[u32]) -> MonitorService {
        let mut config = MonitorConfig::default();
        for &id in container_ids {
            config.containers.push(ContainerSeed {
                id,
                name: format!("Container #{}", id),
                location: None,
                capacity_liters: 3_300.0,
            });
        }
        MonitorService::new(&config, Arc::new(InMemoryReadingStore::new()))
    }

    fn make_payload(container_id: u32, level: f64) -> NewReading {
        NewReading {
            container_id,
            level_percent: level,
            temperature: None,
            humidity: None,
            gas_ppm: None,
            distance_cm: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_out_of_range_level_rejected_without_side_effects() {
        let service = make_service(&[1]);

        let err = service.ingest_reading(make_payload(1, 120.0)).unwrap_err();
        assert!(matches!(err, IngestError::InvalidLevel(_)));

        // No reading row, no cached-level update, no alert.
        assert!(service.store().latest(1).unwrap().is_none());
        assert_eq!(service.registry().get(1).unwrap().last_known_level, 0.0);
        assert!(service.active_alerts(None).is_empty());
    }

    #[test]
    fn test_unknown_container_rejected() {
        let service = make_service(&[1]);
        let err = service.ingest_reading(make_payload(99, 50.0)).unwrap_err();
        assert!(matches!(err, IngestError::UnknownContainer(99)));
    }

    #[test]
    fn test_ingest_updates_cache_and_raises_alert() {
        let service = make_service(&[1]);

        let reading = service.ingest_reading(make_payload(1, 85.0)).unwrap();
        assert_eq!(reading.level_percent, 85.0);
        assert_eq!(service.registry().get(1).unwrap().last_known_level, 85.0);

        let alerts = service.active_alerts(Some(1));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::OverflowRisk);
    }

    #[test]
    fn test_payload_timestamp_is_honored() {
        let service = make_service(&[1]);
        let yesterday = Utc::now() - Duration::hours(24);

        let mut payload = make_payload(1, 40.0);
        payload.timestamp = Some(yesterday);

        let reading = service.ingest_reading(payload).unwrap();
        assert_eq!(reading.timestamp, yesterday);
    }

    #[test]
    fn test_plan_covers_whole_active_fleet() {
        let service = make_service(&[1, 2, 3]);
        service.ingest_reading(make_payload(1, 85.0)).unwrap();
        service.ingest_reading(make_payload(2, 30.0)).unwrap();
        // Container 3 never reports; it is still ranked (cached level 0).

        let plan = service.collection_plan(None);
        assert_eq!(plan.total_containers, 3);
        let ranked: usize = plan.high.len() + plan.medium.len() + plan.low.len();
        assert_eq!(ranked, 3);
    }

    #[test]
    fn test_plan_excludes_non_active_containers() {
        let service = make_service(&[1, 2]);
        service
            .registry()
            .set_state(2, crate::container::ContainerState::Maintenance);

        let plan = service.collection_plan(None);
        assert_eq!(plan.total_containers, 1);
    }

    #[test]
    fn test_plan_uses_trend_from_readings() {
        let service = make_service(&[1]);
        let now = Utc::now();

        // 40% eight hours ago, 64% now: 3 %/h, score 66, medium tier.
        let mut early = make_payload(1, 40.0);
        early.timestamp = Some(now - Duration::hours(8));
        service.ingest_reading(early).unwrap();

        let mut late = make_payload(1, 64.0);
        late.timestamp = Some(now);
        service.ingest_reading(late).unwrap();

        let plan = service.collection_plan(None);
        assert_eq!(plan.medium.len(), 1);
        let assessment = &plan.medium[0];
        assert_eq!(assessment.fill_rate, 3.0);
        assert_eq!(assessment.score, 66.0);
    }

    #[test]
    fn test_resolve_alert_roundtrip() {
        let service = make_service(&[1]);
        service.ingest_reading(make_payload(1, 85.0)).unwrap();

        let alert_id = service.active_alerts(Some(1))[0].id;
        let resolved = service
            .resolve_alert(alert_id, Some("handled".to_string()))
            .unwrap();
        assert!(!resolved.is_active());

        assert!(matches!(
            service.resolve_alert(alert_id, None),
            Err(AlertError::AlreadyResolved(_))
        ));
    }

    #[test]
    fn test_stale_sensor_sweep_flags_silent_container() {
        let service = make_service(&[1, 2]);
        let now = Utc::now();

        let mut old = make_payload(1, 50.0);
        old.timestamp = Some(now - Duration::hours(12));
        service.ingest_reading(old).unwrap();

        let mut fresh = make_payload(2, 50.0);
        fresh.timestamp = Some(now);
        service.ingest_reading(fresh).unwrap();

        let events = service.flag_stale_sensors();
        assert_eq!(events.len(), 1);

        let faults: Vec<Alert> = service
            .active_alerts(Some(1))
            .into_iter()
            .filter(|a| a.category == AlertCategory::SensorFault)
            .collect();
        assert_eq!(faults.len(), 1);
        assert!(service.active_alerts(Some(2)).is_empty());
    }

    #[test]
    fn test_reading_history_newest_first() {
        let service = make_service(&[1]);
        let now = Utc::now();
        for h in 0..4 {
            let mut payload = make_payload(1, 10.0 * h as f64);
            payload.timestamp = Some(now - Duration::hours(4 - h));
            service.ingest_reading(payload).unwrap();
        }

        let history = service.reading_history(1, Some(2)).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].timestamp > history[1].timestamp);

        assert!(matches!(
            service.reading_history(42, None),
            Err(IngestError::UnknownContainer(42))
        ));
    }

    #[test]
    fn test_fleet_stats() {
        let service = make_service(&[1, 2]);
        service.ingest_reading(make_payload(1, 80.0)).unwrap();
        service.ingest_reading(make_payload(2, 20.0)).unwrap();

        let stats = service.fleet_stats();
        assert_eq!(stats.total_containers, 2);
        assert_eq!(stats.active_containers, 2);
        assert_eq!(stats.average_level_percent, 50.0);
        assert_eq!(stats.alerts.active, 1); // the 80% overflow alert
    }

    #[test]
    fn test_remove_container_cascades() {
        let service = make_service(&[1]);
        service.ingest_reading(make_payload(1, 85.0)).unwrap();

        service.remove_container(1).unwrap();
        assert!(service.registry().get(1).is_none());
        assert!(service.store().latest(1).unwrap().is_none());
        assert!(service.active_alerts(Some(1)).is_empty());

        assert!(matches!(
            service.remove_container(1),
            Err(IngestError::UnknownContainer(1))
        ));
    }
}
