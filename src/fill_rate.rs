//! Fill-rate estimation from recent reading history.
//!
//! The estimator derives a linear percent-per-hour trend from the oldest and
//! newest readings inside a lookback window. It reports filling speed only:
//! a level drop (a collection happened) clamps to zero rather than going
//! negative. Any store failure degrades to zero with a logged warning so the
//! scoring pipeline is never blocked by one container's bad data.

use crate::readings::ReadingStore;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Estimates a container's fill rate in percent per hour.
#[derive(Debug, Clone)]
pub struct FillRateEstimator {
    lookback: Duration,
}

impl FillRateEstimator {
    /// Create an estimator with the given lookback window in hours.
    pub fn new(lookback_hours: u64) -> Self {
        Self {
            lookback: Duration::hours(lookback_hours as i64),
        }
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    /// Fill rate for a container as of `now`, in percent per hour.
    ///
    /// Returns 0 when there are fewer than two readings in the window, when
    /// the window spans no elapsed time, when the level dropped, or when the
    /// store cannot be queried.
    pub fn rate_for(&self, store: &dyn ReadingStore, container_id: u32, now: DateTime<Utc>) -> f64 {
        let cutoff = now - self.lookback;

        let window = match store.since(container_id, cutoff) {
            Ok(window) => window,
            Err(e) => {
                warn!(
                    container_id = container_id,
                    error = %e,
                    "Reading store query failed, degrading fill rate to 0"
                );
                return 0.0;
            }
        };

        if window.len() < 2 {
            return 0.0;
        }

        // `since` returns oldest to newest.
        let oldest = &window[0];
        let newest = &window[window.len() - 1];

        let elapsed_hours =
            (newest.timestamp - oldest.timestamp).num_seconds() as f64 / 3600.0;
        if elapsed_hours <= 0.0 {
            return 0.0;
        }

        let rate = (newest.level_percent - oldest.level_percent) / elapsed_hours;
        rate.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::{InMemoryReadingStore, SensorReading, StoreError};

    fn make_reading(container_id: u32, level: f64, at: DateTime<Utc>) -> SensorReading {
        SensorReading {
            container_id,
            level_percent: level,
            temperature: None,
            humidity: None,
            gas_ppm: None,
            distance_cm: None,
            timestamp: at,
        }
    }

    /// A store whose queries always fail.
    struct BrokenStore;

    impl ReadingStore for BrokenStore {
        fn append(&self, _: SensorReading) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("append refused".into()))
        }
        fn latest(&self, _: u32) -> Result<Option<SensorReading>, StoreError> {
            Err(StoreError::Unavailable("latest refused".into()))
        }
        fn since(&self, _: u32, _: DateTime<Utc>) -> Result<Vec<SensorReading>, StoreError> {
            Err(StoreError::Unavailable("since refused".into()))
        }
        fn history(&self, _: u32, _: Option<usize>) -> Result<Vec<SensorReading>, StoreError> {
            Err(StoreError::Unavailable("history refused".into()))
        }
        fn remove_container(&self, _: u32) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("remove refused".into()))
        }
    }

    #[test]
    fn test_linear_rate() {
        // 40% at t=0h, 64% at t=8h -> 3 %/h
        let store = InMemoryReadingStore::new();
        let now = Utc::now();
        store
            .append(make_reading(1, 40.0, now - Duration::hours(8)))
            .unwrap();
        store.append(make_reading(1, 64.0, now)).unwrap();

        let estimator = FillRateEstimator::new(24);
        assert_eq!(estimator.rate_for(&store, 1, now), 3.0);
    }

    #[test]
    fn test_single_reading_is_zero() {
        let store = InMemoryReadingStore::new();
        let now = Utc::now();
        store.append(make_reading(1, 85.0, now)).unwrap();

        let estimator = FillRateEstimator::new(24);
        assert_eq!(estimator.rate_for(&store, 1, now), 0.0);
    }

    #[test]
    fn test_zero_elapsed_is_zero() {
        let store = InMemoryReadingStore::new();
        let now = Utc::now();
        store.append(make_reading(1, 40.0, now)).unwrap();
        store.append(make_reading(1, 55.0, now)).unwrap();

        let estimator = FillRateEstimator::new(24);
        assert_eq!(estimator.rate_for(&store, 1, now), 0.0);
    }

    #[test]
    fn test_emptying_clamps_to_zero() {
        // Level dropped after a collection run; the estimator never reports
        // emptying speed.
        let store = InMemoryReadingStore::new();
        let now = Utc::now();
        store
            .append(make_reading(1, 90.0, now - Duration::hours(4)))
            .unwrap();
        store.append(make_reading(1, 5.0, now)).unwrap();

        let estimator = FillRateEstimator::new(24);
        assert_eq!(estimator.rate_for(&store, 1, now), 0.0);
    }

    #[test]
    fn test_readings_outside_window_ignored() {
        let store = InMemoryReadingStore::new();
        let now = Utc::now();
        // Old reading outside the 24h window would suggest a steeper trend.
        store
            .append(make_reading(1, 0.0, now - Duration::hours(48)))
            .unwrap();
        store
            .append(make_reading(1, 50.0, now - Duration::hours(10)))
            .unwrap();
        store.append(make_reading(1, 60.0, now)).unwrap();

        let estimator = FillRateEstimator::new(24);
        assert_eq!(estimator.rate_for(&store, 1, now), 1.0);
    }

    #[test]
    fn test_store_failure_degrades_to_zero() {
        let estimator = FillRateEstimator::new(24);
        assert_eq!(estimator.rate_for(&BrokenStore, 1, Utc::now()), 0.0);
    }

    #[test]
    fn test_rate_is_never_negative() {
        let store = InMemoryReadingStore::new();
        let now = Utc::now();
        for (hours_ago, level) in [(20, 80.0), (12, 30.0), (6, 10.0), (0, 2.0)] {
            store
                .append(make_reading(1, level, now - Duration::hours(hours_ago)))
                .unwrap();
        }

        let estimator = FillRateEstimator::new(24);
        assert!(estimator.rate_for(&store, 1, now) >= 0.0);
    }
}
