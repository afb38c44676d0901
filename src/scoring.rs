//! Priority scoring for collection planning.
//!
//! A greedy, stateless heuristic: the score is re-derivable purely from a
//! container's current level and fill-rate trend, so no scoring history is
//! persisted and every case is testable against literal inputs. Three
//! independently capped components sum to a score in [0, 100]:
//!
//! - criticality (0-50): how full the container already is
//! - urgency (0-30): how soon it is projected to reach 100%
//! - rate bonus (0-20): how fast it is filling
//!
//! Tier breakpoints are fixed policy constants, not configuration.

use crate::container::Container;
use serde::{Deserialize, Serialize};

/// Score at or above which a container lands in the high tier.
pub const TIER_HIGH_MIN: f64 = 70.0;

/// Score at or above which a container lands in the medium tier.
pub const TIER_MEDIUM_MIN: f64 = 40.0;

const CRITICALITY_MAX: f64 = 50.0;
const URGENCY_MAX: f64 = 30.0;
const RATE_BONUS_MAX: f64 = 20.0;

/// Collection priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Medium,
    Low,
}

/// Derived priority assessment for one container.
///
/// Recomputed on demand from the container and its recent readings; it has
/// no lifecycle of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityAssessment {
    pub container_id: u32,
    pub name: String,
    pub capacity_liters: f64,

    /// Current fill percentage
    pub level_percent: f64,

    /// Estimated fill rate in percent per hour
    pub fill_rate: f64,

    /// Projected hours until 100% full. `None` means the container never
    /// fills at the current trend.
    pub hours_to_full: Option<f64>,

    /// Composite priority score in [0, 100]
    pub score: f64,

    pub tier: Tier,
}

/// Projected hours until a container reaches 100%, or `None` when the trend
/// never gets there (rate is zero).
pub fn hours_to_full(level_percent: f64, rate: f64) -> Option<f64> {
    if rate > 0.0 {
        Some((100.0 - level_percent) / rate)
    } else {
        None
    }
}

/// Criticality component (0-50): full step bands above the policy
/// thresholds, proportional below them.
fn criticality(level_percent: f64) -> f64 {
    if level_percent >= 80.0 {
        CRITICALITY_MAX
    } else if level_percent >= 60.0 {
        30.0
    } else {
        level_percent * 0.3
    }
}

/// Urgency component (0-30), banded on projected hours to full.
fn urgency(hours_to_full: Option<f64>) -> f64 {
    match hours_to_full {
        Some(h) if h < 24.0 => URGENCY_MAX,
        Some(h) if h < 48.0 => 20.0,
        Some(h) if h < 72.0 => 10.0,
        _ => 0.0,
    }
}

/// Rate bonus component (0-20).
fn rate_bonus(rate: f64) -> f64 {
    (rate * 2.0).min(RATE_BONUS_MAX)
}

/// Composite score in [0, 100] for a level/rate pair.
pub fn score(level_percent: f64, rate: f64) -> f64 {
    let total = criticality(level_percent) + urgency(hours_to_full(level_percent, rate)) + rate_bonus(rate);
    total.min(100.0)
}

/// Tier classification for a score.
pub fn tier_for(score: f64) -> Tier {
    if score >= TIER_HIGH_MIN {
        Tier::High
    } else if score >= TIER_MEDIUM_MIN {
        Tier::Medium
    } else {
        Tier::Low
    }
}

/// Assess a container given its current level and estimated fill rate.
pub fn assess(container: &Container, level_percent: f64, rate: f64) -> PriorityAssessment {
    let hours = hours_to_full(level_percent, rate);
    let score = score(level_percent, rate);

    PriorityAssessment {
        container_id: container.id,
        name: container.name.clone(),
        capacity_liters: container.capacity_liters,
        level_percent,
        fill_rate: rate,
        hours_to_full: hours,
        score,
        tier: tier_for(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerState;

    fn make_container() -> Container {
        Container {
            id: 1,
            name: "Plaza Mayor".to_string(),
            location: None,
            capacity_liters: 3_300.0,
            state: ContainerState::Active,
            last_known_level: 0.0,
        }
    }

    #[test]
    fn test_filling_container_scores_medium() {
        // 64% filling at 3 %/h: 12h to full -> urgency 30, criticality 30,
        // rate bonus 6 -> 66, medium tier.
        let assessment = assess(&make_container(), 64.0, 3.0);
        assert_eq!(assessment.hours_to_full, Some(12.0));
        assert_eq!(assessment.score, 66.0);
        assert_eq!(assessment.tier, Tier::Medium);
    }

    #[test]
    fn test_full_but_static_container_is_not_high() {
        // 85% with no trend: criticality alone (50) is insufficient to reach
        // the high tier.
        let assessment = assess(&make_container(), 85.0, 0.0);
        assert_eq!(assessment.hours_to_full, None);
        assert_eq!(assessment.score, 50.0);
        assert_eq!(assessment.tier, Tier::Medium);
    }

    #[test]
    fn test_full_and_fast_container_is_high() {
        // 85% at 5 %/h: 3h to full -> 50 + 30 + 10 = 90.
        let assessment = assess(&make_container(), 85.0, 5.0);
        assert_eq!(assessment.score, 90.0);
        assert_eq!(assessment.tier, Tier::High);
    }

    #[test]
    fn test_urgency_bands() {
        assert_eq!(urgency(Some(10.0)), 30.0);
        assert_eq!(urgency(Some(24.0)), 20.0);
        assert_eq!(urgency(Some(47.9)), 20.0);
        assert_eq!(urgency(Some(60.0)), 10.0);
        assert_eq!(urgency(Some(100.0)), 0.0);
        assert_eq!(urgency(None), 0.0);
    }

    #[test]
    fn test_score_is_bounded() {
        for level in [0.0, 25.0, 59.9, 60.0, 79.9, 80.0, 100.0] {
            for rate in [0.0, 0.5, 3.0, 10.0, 50.0] {
                let s = score(level, rate);
                assert!((0.0..=100.0).contains(&s), "score {} out of bounds", s);
            }
        }
    }

    #[test]
    fn test_criticality_is_monotonic_in_level() {
        let levels: Vec<f64> = (0..=100).map(|l| l as f64).collect();
        for pair in levels.windows(2) {
            assert!(
                criticality(pair[1]) >= criticality(pair[0]),
                "criticality dropped between {} and {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_rate_bonus_caps_at_20() {
        assert_eq!(rate_bonus(3.0), 6.0);
        assert_eq!(rate_bonus(10.0), 20.0);
        assert_eq!(rate_bonus(100.0), 20.0);
    }

    #[test]
    fn test_tier_breakpoints() {
        assert_eq!(tier_for(70.0), Tier::High);
        assert_eq!(tier_for(69.9), Tier::Medium);
        assert_eq!(tier_for(40.0), Tier::Medium);
        assert_eq!(tier_for(39.9), Tier::Low);
        assert_eq!(tier_for(0.0), Tier::Low);
    }

    #[test]
    fn test_hours_to_full_sentinel() {
        assert_eq!(hours_to_full(50.0, 0.0), None);
        assert_eq!(hours_to_full(64.0, 3.0), Some(12.0));
        assert_eq!(hours_to_full(100.0, 2.0), Some(0.0));
    }
}
