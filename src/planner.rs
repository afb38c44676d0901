//! Capacity planning over scored containers.
//!
//! A pure aggregation over the scoring engine's output: bucket assessments
//! into tiers, add up the liters the high tier implies, and check whether
//! the available vehicles can carry them. No side effects.

use crate::config::FleetConfig;
use crate::scoring::{PriorityAssessment, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capacity verdict for the high-priority tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityCheck {
    /// Liters implied by the high tier (Σ level% × capacity)
    pub high_tier_liters: f64,

    /// Whole vehicles needed to carry them
    pub vehicles_required: u32,

    /// Vehicles in the fleet
    pub vehicles_available: u32,

    /// Whether the fleet can cover the high tier
    pub sufficient: bool,
}

/// A complete collection plan: the three tiers ranked by score plus the
/// capacity verdict. A pure function of the assessments and fleet
/// parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionPlan {
    pub high: Vec<PriorityAssessment>,
    pub medium: Vec<PriorityAssessment>,
    pub low: Vec<PriorityAssessment>,
    pub total_containers: usize,
    pub capacity: CapacityCheck,
    pub generated_at: DateTime<Utc>,
}

/// Whole vehicles needed for a load. A fractional remainder always rounds
/// up to one more whole vehicle; an exact multiple stays as-is; an empty
/// load needs none.
pub fn vehicles_required(total_liters: f64, vehicle_capacity_liters: f64) -> u32 {
    if total_liters <= 0.0 {
        return 0;
    }
    let ratio = total_liters / vehicle_capacity_liters;
    let whole = ratio.floor();
    if ratio - whole > 1e-9 {
        whole as u32 + 1
    } else {
        whole as u32
    }
}

/// Build a collection plan from per-container assessments and fleet
/// parameters.
pub fn build_plan(
    mut assessments: Vec<PriorityAssessment>,
    fleet: &FleetConfig,
    generated_at: DateTime<Utc>,
) -> CollectionPlan {
    // Greedy ranking: highest score first, id as a deterministic tiebreak.
    assessments.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.container_id.cmp(&b.container_id))
    });

    let total_containers = assessments.len();
    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut low = Vec::new();

    for assessment in assessments {
        match assessment.tier {
            Tier::High => high.push(assessment),
            Tier::Medium => medium.push(assessment),
            Tier::Low => low.push(assessment),
        }
    }

    let high_tier_liters: f64 = high
        .iter()
        .map(|a| a.level_percent * a.capacity_liters / 100.0)
        .sum();

    let required = vehicles_required(high_tier_liters, fleet.vehicle_capacity_liters);

    CollectionPlan {
        high,
        medium,
        low,
        total_containers,
        capacity: CapacityCheck {
            high_tier_liters,
            vehicles_required: required,
            vehicles_available: fleet.vehicle_count,
            sufficient: required <= fleet.vehicle_count,
        },
        generated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Container, ContainerState};
    use crate::scoring;

    fn make_assessment(id: u32, level: f64, rate: f64, capacity: f64) -> PriorityAssessment {
        let container = Container {
            id,
            name: format!("Container #{}", id),
            location: None,
            capacity_liters: capacity,
            state: ContainerState::Active,
            last_known_level: level,
        };
        scoring::assess(&container, level, rate)
    }

    #[test]
    fn test_fleet_of_two_cannot_cover_five_full_containers() {
        // Five high-tier containers implying 50 000 L against 12 000 L
        // vehicles: 5 required, 2 available -> insufficient.
        let fleet = FleetConfig {
            vehicle_capacity_liters: 12_000.0,
            vehicle_count: 2,
        };
        // level 90% at 5 %/h scores 50 + 30 + 10 = 90 -> high tier.
        // 90% of 11 111.1 L ≈ 10 000 L each.
        let assessments: Vec<PriorityAssessment> = (1..=5)
            .map(|id| make_assessment(id, 90.0, 5.0, 11_111.111))
            .collect();

        let plan = build_plan(assessments, &fleet, Utc::now());
        assert_eq!(plan.high.len(), 5);
        assert!((plan.capacity.high_tier_liters - 50_000.0).abs() < 1.0);
        assert_eq!(plan.capacity.vehicles_required, 5);
        assert!(!plan.capacity.sufficient);
    }

    #[test]
    fn test_vehicles_required_rounding() {
        assert_eq!(vehicles_required(50_000.0, 12_000.0), 5);
        assert_eq!(vehicles_required(24_000.0, 12_000.0), 2);
        assert_eq!(vehicles_required(24_001.0, 12_000.0), 3);
        assert_eq!(vehicles_required(1.0, 12_000.0), 1);
        assert_eq!(vehicles_required(0.0, 12_000.0), 0);
    }

    #[test]
    fn test_tiers_ranked_by_score() {
        let fleet = FleetConfig::default();
        let assessments = vec![
            make_assessment(1, 50.0, 0.0, 3_300.0), // 15.0, low
            make_assessment(2, 64.0, 3.0, 3_300.0), // 66.0, medium
            make_assessment(3, 85.0, 5.0, 3_300.0), // 90.0, high
            make_assessment(4, 62.0, 2.0, 3_300.0), // 64.0, medium
        ];

        let plan = build_plan(assessments, &fleet, Utc::now());
        assert_eq!(plan.total_containers, 4);
        assert_eq!(plan.high.len(), 1);
        assert_eq!(plan.high[0].container_id, 3);
        let medium_ids: Vec<u32> = plan.medium.iter().map(|a| a.container_id).collect();
        assert_eq!(medium_ids, vec![2, 4]);
        assert_eq!(plan.low[0].container_id, 1);
    }

    #[test]
    fn test_empty_fleet_plan_is_complete_and_sufficient() {
        let plan = build_plan(Vec::new(), &FleetConfig::default(), Utc::now());
        assert_eq!(plan.total_containers, 0);
        assert!(plan.high.is_empty());
        assert_eq!(plan.capacity.high_tier_liters, 0.0);
        assert_eq!(plan.capacity.vehicles_required, 0);
        assert!(plan.capacity.sufficient);
    }

    #[test]
    fn test_medium_and_low_tiers_do_not_consume_capacity() {
        let fleet = FleetConfig {
            vehicle_capacity_liters: 12_000.0,
            vehicle_count: 1,
        };
        let assessments = vec![
            make_assessment(1, 64.0, 3.0, 50_000.0), // medium, huge volume
            make_assessment(2, 10.0, 0.0, 50_000.0), // low
        ];

        let plan = build_plan(assessments, &fleet, Utc::now());
        assert_eq!(plan.capacity.high_tier_liters, 0.0);
        assert_eq!(plan.capacity.vehicles_required, 0);
        assert!(plan.capacity.sufficient);
    }
}
