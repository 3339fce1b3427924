//! Auto-match scorer
//!
//! Ranks persisted routes for an unassigned schedule. A score (0-100) is the
//! sum of three sub-scores, capped at 100:
//! - time fit (40): how close the pickup is to the middle of the route window
//! - capacity (30): stop-count utilization, best between 40% and 80%
//! - geography (30): extension point, a fixed value unless proximity is enabled
//!
//! A route whose window does not contain the pickup time is never suggested.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::defaults::{
    ACCEPTANCE_FLOOR, CAPACITY_WEIGHT, COMFORT_UTILIZATION_HIGH, COMFORT_UTILIZATION_LOW,
    DEFAULT_PROXIMITY_RADIUS_KM, DEFAULT_STOP_CEILING, GEO_PLACEHOLDER_POINTS, GEO_WEIGHT,
    HIGH_CONFIDENCE_SCORE, MEDIUM_CONFIDENCE_SCORE, TIME_FIT_WEIGHT,
};
use crate::services::geo::haversine_distance;
use crate::services::time_window::{format_clock, TimeWindow};
use crate::types::{PersistedRoute, UnassignedSchedule};

/// How the geographic sub-score is produced, chosen at start-up by `MATCH_GEO_MODE`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum GeoScore {
    /// Same points for every candidate
    Fixed { points: f64 },
    /// Linear decay with the distance between pickup and route centroid.
    /// Falls back to `fallback_points` when either position is unknown.
    #[serde(rename_all = "camelCase")]
    Proximity {
        max_points: f64,
        radius_km: f64,
        fallback_points: f64,
    },
}

impl Default for GeoScore {
    fn default() -> Self {
        GeoScore::Fixed {
            points: GEO_PLACEHOLDER_POINTS,
        }
    }
}

impl GeoScore {
    pub fn proximity() -> Self {
        GeoScore::Proximity {
            max_points: GEO_WEIGHT,
            radius_km: DEFAULT_PROXIMITY_RADIUS_KM,
            fallback_points: GEO_PLACEHOLDER_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub acceptance_floor: f64,
    /// Stop count treated as a full route
    pub stop_ceiling: u32,
    pub geo: GeoScore,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            acceptance_floor: ACCEPTANCE_FLOOR,
            stop_ceiling: DEFAULT_STOP_CEILING,
            geo: GeoScore::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE_SCORE {
            Confidence::High
        } else if score >= MEDIUM_CONFIDENCE_SCORE {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub time_fit: f64,
    pub capacity: f64,
    pub geo: f64,
    pub total: f64,
}

/// Ephemeral scoring result, recomputed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSuggestion {
    pub schedule_id: Uuid,
    pub route_id: Uuid,
    pub route_name: String,
    pub score: f64,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
    pub proposed_pickup_time: NaiveTime,
    pub proposed_dropoff_time: NaiveTime,
    pub breakdown: ScoreBreakdown,
}

/// Best suggestion (if any) for one pool schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSuggestion {
    pub schedule_id: Uuid,
    pub child_name: String,
    pub suggestion: Option<MatchSuggestion>,
}

/// 40 at the window midpoint, falling linearly to 0 at the edges; 0 outside
pub fn time_fit_score(pickup: NaiveTime, window: &TimeWindow) -> f64 {
    if !window.contains(pickup) {
        return 0.0;
    }
    let half = window.half_width_minutes();
    if half <= 0.0 {
        // zero-width window hit exactly
        return TIME_FIT_WEIGHT;
    }
    let distance = window.distance_from_midpoint(pickup);
    (TIME_FIT_WEIGHT * (1.0 - distance / half)).max(0.0)
}

pub fn utilization(stop_count: u32, ceiling: u32) -> f64 {
    if ceiling == 0 {
        return 1.0;
    }
    f64::from(stop_count) / f64::from(ceiling)
}

/// Ramp up to 30 at 40% utilization, flat to 80%, ramp down to 0 at 100%
pub fn capacity_score(stop_count: u32, ceiling: u32) -> f64 {
    let used = utilization(stop_count, ceiling);
    if used >= 1.0 {
        0.0
    } else if used > COMFORT_UTILIZATION_HIGH {
        CAPACITY_WEIGHT * (1.0 - used) / (1.0 - COMFORT_UTILIZATION_HIGH)
    } else if used >= COMFORT_UTILIZATION_LOW {
        CAPACITY_WEIGHT
    } else {
        CAPACITY_WEIGHT * used / COMFORT_UTILIZATION_LOW
    }
}

pub fn geo_score(schedule: &UnassignedSchedule, route: &PersistedRoute, geo: &GeoScore) -> f64 {
    match *geo {
        GeoScore::Fixed { points } => points,
        GeoScore::Proximity {
            max_points,
            radius_km,
            fallback_points,
        } => match (schedule.pickup_address.coordinates, route.centroid) {
            (Some(pickup), Some(center)) if radius_km > 0.0 => {
                let distance = haversine_distance(&pickup, &center);
                (max_points * (1.0 - distance / radius_km)).max(0.0)
            }
            _ => fallback_points,
        },
    }
}

fn route_window(route: &PersistedRoute) -> TimeWindow {
    TimeWindow::new(route.estimated_start, route.estimated_end)
}

/// Score one candidate. `None` when the pickup falls outside the route window.
pub fn score(
    schedule: &UnassignedSchedule,
    route: &PersistedRoute,
    config: &MatchConfig,
) -> Option<ScoreBreakdown> {
    let window = route_window(route);
    if !window.contains(schedule.pickup_time) {
        return None;
    }

    let time_fit = time_fit_score(schedule.pickup_time, &window);
    let capacity = capacity_score(route.stop_count, config.stop_ceiling);
    let geo = geo_score(schedule, route, &config.geo);

    Some(ScoreBreakdown {
        time_fit,
        capacity,
        geo,
        total: (time_fit + capacity + geo).min(100.0),
    })
}

fn reasons(
    schedule: &UnassignedSchedule,
    route: &PersistedRoute,
    breakdown: &ScoreBreakdown,
    confidence: Confidence,
    config: &MatchConfig,
) -> Vec<String> {
    let pickup = format_clock(schedule.pickup_time);
    let window = route_window(route).label();
    let mut reasons = vec![match confidence {
        Confidence::High => format!("Pickup {} sits comfortably inside {} ({})", pickup, route.name, window),
        Confidence::Medium => format!("Pickup {} fits the window of {} ({})", pickup, route.name, window),
        Confidence::Low => format!("Pickup {} is near the edge of {} ({})", pickup, route.name, window),
    }];

    let used = utilization(route.stop_count, config.stop_ceiling);
    if breakdown.capacity >= CAPACITY_WEIGHT {
        reasons.push(format!("{} stops planned, room to spare", route.stop_count));
    } else if used >= COMFORT_UTILIZATION_HIGH {
        reasons.push(format!("{} stops planned, route is nearly full", route.stop_count));
    } else {
        reasons.push(format!("{} stops planned, route is lightly used", route.stop_count));
    }

    if let GeoScore::Proximity { .. } = config.geo {
        if let (Some(pickup), Some(center)) = (schedule.pickup_address.coordinates, route.centroid) {
            reasons.push(format!(
                "Pickup at {} is {:.1} km from the route center",
                schedule.pickup_address.one_line(),
                haversine_distance(&pickup, &center)
            ));
        }
    }

    reasons
}

fn suggestion(
    schedule: &UnassignedSchedule,
    route: &PersistedRoute,
    breakdown: ScoreBreakdown,
    config: &MatchConfig,
) -> MatchSuggestion {
    let confidence = Confidence::from_score(breakdown.total);
    MatchSuggestion {
        schedule_id: schedule.schedule_id,
        route_id: route.id,
        route_name: route.name.clone(),
        score: breakdown.total,
        confidence,
        reasons: reasons(schedule, route, &breakdown, confidence, config),
        proposed_pickup_time: schedule.pickup_time,
        proposed_dropoff_time: schedule.dropoff_time,
        breakdown,
    }
}

/// Candidates scoring at least the acceptance floor, best first.
///
/// Empty when even the best candidate is below the floor. Ties keep input
/// order, so the first-seen route wins.
pub fn rank_candidates(
    schedule: &UnassignedSchedule,
    routes: &[PersistedRoute],
    config: &MatchConfig,
) -> Vec<MatchSuggestion> {
    let mut scored: Vec<MatchSuggestion> = routes
        .iter()
        .filter_map(|route| score(schedule, route, config).map(|b| (route, b)))
        .filter(|(_, b)| b.total >= config.acceptance_floor)
        .map(|(route, b)| suggestion(schedule, route, b, config))
        .collect();

    // stable sort keeps first-seen order among equal scores
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    debug!(
        "Schedule {}: {} of {} routes above floor",
        schedule.schedule_id,
        scored.len(),
        routes.len()
    );
    scored
}

pub fn best_match(
    schedule: &UnassignedSchedule,
    routes: &[PersistedRoute],
    config: &MatchConfig,
) -> Option<MatchSuggestion> {
    rank_candidates(schedule, routes, config).into_iter().next()
}

/// Best match for every schedule in the pool
pub fn suggest_for_pool(
    schedules: &[UnassignedSchedule],
    routes: &[PersistedRoute],
    config: &MatchConfig,
) -> Vec<PoolSuggestion> {
    schedules
        .iter()
        .map(|schedule| PoolSuggestion {
            schedule_id: schedule.schedule_id,
            child_name: schedule.child_name.clone(),
            suggestion: best_match(schedule, routes, config),
        })
        .collect()
}
