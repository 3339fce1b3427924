/// Maximum points of the time-fit sub-score
pub const TIME_FIT_WEIGHT: f64 = 40.0;

/// Maximum points of the capacity-utilization sub-score
pub const CAPACITY_WEIGHT: f64 = 30.0;

/// Maximum points of the geographic sub-score
pub const GEO_WEIGHT: f64 = 30.0;

/// Fixed geographic points awarded while no distance signal is available
pub const GEO_PLACEHOLDER_POINTS: f64 = 15.0;

/// Suggestions scoring below this are dropped
pub const ACCEPTANCE_FLOOR: f64 = 30.0;

pub const HIGH_CONFIDENCE_SCORE: f64 = 80.0;
pub const MEDIUM_CONFIDENCE_SCORE: f64 = 60.0;

/// Stop count treated as a full route when scoring utilization
pub const DEFAULT_STOP_CEILING: u32 = 20;

/// Utilization band that earns the full capacity score
pub const COMFORT_UTILIZATION_LOW: f64 = 0.4;
pub const COMFORT_UTILIZATION_HIGH: f64 = 0.8;

/// Radius within which the proximity geo score still awards points
pub const DEFAULT_PROXIMITY_RADIUS_KM: f64 = 10.0;

pub const DEFAULT_BACKEND_TIMEOUT_SECONDS: u64 = 30;
