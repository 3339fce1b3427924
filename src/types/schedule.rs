//! Child schedule types

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Address, TransportNeeds};
use crate::services::time_window::deserialize_clock;

/// A child's pickup/drop-off schedule not yet placed on a route for the selected date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedSchedule {
    pub schedule_id: Uuid,
    pub child_id: Uuid,
    pub child_name: String,
    pub pickup_address: Address,
    #[serde(deserialize_with = "deserialize_clock")]
    pub pickup_time: NaiveTime,
    pub dropoff_address: Address,
    #[serde(deserialize_with = "deserialize_clock")]
    pub dropoff_time: NaiveTime,
    #[serde(default)]
    pub needs: TransportNeeds,
}
