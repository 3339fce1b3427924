//! Stop point types

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// GPS coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Postal address of a pickup or drop-off
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub postal_code: String,
    pub city: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Address {
    /// Single-line form used in match reasons
    pub fn one_line(&self) -> String {
        let mut line = format!("{} {}", self.street, self.number);
        if let Some(unit) = self.unit.as_deref().filter(|u| !u.is_empty()) {
            line.push('/');
            line.push_str(unit);
        }
        format!("{}, {} {}", line, self.postal_code, self.city)
    }
}

/// Special transport requirements of a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportNeeds {
    #[serde(default)]
    pub wheelchair: bool,
    #[serde(default)]
    pub special_seat: bool,
    #[serde(default)]
    pub safety_belt: bool,
}

impl TransportNeeds {
    /// Seats taken while on board. A wheelchair occupies two seats.
    pub const fn seat_weight(self) -> u32 {
        if self.wheelchair {
            2
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopKind {
    Pickup,
    Dropoff,
}

/// One pickup or drop-off event of a child's schedule within a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPoint {
    pub id: Uuid,
    pub kind: StopKind,
    pub child_id: Uuid,
    pub child_name: String,
    pub schedule_id: Uuid,
    /// Order within the route (1-based, contiguous)
    pub position: u32,
    pub address: Address,
    pub time: NaiveTime,
    #[serde(default)]
    pub needs: TransportNeeds,
}

/// Anything that can be sequenced along a route: draft points and persisted stops alike.
pub trait StopEvent {
    fn schedule_id(&self) -> Uuid;
    fn kind(&self) -> StopKind;
    fn child_name(&self) -> &str;
}

impl StopEvent for StopPoint {
    fn schedule_id(&self) -> Uuid {
        self.schedule_id
    }

    fn kind(&self) -> StopKind {
        self.kind
    }

    fn child_name(&self) -> &str {
        &self.child_name
    }
}
