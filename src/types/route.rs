//! Route types

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Coordinates, StopEvent, StopKind, Vehicle};

/// A route already stored by the backend for a date.
///
/// Used as auto-match candidate and as the target of after-the-fact reorders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRoute {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
    pub estimated_start: NaiveTime,
    pub estimated_end: NaiveTime,
    /// Current number of stops on the route
    pub stop_count: u32,
    /// Rough center of the route's stops (if the backend knows it)
    #[serde(default)]
    pub centroid: Option<Coordinates>,
    /// Ordered stops; the list endpoint may omit them
    #[serde(default)]
    pub stops: Vec<PersistedStop>,
}

/// A stop on a persisted route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStop {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub child_id: Uuid,
    #[serde(default)]
    pub child_name: String,
    pub schedule_id: Uuid,
    pub position: u32,
    pub time: NaiveTime,
}

impl StopEvent for PersistedStop {
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

/// Stop descriptor inside a route creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDescriptor {
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub child_id: Uuid,
    pub schedule_id: Uuid,
    pub position: u32,
    pub time: NaiveTime,
}

/// Request sent to the backend when a draft plan is saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    pub name: String,
    pub date: NaiveDate,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub estimated_start: NaiveTime,
    pub estimated_end: NaiveTime,
    pub stops: Vec<StopDescriptor>,
}

/// Backend response to a route creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoute {
    pub id: Uuid,
    /// Stops with backend-assigned ids; older backends reply with the id only
    #[serde(default)]
    pub stops: Vec<PersistedStop>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPositionUpdate {
    pub stop_id: Uuid,
    pub position: u32,
}

/// Incremental reorder of a persisted route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRouteRequest {
    pub route_id: Uuid,
    pub stops: Vec<StopPositionUpdate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_route_request_wire_format() {
        let request = CreateRouteRequest {
            name: "Morning A".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            driver_id: Uuid::nil(),
            vehicle_id: Uuid::nil(),
            estimated_start: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            estimated_end: NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
            stops: vec![StopDescriptor {
                kind: StopKind::Pickup,
                child_id: Uuid::nil(),
                schedule_id: Uuid::nil(),
                position: 1,
                time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["date"], "2026-03-02");
        assert_eq!(json["estimatedStart"], "07:30:00");
        assert_eq!(json["stops"][0]["type"], "PICKUP");
        assert_eq!(json["stops"][0]["position"], 1);
    }

    #[test]
    fn test_persisted_route_without_stops() {
        let json = r#"{
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "name": "Route 7",
            "date": "2026-03-02",
            "estimatedStart": "07:00:00",
            "estimatedEnd": "08:00:00",
            "stopCount": 6
        }"#;

        let route: PersistedRoute = serde_json::from_str(json).unwrap();
        assert_eq!(route.stop_count, 6);
        assert!(route.stops.is_empty());
        assert!(route.vehicle.is_none());
    }
}
