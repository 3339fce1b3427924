//! Planner session request payloads

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What is currently being dragged in a planning session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DragPayload {
    /// A schedule picked from the unassigned pool
    Pool { schedule_id: Uuid },
    /// A schedule picked from a draft plan
    Plan { schedule_id: Uuid, plan_id: Uuid },
}

impl DragPayload {
    pub fn schedule_id(&self) -> Uuid {
        match *self {
            DragPayload::Pool { schedule_id } | DragPayload::Plan { schedule_id, .. } => schedule_id,
        }
    }
}

/// Open a session for a date, or reset an existing one to a new date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    pub session_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub session_id: Uuid,
    pub plan_id: Uuid,
}

/// `vehicle_id: null` removes the vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVehicleRequest {
    pub session_id: Uuid,
    pub plan_id: Uuid,
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDriverRequest {
    pub session_id: Uuid,
    pub plan_id: Uuid,
    #[serde(default)]
    pub driver_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub session_id: Uuid,
    pub schedule_id: Uuid,
    pub plan_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignRequest {
    pub session_id: Uuid,
    pub schedule_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveScheduleRequest {
    pub session_id: Uuid,
    pub schedule_id: Uuid,
    pub to_plan_id: Uuid,
}

/// Full new order of a draft plan's points
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderPlanRequest {
    pub session_id: Uuid,
    pub plan_id: Uuid,
    pub point_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointMove {
    Up,
    Down,
}

/// Move one point: either a single step (`direction`) or to an index (`from_index`/`to_index`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePointRequest {
    pub session_id: Uuid,
    pub plan_id: Uuid,
    #[serde(default)]
    pub point_id: Option<Uuid>,
    #[serde(default)]
    pub direction: Option<PointMove>,
    #[serde(default)]
    pub from_index: Option<usize>,
    #[serde(default)]
    pub to_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragStartRequest {
    pub session_id: Uuid,
    pub payload: DragPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropRequest {
    pub session_id: Uuid,
    pub plan_id: Uuid,
}

/// Reorder of a route that is already persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReorderRequest {
    pub session_id: Uuid,
    pub route_id: Uuid,
    pub stop_ids: Vec<Uuid>,
}

/// Auto-match one pool schedule, or the whole pool when `schedule_id` is absent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    pub session_id: Uuid,
    #[serde(default)]
    pub schedule_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_payload_tagged_by_source() {
        let json = r#"{"source":"plan","scheduleId":"00000000-0000-0000-0000-000000000001","planId":"00000000-0000-0000-0000-000000000002"}"#;
        let payload: DragPayload = serde_json::from_str(json).unwrap();
        assert_eq!(
            payload,
            DragPayload::Plan {
                schedule_id: Uuid::from_u128(1),
                plan_id: Uuid::from_u128(2),
            }
        );
        assert_eq!(payload.schedule_id(), Uuid::from_u128(1));

        let pool = serde_json::to_value(DragPayload::Pool { schedule_id: Uuid::nil() }).unwrap();
        assert_eq!(pool["source"], "pool");
    }

    #[test]
    fn test_move_point_request_step() {
        let json = r#"{
            "sessionId": "00000000-0000-0000-0000-000000000001",
            "planId": "00000000-0000-0000-0000-000000000002",
            "pointId": "00000000-0000-0000-0000-000000000003",
            "direction": "up"
        }"#;
        let request: MovePointRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.direction, Some(PointMove::Up));
        assert!(request.from_index.is_none());
    }

    #[test]
    fn test_open_session_without_id() {
        let request: OpenSessionRequest = serde_json::from_str(r#"{"date":"2026-03-02"}"#).unwrap();
        assert!(request.session_id.is_none());
    }
}
