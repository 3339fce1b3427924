//! Planner session handlers
//!
//! Every mutating subject replies with the refreshed session view and
//! publishes the resulting notifications on the session's event subject.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{publish_events, serve};
use crate::error::PlanError;
use crate::services::planner::{PlanFailure, Planner, PlannerStatistics, SessionView};
use crate::services::session::{save_all, SaveReport, SessionStore};
use crate::types::{
    AssignRequest, CreatePlanRequest, DragStartRequest, DropRequest, MovePointRequest,
    MoveScheduleRequest, OpenSessionRequest, PlanRequest, PointMove, ReorderPlanRequest,
    SessionRequest, SetDriverRequest, SetVehicleRequest, UnassignRequest,
};

/// Run one operation under the session lock, publish its events, reply with the view
pub(crate) async fn mutate<T>(
    sessions: &SessionStore,
    events: &Client,
    session_id: Uuid,
    op: impl FnOnce(&mut Planner) -> Result<T, PlanError>,
) -> Result<SessionView, PlanError> {
    let shared = sessions.get(session_id)?;
    let mut planner = shared.lock().await;
    let outcome = op(&mut planner);
    publish_events(events, session_id, &mut planner).await;
    outcome?;
    Ok(planner.session_view(session_id))
}

async fn read<T>(
    sessions: &SessionStore,
    session_id: Uuid,
    view: impl FnOnce(&Planner) -> T,
) -> Result<T, PlanError> {
    let shared = sessions.get(session_id)?;
    let planner = shared.lock().await;
    Ok(view(&planner))
}

/// Move a point one step, or from one index to another
fn apply_point_move(planner: &mut Planner, request: &MovePointRequest) -> Result<(), PlanError> {
    match (request.point_id, request.direction, request.from_index, request.to_index) {
        (Some(point_id), Some(PointMove::Up), _, _) => planner.move_up(request.plan_id, point_id),
        (Some(point_id), Some(PointMove::Down), _, _) => planner.move_down(request.plan_id, point_id),
        (_, _, Some(from), Some(to)) => planner.move_point(request.plan_id, from, to),
        _ => Err(PlanError::MalformedRoute {
            reason: "point move needs pointId with direction, or fromIndex with toIndex".to_string(),
        }),
    }
}

/// Handle kidroute.planner.open
pub async fn handle_open(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    serve(client, subscriber, "planner.open", move |req: OpenSessionRequest| {
        let sessions = Arc::clone(&sessions);
        async move {
            let (session_id, shared) = sessions.open(req.session_id, req.date).await?;
            let planner = shared.lock().await;
            info!("Planning session {} ready for {}", session_id, req.date);
            Ok::<_, PlanError>(planner.session_view(session_id))
        }
    })
    .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClosedSession {
    session_id: Uuid,
}

/// Handle kidroute.planner.close
///
/// Drafts that were not saved are dropped with the session.
pub async fn handle_close(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    serve(client, subscriber, "planner.close", move |req: SessionRequest| {
        let sessions = Arc::clone(&sessions);
        async move {
            sessions.close(req.session_id)?;
            Ok::<_, PlanError>(ClosedSession { session_id: req.session_id })
        }
    })
    .await
}

/// Handle kidroute.planner.state
pub async fn handle_state(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    serve(client, subscriber, "planner.state", move |req: SessionRequest| {
        let sessions = Arc::clone(&sessions);
        async move { read(&sessions, req.session_id, |p| p.session_view(req.session_id)).await }
    })
    .await
}

/// Handle kidroute.planner.plan.create
pub async fn handle_create_plan(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.plan.create", move |req: CreatePlanRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            mutate(&sessions, &events, req.session_id, |p| Ok(p.create_plan(req.name))).await
        }
    })
    .await
}

/// Handle kidroute.planner.plan.discard
pub async fn handle_discard_plan(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.plan.discard", move |req: PlanRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move { mutate(&sessions, &events, req.session_id, |p| p.discard_plan(req.plan_id)).await }
    })
    .await
}

/// Handle kidroute.planner.plan.vehicle
pub async fn handle_set_vehicle(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.plan.vehicle", move |req: SetVehicleRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            mutate(&sessions, &events, req.session_id, |p| p.set_vehicle(req.plan_id, req.vehicle_id)).await
        }
    })
    .await
}

/// Handle kidroute.planner.plan.driver
pub async fn handle_set_driver(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.plan.driver", move |req: SetDriverRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            mutate(&sessions, &events, req.session_id, |p| p.set_driver(req.plan_id, req.driver_id)).await
        }
    })
    .await
}

/// Handle kidroute.planner.assign
pub async fn handle_assign(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.assign", move |req: AssignRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            mutate(&sessions, &events, req.session_id, |p| p.assign(req.schedule_id, req.plan_id)).await
        }
    })
    .await
}

/// Handle kidroute.planner.unassign
pub async fn handle_unassign(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.unassign", move |req: UnassignRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move { mutate(&sessions, &events, req.session_id, |p| p.unassign(req.schedule_id)).await }
    })
    .await
}

/// Handle kidroute.planner.move (schedule to another plan)
pub async fn handle_move(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.move", move |req: MoveScheduleRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            mutate(&sessions, &events, req.session_id, |p| p.move_schedule(req.schedule_id, req.to_plan_id)).await
        }
    })
    .await
}

/// Handle kidroute.planner.reorder
pub async fn handle_reorder(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.reorder", move |req: ReorderPlanRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            mutate(&sessions, &events, req.session_id, |p| p.reorder(req.plan_id, &req.point_ids)).await
        }
    })
    .await
}

/// Handle kidroute.planner.point.move
pub async fn handle_point_move(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.point.move", move |req: MovePointRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move { mutate(&sessions, &events, req.session_id, |p| apply_point_move(p, &req)).await }
    })
    .await
}

/// Handle kidroute.planner.drag.start
pub async fn handle_drag_start(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.drag.start", move |req: DragStartRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            mutate(&sessions, &events, req.session_id, |p| p.begin_drag(req.payload)).await
        }
    })
    .await
}

/// Handle kidroute.planner.drag.end
pub async fn handle_drag_end(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.drag.end", move |req: SessionRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move { mutate(&sessions, &events, req.session_id, |p| Ok(p.end_drag())).await }
    })
    .await
}

/// Handle kidroute.planner.drop
pub async fn handle_drop(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.drop", move |req: DropRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move { mutate(&sessions, &events, req.session_id, |p| p.drop_on(req.plan_id)).await }
    })
    .await
}

/// Handle kidroute.planner.stats
pub async fn handle_stats(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    serve(client, subscriber, "planner.stats", move |req: SessionRequest| {
        let sessions = Arc::clone(&sessions);
        async move {
            read(&sessions, req.session_id, |p| -> PlannerStatistics { p.recompute_statistics() }).await
        }
    })
    .await
}

/// Handle kidroute.planner.validate
pub async fn handle_validate(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    serve(client, subscriber, "planner.validate", move |req: SessionRequest| {
        let sessions = Arc::clone(&sessions);
        async move { read(&sessions, req.session_id, |p| -> Vec<PlanFailure> { p.validate_all() }).await }
    })
    .await
}

/// Handle kidroute.planner.save
///
/// The session stays locked for the whole save, backend round trips included.
pub async fn handle_save(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "planner.save", move |req: SessionRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            let shared = sessions.get(req.session_id)?;
            let mut planner = shared.lock().await;
            let report: SaveReport = save_all(&mut planner, sessions.backend()).await;
            publish_events(&events, req.session_id, &mut planner).await;
            Ok::<_, PlanError>(report)
        }
    })
    .await
}
