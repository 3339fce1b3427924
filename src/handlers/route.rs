//! Persisted route handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};

use super::{publish_events, serve};
use crate::error::PlanError;
use crate::services::session::{reorder_persisted_route, SessionStore};
use crate::types::RouteReorderRequest;

/// Handle kidroute.route.reorder
///
/// The new stop order is shown straight away and restored if the backend refuses it.
pub async fn handle_reorder(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    let events = client.clone();
    serve(client, subscriber, "route.reorder", move |req: RouteReorderRequest| {
        let (sessions, events) = (Arc::clone(&sessions), events.clone());
        async move {
            let shared = sessions.get(req.session_id)?;
            let mut planner = shared.lock().await;
            let outcome =
                reorder_persisted_route(&mut planner, sessions.backend(), req.route_id, &req.stop_ids).await;
            publish_events(&events, req.session_id, &mut planner).await;
            outcome?;
            Ok::<_, PlanError>(planner.session_view(req.session_id))
        }
    })
    .await
}
