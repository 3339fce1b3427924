//! NATS message handlers

pub mod matching;
pub mod ping;
pub mod planner;
pub mod route;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subject, Subscriber};
use futures::future::select_all;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::PlanError;
use crate::services::backend::{create_backend_with_fallback, TransportBackend};
use crate::services::planner::Planner;
use crate::services::session::SessionStore;
use crate::types::{ErrorResponse, Request, SuccessResponse};

/// Subject prefix of the per-session event stream
pub const EVENTS_SUBJECT_PREFIX: &str = "kidroute.planner.events";

/// Error reply carrying the structured failure (numbers, names) as details
pub(crate) fn plan_error_response(request_id: Uuid, error: &PlanError) -> ErrorResponse {
    let response = ErrorResponse::new(request_id, error.code(), error.to_string());
    match serde_json::to_value(error) {
        Ok(details) => response.with_details(details),
        Err(_) => response,
    }
}

/// One request pulled off a subscription
pub(crate) struct Incoming {
    pub reply: Subject,
    pub payload: Vec<u8>,
}

/// Request/reply loop shared by every subject.
///
/// Parses the `Request<T>` envelope, runs `handle` on the payload and replies
/// with a `SuccessResponse` or an `ErrorResponse`.
pub(crate) async fn serve<T, R, F, Fut>(
    client: Client,
    subscriber: Subscriber,
    subject: &'static str,
    handle: F,
) -> Result<()>
where
    T: DeserializeOwned,
    R: Serialize + Send + 'static,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, PlanError>> + Send + 'static,
{
    let requests = subscriber.filter_map(move |msg| async move {
        match msg.reply {
            Some(reply) => Some(Incoming {
                reply,
                payload: msg.payload.to_vec(),
            }),
            None => {
                warn!("{} message without reply subject", subject);
                None
            }
        }
    });

    let send = move |reply: Subject, bytes: Vec<u8>| {
        let client = client.clone();
        async move {
            if let Err(e) = client.publish(reply, bytes.into()).await {
                warn!("Failed to send {} reply: {}", subject, e);
            }
        }
    };

    dispatch(requests, subject, handle, send).await;
    Ok(())
}

/// Every parsed request runs on its own task: a request waiting on one
/// session's lock must not hold up the same subject for other sessions.
pub(crate) async fn dispatch<S, T, R, F, Fut, P, PFut>(requests: S, subject: &'static str, mut handle: F, send: P)
where
    S: Stream<Item = Incoming>,
    T: DeserializeOwned,
    R: Serialize + Send + 'static,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, PlanError>> + Send + 'static,
    P: Fn(Subject, Vec<u8>) -> PFut + Clone + Send + 'static,
    PFut: Future<Output = ()> + Send,
{
    let mut requests = std::pin::pin!(requests);
    while let Some(incoming) = requests.next().await {
        debug!("Received {} message", subject);

        let request: Request<T> = match serde_json::from_slice(&incoming.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse {} request: {}", subject, e);
                let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                if let Some(bytes) = encode_reply(subject, &response) {
                    send(incoming.reply, bytes).await;
                }
                continue;
            }
        };

        let request_id = request.id;
        let pending = handle(request.payload);
        let send = send.clone();
        tokio::spawn(async move {
            let bytes = match pending.await {
                Ok(payload) => encode_reply(subject, &SuccessResponse::new(request_id, payload)),
                Err(e) => {
                    if e.is_business_rule() {
                        debug!("{} refused: {}", subject, e);
                    } else {
                        warn!("{} failed: {}", subject, e);
                    }
                    encode_reply(subject, &plan_error_response(request_id, &e))
                }
            };
            if let Some(bytes) = bytes {
                send(incoming.reply, bytes).await;
            }
        });
    }
}

fn encode_reply<M: Serialize>(subject: &str, message: &M) -> Option<Vec<u8>> {
    match serde_json::to_vec(message) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!("Failed to encode {} reply: {}", subject, e);
            None
        }
    }
}

/// Publish queued planner notifications on `kidroute.planner.events.<session>`
pub(crate) async fn publish_events(client: &Client, session_id: Uuid, planner: &mut Planner) {
    let subject = format!("{}.{}", EVENTS_SUBJECT_PREFIX, session_id);
    for event in planner.take_notifications() {
        let bytes = match serde_json::to_vec(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode planner event: {}", e);
                continue;
            }
        };
        if let Err(e) = client.publish(subject.clone(), bytes.into()).await {
            warn!("Failed to publish planner event on {}: {}", subject, e);
        }
    }
}

/// Start all message handlers
pub async fn start_handlers(client: Client, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let backend: Arc<dyn TransportBackend> = Arc::from(create_backend_with_fallback(config.backend()));
    info!("Backend initialized: {}", backend.name());

    let sessions = Arc::new(SessionStore::new(backend, config.match_config()));

    let mut handles: Vec<(&'static str, JoinHandle<Result<()>>)> = Vec::new();

    macro_rules! spawn_handler {
        ($subject:expr, $handler:path) => {{
            let subscriber = client.subscribe($subject).await?;
            let client = client.clone();
            let sessions = Arc::clone(&sessions);
            handles.push((
                $subject,
                tokio::spawn(async move { $handler(client, subscriber, sessions).await }),
            ));
        }};
    }

    spawn_handler!("kidroute.ping", ping::handle_ping);

    // Planner sessions
    spawn_handler!("kidroute.planner.open", planner::handle_open);
    spawn_handler!("kidroute.planner.close", planner::handle_close);
    spawn_handler!("kidroute.planner.state", planner::handle_state);
    spawn_handler!("kidroute.planner.plan.create", planner::handle_create_plan);
    spawn_handler!("kidroute.planner.plan.discard", planner::handle_discard_plan);
    spawn_handler!("kidroute.planner.plan.vehicle", planner::handle_set_vehicle);
    spawn_handler!("kidroute.planner.plan.driver", planner::handle_set_driver);
    spawn_handler!("kidroute.planner.assign", planner::handle_assign);
    spawn_handler!("kidroute.planner.unassign", planner::handle_unassign);
    spawn_handler!("kidroute.planner.move", planner::handle_move);
    spawn_handler!("kidroute.planner.reorder", planner::handle_reorder);
    spawn_handler!("kidroute.planner.point.move", planner::handle_point_move);
    spawn_handler!("kidroute.planner.drag.start", planner::handle_drag_start);
    spawn_handler!("kidroute.planner.drag.end", planner::handle_drag_end);
    spawn_handler!("kidroute.planner.drop", planner::handle_drop);
    spawn_handler!("kidroute.planner.stats", planner::handle_stats);
    spawn_handler!("kidroute.planner.validate", planner::handle_validate);
    spawn_handler!("kidroute.planner.save", planner::handle_save);

    // Persisted routes
    spawn_handler!("kidroute.route.reorder", route::handle_reorder);

    // Auto-match
    spawn_handler!("kidroute.match.suggest", matching::handle_suggest);

    info!("All {} handlers started, waiting for messages...", handles.len());

    // Any handler finishing means its subscription is gone
    let (subjects, tasks): (Vec<&'static str>, Vec<JoinHandle<Result<()>>>) = handles.into_iter().unzip();
    let (result, index, _) = select_all(tasks).await;
    error!("{} handler finished: {:?}", subjects[index], result);

    Ok(())
}
