//! Auto-match handler

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::serve;
use crate::error::PlanError;
use crate::services::auto_match::{MatchSuggestion, PoolSuggestion};
use crate::services::planner::Planner;
use crate::services::session::SessionStore;
use crate::types::SuggestRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SuggestResponse {
    /// Every acceptable route for one schedule, best first
    Schedule {
        schedule_id: Uuid,
        candidates: Vec<MatchSuggestion>,
    },
    /// Best route (if any) per pool schedule
    Pool { suggestions: Vec<PoolSuggestion> },
}

fn suggest(planner: &Planner, schedule_id: Option<Uuid>) -> Result<SuggestResponse, PlanError> {
    match schedule_id {
        Some(schedule_id) => Ok(SuggestResponse::Schedule {
            schedule_id,
            candidates: planner.suggest(schedule_id)?,
        }),
        None => Ok(SuggestResponse::Pool {
            suggestions: planner.suggest_pool(),
        }),
    }
}

/// Handle kidroute.match.suggest
pub async fn handle_suggest(client: Client, subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    serve(client, subscriber, "match.suggest", move |req: SuggestRequest| {
        let sessions = Arc::clone(&sessions);
        async move {
            let shared = sessions.get(req.session_id)?;
            let planner = shared.lock().await;
            let response = suggest(&planner, req.schedule_id)?;
            Ok::<_, PlanError>(response)
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::error::EntityKind;
    use crate::services::auto_match::MatchConfig;
    use crate::services::planner::DaySnapshot;
    use crate::services::route_plan::tests::{schedule, t};

    fn planner() -> Planner {
        let snapshot = DaySnapshot {
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            pool: vec![schedule(1, t(8, 0), t(8, 30), false)],
            ..DaySnapshot::default()
        };
        Planner::new(snapshot, MatchConfig::default())
    }

    #[test]
    fn test_pool_scope_without_routes() {
        let response = suggest(&planner(), None).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["scope"], "pool");
        assert_eq!(json["suggestions"][0]["childName"], "Child 1");
        assert!(json["suggestions"][0]["suggestion"].is_null());
    }

    #[test]
    fn test_schedule_scope() {
        let response = suggest(&planner(), Some(Uuid::from_u128(1))).unwrap();
        match response {
            SuggestResponse::Schedule { schedule_id, candidates } => {
                assert_eq!(schedule_id, Uuid::from_u128(1));
                assert!(candidates.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_schedule() {
        let err = suggest(&planner(), Some(Uuid::from_u128(42))).unwrap_err();
        assert_eq!(err, PlanError::not_found(EntityKind::Schedule, Uuid::from_u128(42)));
    }
}
