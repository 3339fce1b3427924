//! Planning sessions
//!
//! One `Planner` per session, each behind its own async mutex. Every mutation
//! and every save (including its backend round trips) holds that mutex, so two
//! requests against the same session never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BackendError, EntityKind, PlanError};
use crate::services::auto_match::MatchConfig;
use crate::services::backend::TransportBackend;
use crate::services::planner::{DaySnapshot, PlanFailure, Planner};

pub type SharedPlanner = Arc<Mutex<Planner>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPlan {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub route_id: Uuid,
}

/// Outcome of a bulk save. Not transactional: some plans may be saved while others failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub saved: Vec<SavedPlan>,
    pub failures: Vec<PlanFailure>,
    /// Validation failed, nothing was sent to the backend
    pub blocked: bool,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        !self.blocked && self.failures.is_empty()
    }
}

/// Fetch everything a planning session needs for one date
pub async fn load_day(backend: &dyn TransportBackend, date: NaiveDate) -> Result<DaySnapshot, BackendError> {
    let (pool, routes, vehicles, drivers) = tokio::try_join!(
        backend.unassigned_schedules(date),
        backend.routes(date),
        backend.vehicles(),
        backend.drivers(),
    )?;
    debug!(
        "Loaded {}: {} schedules, {} routes, {} vehicles, {} drivers",
        date,
        pool.len(),
        routes.len(),
        vehicles.len(),
        drivers.len()
    );
    Ok(DaySnapshot {
        date,
        pool,
        routes,
        vehicles,
        drivers,
    })
}

/// Validate every plan, then create one route per plan.
///
/// Any validation failure stops the save before the first request. A plan the
/// backend refuses stays a draft with its schedules; the others still go through.
pub async fn save_all(planner: &mut Planner, backend: &dyn TransportBackend) -> SaveReport {
    let requests = match planner.prepare_save() {
        Ok(requests) => requests,
        Err(failures) => {
            info!("Save blocked by {} validation failures", failures.len());
            return SaveReport {
                failures,
                blocked: true,
                ..SaveReport::default()
            };
        }
    };

    let mut report = SaveReport::default();
    for (plan_id, request) in requests {
        match backend.create_route(&request).await {
            Ok(created) => {
                let route_id = created.id;
                match planner.complete_save(plan_id, created) {
                    Ok(()) => report.saved.push(SavedPlan {
                        plan_id,
                        plan_name: request.name,
                        route_id,
                    }),
                    Err(e) => warn!("Saved route {} but plan {} is gone: {}", route_id, plan_id, e),
                }
            }
            Err(e) => {
                let error = PlanError::from(e);
                planner.fail_save(plan_id, &error);
                report.failures.push(PlanFailure {
                    plan_id,
                    plan_name: request.name,
                    message: error.to_string(),
                    error,
                });
            }
        }
    }

    info!(
        "Save finished: {} saved, {} failed",
        report.saved.len(),
        report.failures.len()
    );
    report
}

/// Reorder a persisted route: applied locally first, restored if the backend refuses
pub async fn reorder_persisted_route(
    planner: &mut Planner,
    backend: &dyn TransportBackend,
    route_id: Uuid,
    stop_ids: &[Uuid],
) -> Result<(), PlanError> {
    let (request, rollback) = planner.begin_route_reorder(route_id, stop_ids)?;
    if let Err(e) = backend.reorder_route(&request).await {
        planner.rollback_route_reorder(rollback);
        return Err(e.into());
    }
    Ok(())
}

/// Live planning sessions
pub struct SessionStore {
    backend: Arc<dyn TransportBackend>,
    match_config: MatchConfig,
    sessions: RwLock<HashMap<Uuid, SharedPlanner>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn TransportBackend>, match_config: MatchConfig) -> Self {
        Self {
            backend,
            match_config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &dyn TransportBackend {
        self.backend.as_ref()
    }

    /// Open a new session, or reset an existing one to `date` with a fresh snapshot
    pub async fn open(&self, session_id: Option<Uuid>, date: NaiveDate) -> Result<(Uuid, SharedPlanner), PlanError> {
        let snapshot = load_day(self.backend.as_ref(), date).await?;

        if let Some(id) = session_id {
            let planner = self.get(id)?;
            planner.lock().await.reset(snapshot);
            info!("Session {} switched to {}", id, date);
            return Ok((id, planner));
        }

        let id = Uuid::new_v4();
        let planner = Arc::new(Mutex::new(Planner::new(snapshot, self.match_config.clone())));
        self.sessions.write().insert(id, Arc::clone(&planner));
        info!("Session {} opened for {}", id, date);
        Ok((id, planner))
    }

    pub fn get(&self, session_id: Uuid) -> Result<SharedPlanner, PlanError> {
        self.sessions
            .read()
            .get(&session_id)
            .cloned()
            .ok_or(PlanError::not_found(EntityKind::Session, session_id))
    }

    /// Forget a session. Requests already holding its planner finish normally.
    pub fn close(&self, session_id: Uuid) -> Result<(), PlanError> {
        match self.sessions.write().remove(&session_id) {
            Some(_) => {
                info!("Session {} closed", session_id);
                Ok(())
            }
            None => Err(PlanError::not_found(EntityKind::Session, session_id)),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    use crate::services::backend::MockBackend;
    use crate::services::route_plan::tests::{driver, schedule, t, vehicle};
    use crate::types::{PersistedRoute, PersistedStop, StopKind};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn backend() -> MockBackend {
        MockBackend::new()
            .with_schedules((1..=3).map(|n| schedule(n, t(8, 0), t(8, 30), false)).collect())
            .with_vehicles(vec![vehicle(4, 0)])
            .with_drivers(vec![driver()])
    }

    fn store(backend: MockBackend) -> SessionStore {
        SessionStore::new(Arc::new(backend), MatchConfig::default())
    }

    fn plan_with(planner: &mut Planner, name: &str, schedules: &[u128]) -> Uuid {
        let plan_id = planner.create_plan(name);
        planner.set_vehicle(plan_id, Some(vehicle(4, 0).id)).unwrap();
        planner.set_driver(plan_id, Some(driver().id)).unwrap();
        for n in schedules {
            planner.assign(Uuid::from_u128(*n), plan_id).unwrap();
        }
        plan_id
    }

    #[tokio::test]
    async fn test_open_and_reopen_session() {
        let store = store(backend());
        let (id, planner) = store.open(None, date()).await.unwrap();
        assert_eq!(store.len(), 1);
        plan_with(&mut *planner.lock().await, "A", &[1]);

        let next = date().succ_opt().unwrap();
        let (same, planner) = store.open(Some(id), next).await.unwrap();
        assert_eq!(same, id);
        let planner = planner.lock().await;
        assert_eq!(planner.date(), next);
        assert!(planner.plans().is_empty());
        assert_eq!(planner.pool().len(), 3);
    }

    #[tokio::test]
    async fn test_close_frees_the_session() {
        let store = store(backend());
        let (first, _) = store.open(None, date()).await.unwrap();
        let (second, _) = store.open(None, date()).await.unwrap();
        assert_eq!(store.len(), 2);

        store.close(first).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(first).unwrap_err(), PlanError::not_found(EntityKind::Session, first));
        assert!(store.get(second).is_ok());

        store.close(second).unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store = store(backend());
        let err = store.get(Uuid::from_u128(1)).unwrap_err();
        assert_eq!(err, PlanError::not_found(EntityKind::Session, Uuid::from_u128(1)));
        assert_eq!(store.close(Uuid::from_u128(1)), Err(err));
    }

    #[tokio::test]
    async fn test_open_fails_when_backend_down() {
        let mock = backend();
        mock.set_fail_reads(true);
        let store = store(mock);
        let err = store.open(None, date()).await.unwrap_err();
        assert!(matches!(err, PlanError::PersistenceFailure { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_all_creates_one_route_per_plan() {
        let mock = backend();
        let mut planner = Planner::new(load_day(&mock, date()).await.unwrap(), MatchConfig::default());
        plan_with(&mut planner, "A", &[1]);
        plan_with(&mut planner, "B", &[2, 3]);

        let report = save_all(&mut planner, &mock).await;
        assert!(report.is_complete());
        assert_eq!(report.saved.len(), 2);
        assert!(planner.plans().is_empty());
        assert_eq!(planner.persisted_routes().len(), 2);
        assert_eq!(mock.created().len(), 2);
        assert_eq!(mock.created()[1].stops.len(), 4);
    }

    #[tokio::test]
    async fn test_validation_failure_blocks_every_write() {
        let mock = backend();
        let mut planner = Planner::new(load_day(&mock, date()).await.unwrap(), MatchConfig::default());
        plan_with(&mut planner, "A", &[1]);
        planner.create_plan("Unconfigured");

        let report = save_all(&mut planner, &mock).await;
        assert!(report.blocked);
        assert_eq!(report.failures.len(), 2);
        assert!(mock.created().is_empty());
        assert_eq!(planner.plans().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_plan_stays_draft() {
        let mock = backend().fail_create_for("B");
        let mut planner = Planner::new(load_day(&mock, date()).await.unwrap(), MatchConfig::default());
        plan_with(&mut planner, "A", &[1]);
        let b = plan_with(&mut planner, "B", &[2]);

        let report = save_all(&mut planner, &mock).await;
        assert!(!report.is_complete());
        assert_eq!(report.saved.len(), 1);
        assert_eq!(report.failures[0].plan_id, b);
        assert!(matches!(report.failures[0].error, PlanError::PersistenceFailure { .. }));

        assert_eq!(planner.plans().len(), 1);
        assert_eq!(planner.plan(b).unwrap().points().len(), 2);
        assert_eq!(planner.holder_of(Uuid::from_u128(2)), Some(b));
        assert_eq!(planner.pool().len(), 1);
    }

    #[tokio::test]
    async fn test_persisted_reorder_rolls_back_on_failure() {
        let stops: Vec<PersistedStop> = [(1, StopKind::Pickup), (2, StopKind::Pickup), (1, StopKind::Dropoff), (2, StopKind::Dropoff)]
            .iter()
            .enumerate()
            .map(|(i, (schedule, kind))| PersistedStop {
                id: Uuid::from_u128(100 + i as u128),
                kind: *kind,
                child_id: Uuid::from_u128(*schedule + 100),
                child_name: format!("Child {}", schedule),
                schedule_id: Uuid::from_u128(*schedule),
                position: i as u32 + 1,
                time: NaiveTime::from_hms_opt(8, i as u32, 0).unwrap(),
            })
            .collect();
        let route = PersistedRoute {
            id: Uuid::from_u128(50),
            name: "Route 50".to_string(),
            date: date(),
            driver_id: None,
            vehicle: None,
            estimated_start: t(8, 0),
            estimated_end: t(9, 0),
            stop_count: 4,
            centroid: None,
            stops: stops.clone(),
        };
        let mock = backend().with_routes(vec![route]);
        let mut planner = Planner::new(load_day(&mock, date()).await.unwrap(), MatchConfig::default());
        let swapped: Vec<Uuid> = [101, 100, 102, 103].iter().map(|n| Uuid::from_u128(*n)).collect();

        mock.set_fail_reorders(true);
        let err = reorder_persisted_route(&mut planner, &mock, Uuid::from_u128(50), &swapped)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PersistenceFailure { .. }));
        assert_eq!(planner.persisted_routes()[0].stops, stops);

        mock.set_fail_reorders(false);
        reorder_persisted_route(&mut planner, &mock, Uuid::from_u128(50), &swapped)
            .await
            .unwrap();
        assert_eq!(planner.persisted_routes()[0].stops[0].id, Uuid::from_u128(101));
        assert_eq!(mock.reorders().len(), 1);
    }
}
