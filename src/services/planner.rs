//! Assignment engine
//!
//! Owns the draft plans and the unassigned pool of one planning session for one
//! date, and is the single source of truth for which schedule sits in which
//! plan. All operations are synchronous; the session store serializes them.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::mem;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EntityKind, PlanError};
use crate::services::auto_match::{self, MatchConfig, MatchSuggestion, PoolSuggestion};
use crate::services::capacity::Occupancy;
use crate::services::geo;
use crate::services::ordering;
use crate::services::route_plan::{PlanPhase, RoutePlan};
use crate::services::time_window::TimeWindow;
use crate::types::{
    CreateRouteRequest, CreatedRoute, DragPayload, Driver, PersistedRoute, PersistedStop,
    ReorderRouteRequest, StopKind, StopPoint, StopPositionUpdate, UnassignedSchedule, Vehicle,
};

/// Everything the backend knows about one date
#[derive(Debug, Clone, Default)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub pool: Vec<UnassignedSchedule>,
    pub routes: Vec<PersistedRoute>,
    pub vehicles: Vec<Vehicle>,
    pub drivers: Vec<Driver>,
}

/// Session-scoped state that would otherwise be ambient UI state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningContext {
    pub date: NaiveDate,
    /// Set on drag start, cleared unconditionally on drag end or drop
    pub dragged: Option<DragPayload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerStatistics {
    pub assigned_count: usize,
    pub plan_count: usize,
    pub pool_count: usize,
}

/// A validation or save failure attributed to one plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFailure {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub message: String,
    pub error: PlanError,
}

impl PlanFailure {
    pub fn new(plan: &RoutePlan, error: PlanError) -> Self {
        Self {
            plan_id: plan.id(),
            plan_name: plan.name().to_string(),
            message: error.to_string(),
            error,
        }
    }
}

/// User-facing events, drained by the caller after each operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notification {
    Assigned {
        schedule_id: Uuid,
        plan_id: Uuid,
        child_name: String,
    },
    Unassigned {
        schedule_id: Uuid,
        plan_id: Uuid,
        child_name: String,
    },
    Moved {
        schedule_id: Uuid,
        from_plan_id: Uuid,
        to_plan_id: Uuid,
        child_name: String,
    },
    Rejected {
        operation: String,
        message: String,
        error: PlanError,
    },
    PlanSaved {
        plan_id: Uuid,
        plan_name: String,
        route_id: Uuid,
    },
    SaveFailed {
        plan_id: Uuid,
        plan_name: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub id: Uuid,
    pub name: String,
    pub phase: PlanPhase,
    pub vehicle: Option<Vehicle>,
    pub driver: Option<Driver>,
    pub points: Vec<StopPoint>,
    /// `None` when the sequence is corrupt
    pub occupancy: Option<Occupancy>,
    pub estimated_window: Option<TimeWindow>,
}

impl PlanView {
    pub fn of(plan: &RoutePlan) -> Self {
        Self {
            id: plan.id(),
            name: plan.name().to_string(),
            phase: plan.phase(),
            vehicle: plan.vehicle().cloned(),
            driver: plan.driver().cloned(),
            points: plan.points().to_vec(),
            occupancy: plan.occupancy().ok(),
            estimated_window: plan.estimated_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub date: NaiveDate,
    pub pool: Vec<UnassignedSchedule>,
    pub plans: Vec<PlanView>,
    pub routes: Vec<PersistedRoute>,
    pub statistics: PlannerStatistics,
    pub dragged: Option<DragPayload>,
}

/// Last known good stop order of a persisted route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRollback {
    pub route_id: Uuid,
    stops: Vec<PersistedStop>,
}

/// A schedule taken out of the pool and the plan holding it
#[derive(Debug, Clone)]
struct Held {
    plan_id: Uuid,
    schedule: UnassignedSchedule,
}

#[derive(Debug, Clone)]
pub struct Planner {
    context: PlanningContext,
    pool: Vec<UnassignedSchedule>,
    plans: Vec<RoutePlan>,
    held: HashMap<Uuid, Held>,
    routes: Vec<PersistedRoute>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
    match_config: MatchConfig,
    notifications: Vec<Notification>,
}

impl Planner {
    pub fn new(snapshot: DaySnapshot, match_config: MatchConfig) -> Self {
        let mut planner = Self {
            context: PlanningContext {
                date: snapshot.date,
                dragged: None,
            },
            pool: Vec::new(),
            plans: Vec::new(),
            held: HashMap::new(),
            routes: Vec::new(),
            vehicles: Vec::new(),
            drivers: Vec::new(),
            match_config,
            notifications: Vec::new(),
        };
        planner.reset(snapshot);
        planner
    }

    /// Switch to a fresh snapshot. Drafts are dropped, never carried to another date.
    pub fn reset(&mut self, snapshot: DaySnapshot) {
        if !self.plans.is_empty() {
            info!(
                "Dropping {} draft plans of {} for {}",
                self.plans.len(),
                self.context.date,
                snapshot.date
            );
        }
        self.context = PlanningContext {
            date: snapshot.date,
            dragged: None,
        };
        self.pool = snapshot.pool;
        sort_pool(&mut self.pool);
        self.plans.clear();
        self.held.clear();
        self.routes = snapshot.routes;
        self.vehicles = snapshot.vehicles;
        self.drivers = snapshot.drivers;
        self.notifications.clear();
    }

    pub fn date(&self) -> NaiveDate {
        self.context.date
    }

    pub fn context(&self) -> &PlanningContext {
        &self.context
    }

    pub fn pool(&self) -> &[UnassignedSchedule] {
        &self.pool
    }

    pub fn plans(&self) -> &[RoutePlan] {
        &self.plans
    }

    pub fn plan(&self, plan_id: Uuid) -> Result<&RoutePlan, PlanError> {
        self.plans
            .iter()
            .find(|p| p.id() == plan_id)
            .ok_or(PlanError::not_found(EntityKind::Plan, plan_id))
    }

    pub fn persisted_routes(&self) -> &[PersistedRoute] {
        &self.routes
    }

    /// Plan currently holding the schedule
    pub fn holder_of(&self, schedule_id: Uuid) -> Option<Uuid> {
        self.held.get(&schedule_id).map(|h| h.plan_id)
    }

    fn plan_index(&self, plan_id: Uuid) -> Result<usize, PlanError> {
        self.plans
            .iter()
            .position(|p| p.id() == plan_id)
            .ok_or(PlanError::not_found(EntityKind::Plan, plan_id))
    }

    fn with_plan<T>(
        &mut self,
        plan_id: Uuid,
        f: impl FnOnce(&mut RoutePlan) -> Result<T, PlanError>,
    ) -> Result<T, PlanError> {
        let index = self.plan_index(plan_id)?;
        f(&mut self.plans[index])
    }

    /// Queue a rejection for the user; unexpected errors are only logged
    fn reject(&mut self, operation: &str, error: PlanError) -> PlanError {
        if error.is_business_rule() {
            debug!("{} rejected: {}", operation, error);
            self.notifications.push(Notification::Rejected {
                operation: operation.to_string(),
                message: error.to_string(),
                error: error.clone(),
            });
        } else {
            warn!("{} failed: {}", operation, error);
        }
        error
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        mem::take(&mut self.notifications)
    }

    // ----- plans ---------------------------------------------------------

    pub fn create_plan(&mut self, name: impl Into<String>) -> Uuid {
        let plan = RoutePlan::new(name);
        let id = plan.id();
        debug!("Created draft plan {} '{}'", id, plan.name());
        self.plans.push(plan);
        id
    }

    /// Drop a draft and return its schedules to the pool
    pub fn discard_plan(&mut self, plan_id: Uuid) -> Result<Vec<Uuid>, PlanError> {
        let index = self.plan_index(plan_id)?;
        let mut plan = self.plans.remove(index);
        plan.mark_discarded();

        let released = plan.schedule_ids();
        for schedule_id in &released {
            self.release_to_pool(*schedule_id);
        }
        info!("Discarded plan '{}', {} schedules back in pool", plan.name(), released.len());
        Ok(released)
    }

    pub fn set_vehicle(&mut self, plan_id: Uuid, vehicle_id: Option<Uuid>) -> Result<(), PlanError> {
        let vehicle = vehicle_id
            .map(|id| {
                self.vehicles
                    .iter()
                    .find(|v| v.id == id)
                    .cloned()
                    .ok_or(PlanError::not_found(EntityKind::Vehicle, id))
            })
            .transpose()?;
        self.with_plan(plan_id, |plan| plan.set_vehicle(vehicle))
    }

    pub fn set_driver(&mut self, plan_id: Uuid, driver_id: Option<Uuid>) -> Result<(), PlanError> {
        let driver = driver_id
            .map(|id| {
                self.drivers
                    .iter()
                    .find(|d| d.id == id)
                    .cloned()
                    .ok_or(PlanError::not_found(EntityKind::Driver, id))
            })
            .transpose()?;
        self.with_plan(plan_id, |plan| plan.set_driver(driver))
    }

    // ----- assignment ----------------------------------------------------

    /// Move a pool schedule into a plan. On failure the schedule stays in the pool.
    pub fn assign(&mut self, schedule_id: Uuid, plan_id: Uuid) -> Result<Occupancy, PlanError> {
        self.try_assign(schedule_id, plan_id)
            .map_err(|e| self.reject("assign", e))
    }

    fn try_assign(&mut self, schedule_id: Uuid, plan_id: Uuid) -> Result<Occupancy, PlanError> {
        if let Some(held) = self.held.get(&schedule_id) {
            return Err(PlanError::DuplicateAssignment {
                schedule_id,
                plan_id: held.plan_id,
            });
        }
        let pool_index = self
            .pool
            .iter()
            .position(|s| s.schedule_id == schedule_id)
            .ok_or(PlanError::not_found(EntityKind::Schedule, schedule_id))?;
        let index = self.plan_index(plan_id)?;

        let occupancy = self.plans[index].add_schedule(&self.pool[pool_index])?;

        let schedule = self.pool.remove(pool_index);
        self.notifications.push(Notification::Assigned {
            schedule_id,
            plan_id,
            child_name: schedule.child_name.clone(),
        });
        self.held.insert(schedule_id, Held { plan_id, schedule });
        Ok(occupancy)
    }

    /// Take a schedule out of whichever plan holds it and return it to the pool
    pub fn unassign(&mut self, schedule_id: Uuid) -> Result<Uuid, PlanError> {
        self.try_unassign(schedule_id)
            .map_err(|e| self.reject("unassign", e))
    }

    fn try_unassign(&mut self, schedule_id: Uuid) -> Result<Uuid, PlanError> {
        let plan_id = self
            .holder_of(schedule_id)
            .ok_or(PlanError::not_found(EntityKind::Schedule, schedule_id))?;
        self.with_plan(plan_id, |plan| plan.remove_schedule(schedule_id))?;

        if let Some(child_name) = self.release_to_pool(schedule_id) {
            self.notifications.push(Notification::Unassigned {
                schedule_id,
                plan_id,
                child_name,
            });
        }
        Ok(plan_id)
    }

    /// Move a schedule between plans, all or nothing.
    ///
    /// The pair keeps its points (ids, times, addresses). The destination is
    /// checked against its hypothetical sequence; if it refuses, the source
    /// plan is restored exactly.
    pub fn move_schedule(&mut self, schedule_id: Uuid, to_plan_id: Uuid) -> Result<Occupancy, PlanError> {
        self.try_move(schedule_id, to_plan_id)
            .map_err(|e| self.reject("move", e))
    }

    fn try_move(&mut self, schedule_id: Uuid, to_plan_id: Uuid) -> Result<Occupancy, PlanError> {
        let from_plan_id = self
            .holder_of(schedule_id)
            .ok_or(PlanError::not_found(EntityKind::Schedule, schedule_id))?;
        if from_plan_id == to_plan_id {
            return Err(PlanError::DuplicateAssignment {
                schedule_id,
                plan_id: to_plan_id,
            });
        }
        let from = self.plan_index(from_plan_id)?;
        let to = self.plan_index(to_plan_id)?;

        let backup = self.plans[from].clone();
        let (pickup, dropoff) = self.plans[from].remove_schedule(schedule_id)?;
        let child_name = pickup.child_name.clone();

        match self.plans[to].insert_pair(pickup, dropoff) {
            Ok(occupancy) => {
                if let Some(held) = self.held.get_mut(&schedule_id) {
                    held.plan_id = to_plan_id;
                }
                self.notifications.push(Notification::Moved {
                    schedule_id,
                    from_plan_id,
                    to_plan_id,
                    child_name,
                });
                Ok(occupancy)
            }
            Err(e) => {
                self.plans[from] = backup;
                Err(e)
            }
        }
    }

    /// Put a held schedule back into the pool; returns the child's name
    fn release_to_pool(&mut self, schedule_id: Uuid) -> Option<String> {
        let held = self.held.remove(&schedule_id)?;
        let child_name = held.schedule.child_name.clone();
        self.pool.push(held.schedule);
        sort_pool(&mut self.pool);
        Some(child_name)
    }

    // ----- ordering inside a plan ---------------------------------------

    pub fn reorder(&mut self, plan_id: Uuid, new_order: &[Uuid]) -> Result<(), PlanError> {
        self.with_plan(plan_id, |plan| plan.reorder(new_order))
            .map_err(|e| self.reject("reorder", e))
    }

    pub fn move_point(&mut self, plan_id: Uuid, from_index: usize, to_index: usize) -> Result<(), PlanError> {
        self.with_plan(plan_id, |plan| plan.move_point(from_index, to_index))
            .map_err(|e| self.reject("move point", e))
    }

    pub fn move_up(&mut self, plan_id: Uuid, point_id: Uuid) -> Result<(), PlanError> {
        self.with_plan(plan_id, |plan| plan.move_up(point_id))
            .map_err(|e| self.reject("move up", e))
    }

    pub fn move_down(&mut self, plan_id: Uuid, point_id: Uuid) -> Result<(), PlanError> {
        self.with_plan(plan_id, |plan| plan.move_down(point_id))
            .map_err(|e| self.reject("move down", e))
    }

    // ----- drag and drop -------------------------------------------------

    /// Start a drag. The schedule must be where the payload says it is.
    pub fn begin_drag(&mut self, payload: DragPayload) -> Result<(), PlanError> {
        let schedule_id = payload.schedule_id();
        let in_place = match payload {
            DragPayload::Pool { .. } => self.pool.iter().any(|s| s.schedule_id == schedule_id),
            DragPayload::Plan { plan_id, .. } => self.holder_of(schedule_id) == Some(plan_id),
        };
        if !in_place {
            let error = PlanError::not_found(EntityKind::Schedule, schedule_id);
            return Err(self.reject("drag", error));
        }
        self.context.dragged = Some(payload);
        Ok(())
    }

    pub fn end_drag(&mut self) -> Option<DragPayload> {
        self.context.dragged.take()
    }

    /// Drop the dragged item on a plan. The drag is cleared whatever the outcome.
    ///
    /// `Ok(None)` when nothing was dragged or the item was dropped on its own plan.
    pub fn drop_on(&mut self, plan_id: Uuid) -> Result<Option<Occupancy>, PlanError> {
        let Some(payload) = self.end_drag() else {
            return Ok(None);
        };
        match payload {
            DragPayload::Pool { schedule_id } => self.assign(schedule_id, plan_id).map(Some),
            DragPayload::Plan { plan_id: from, .. } if from == plan_id => Ok(None),
            DragPayload::Plan { schedule_id, .. } => self.move_schedule(schedule_id, plan_id).map(Some),
        }
    }

    // ----- statistics and validation ------------------------------------

    /// Derived from the plans on every call
    pub fn recompute_statistics(&self) -> PlannerStatistics {
        let assigned: HashSet<Uuid> = self.plans.iter().flat_map(|p| p.schedule_ids()).collect();
        PlannerStatistics {
            assigned_count: assigned.len(),
            plan_count: self.plans.len(),
            pool_count: self.pool.len(),
        }
    }

    /// Re-check every plan and collect every failure
    pub fn validate_all(&self) -> Vec<PlanFailure> {
        let mut failures = Vec::new();
        let mut first_holder: HashMap<Uuid, Uuid> = HashMap::new();

        for plan in &self.plans {
            failures.extend(plan.validate().into_iter().map(|e| PlanFailure::new(plan, e)));

            for schedule_id in plan.schedule_ids() {
                match first_holder.entry(schedule_id) {
                    Entry::Occupied(holder) => failures.push(PlanFailure::new(
                        plan,
                        PlanError::DuplicateAssignment {
                            schedule_id,
                            plan_id: *holder.get(),
                        },
                    )),
                    Entry::Vacant(slot) => {
                        slot.insert(plan.id());
                    }
                }
            }
        }

        failures
    }

    // ----- save ----------------------------------------------------------

    /// Creation requests for every plan, or every reason the save cannot start
    pub fn prepare_save(&self) -> Result<Vec<(Uuid, CreateRouteRequest)>, Vec<PlanFailure>> {
        let mut failures = self.validate_all();
        if !failures.is_empty() {
            return Err(failures);
        }

        let mut requests = Vec::with_capacity(self.plans.len());
        for plan in &self.plans {
            match plan.to_create_request(self.context.date) {
                Ok(request) => requests.push((plan.id(), request)),
                Err(e) => failures.push(PlanFailure::new(plan, e)),
            }
        }

        if failures.is_empty() {
            Ok(requests)
        } else {
            Err(failures)
        }
    }

    /// The backend accepted the plan: it leaves the drafts and becomes a persisted route
    pub fn complete_save(&mut self, plan_id: Uuid, created: CreatedRoute) -> Result<(), PlanError> {
        let index = self.plan_index(plan_id)?;
        let mut plan = self.plans.remove(index);
        plan.mark_saved();

        for schedule_id in plan.schedule_ids() {
            self.held.remove(&schedule_id);
        }

        info!("Plan '{}' saved as route {}", plan.name(), created.id);
        self.notifications.push(Notification::PlanSaved {
            plan_id,
            plan_name: plan.name().to_string(),
            route_id: created.id,
        });
        self.routes.push(persisted_from_plan(&plan, self.context.date, created));
        Ok(())
    }

    /// The backend refused the plan; it stays an intact draft
    pub fn fail_save(&mut self, plan_id: Uuid, error: &PlanError) {
        let plan_name = self
            .plan(plan_id)
            .map(|p| p.name().to_string())
            .unwrap_or_default();
        warn!("Saving plan '{}' failed: {}", plan_name, error);
        self.notifications.push(Notification::SaveFailed {
            plan_id,
            plan_name,
            message: error.to_string(),
        });
    }

    // ----- persisted routes ----------------------------------------------

    /// Apply a new stop order to a persisted route optimistically.
    ///
    /// Returns the backend request and the token needed to undo the change.
    pub fn begin_route_reorder(
        &mut self,
        route_id: Uuid,
        stop_ids: &[Uuid],
    ) -> Result<(ReorderRouteRequest, RouteRollback), PlanError> {
        self.try_route_reorder(route_id, stop_ids)
            .map_err(|e| self.reject("route reorder", e))
    }

    fn try_route_reorder(
        &mut self,
        route_id: Uuid,
        stop_ids: &[Uuid],
    ) -> Result<(ReorderRouteRequest, RouteRollback), PlanError> {
        let route = self
            .routes
            .iter_mut()
            .find(|r| r.id == route_id)
            .ok_or(PlanError::not_found(EntityKind::Route, route_id))?;
        if stop_ids.len() != route.stops.len() {
            return Err(PlanError::MalformedRoute {
                reason: format!(
                    "reorder lists {} stops, route '{}' has {}",
                    stop_ids.len(),
                    route.name,
                    route.stops.len()
                ),
            });
        }

        let mut by_id: HashMap<Uuid, &PersistedStop> = route.stops.iter().map(|s| (s.id, s)).collect();
        let mut proposed = Vec::with_capacity(stop_ids.len());
        for id in stop_ids {
            match by_id.remove(id) {
                Some(stop) => proposed.push(stop.clone()),
                None if route.stops.iter().any(|s| s.id == *id) => {
                    return Err(PlanError::MalformedRoute {
                        reason: format!("stop {} listed twice", id),
                    })
                }
                None => return Err(PlanError::not_found(EntityKind::Point, *id)),
            }
        }

        ordering::check_order(&proposed)?;

        for (i, stop) in proposed.iter_mut().enumerate() {
            stop.position = i as u32 + 1;
        }
        let request = ReorderRouteRequest {
            route_id,
            stops: proposed
                .iter()
                .map(|s| StopPositionUpdate {
                    stop_id: s.id,
                    position: s.position,
                })
                .collect(),
        };
        let previous = mem::replace(&mut route.stops, proposed);
        debug!("Route {} reordered locally", route_id);

        Ok((request, RouteRollback { route_id, stops: previous }))
    }

    /// Restore the last known good order after the backend refused a reorder
    pub fn rollback_route_reorder(&mut self, rollback: RouteRollback) {
        match self.routes.iter_mut().find(|r| r.id == rollback.route_id) {
            Some(route) => {
                warn!("Rolling back reorder of route {}", route.id);
                route.stops = rollback.stops;
            }
            None => warn!("Route {} vanished before rollback", rollback.route_id),
        }
    }

    // ----- auto-match ----------------------------------------------------

    /// Ranked persisted routes for a pool schedule
    pub fn suggest(&self, schedule_id: Uuid) -> Result<Vec<MatchSuggestion>, PlanError> {
        let schedule = self
            .pool
            .iter()
            .find(|s| s.schedule_id == schedule_id)
            .ok_or(PlanError::not_found(EntityKind::Schedule, schedule_id))?;
        Ok(auto_match::rank_candidates(schedule, &self.routes, &self.match_config))
    }

    pub fn suggest_pool(&self) -> Vec<PoolSuggestion> {
        auto_match::suggest_for_pool(&self.pool, &self.routes, &self.match_config)
    }

    // ----- views ---------------------------------------------------------

    pub fn session_view(&self, session_id: Uuid) -> SessionView {
        SessionView {
            session_id,
            date: self.context.date,
            pool: self.pool.clone(),
            plans: self.plans.iter().map(PlanView::of).collect(),
            routes: self.routes.clone(),
            statistics: self.recompute_statistics(),
            dragged: self.context.dragged,
        }
    }
}

/// Pool is kept in pickup-time order
fn sort_pool(pool: &mut [UnassignedSchedule]) {
    pool.sort_by_key(|s| s.pickup_time);
}

fn persisted_from_plan(plan: &RoutePlan, date: NaiveDate, created: CreatedRoute) -> PersistedRoute {
    let window = plan.estimated_window();
    let pickups: Vec<_> = plan
        .points()
        .iter()
        .filter(|p| p.kind == StopKind::Pickup)
        .filter_map(|p| p.address.coordinates)
        .collect();

    PersistedRoute {
        id: created.id,
        name: plan.name().to_string(),
        date,
        driver_id: plan.driver().map(|d| d.id),
        vehicle: plan.vehicle().cloned(),
        estimated_start: window.map(|w| w.start).unwrap_or_default(),
        estimated_end: window.map(|w| w.end).unwrap_or_default(),
        stop_count: plan.points().len() as u32,
        centroid: geo::centroid(&pickups),
        stops: created.stops,
    }
}
