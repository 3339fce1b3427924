//! Route plan: the mutable draft of one vehicle run.
//!
//! Every mutation either completes with the pickup-before-drop-off invariant
//! intact and positions renumbered `1..=n`, or returns a `PlanError` and leaves
//! the plan exactly as it was.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{EntityKind, PlanError, Prerequisite};
use crate::services::capacity::{self, Occupancy};
use crate::services::ordering::{self, moved_indices, would_violate_order};
use crate::services::time_window::TimeWindow;
use crate::types::{
    CreateRouteRequest, Driver, StopDescriptor, StopKind, StopPoint, UnassignedSchedule, Vehicle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPhase {
    /// Vehicle or driver missing, no points
    Empty,
    /// Vehicle and driver set, no points yet
    Configured,
    /// At least one schedule pair present
    Populated,
    Saved,
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    id: Uuid,
    name: String,
    vehicle: Option<Vehicle>,
    driver: Option<Driver>,
    points: Vec<StopPoint>,
    closed: Option<PlanPhase>,
}

impl RoutePlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            vehicle: None,
            driver: None,
            points: Vec::new(),
            closed: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vehicle(&self) -> Option<&Vehicle> {
        self.vehicle.as_ref()
    }

    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    /// Points in position order
    pub fn points(&self) -> &[StopPoint] {
        &self.points
    }

    pub fn phase(&self) -> PlanPhase {
        if let Some(terminal) = self.closed {
            return terminal;
        }
        if !self.points.is_empty() {
            PlanPhase::Populated
        } else if self.vehicle.is_some() && self.driver.is_some() {
            PlanPhase::Configured
        } else {
            PlanPhase::Empty
        }
    }

    fn ensure_open(&self) -> Result<(), PlanError> {
        match self.closed {
            Some(_) => Err(PlanError::PlanClosed { plan_id: self.id }),
            None => Ok(()),
        }
    }

    pub fn contains_schedule(&self, schedule_id: Uuid) -> bool {
        self.points.iter().any(|p| p.schedule_id == schedule_id)
    }

    /// Distinct schedules in pickup order
    pub fn schedule_ids(&self) -> Vec<Uuid> {
        self.points
            .iter()
            .filter(|p| p.kind == StopKind::Pickup)
            .map(|p| p.schedule_id)
            .collect()
    }

    /// Metadata only. Existing points are not re-checked against the new
    /// vehicle; `validate` flags a plan that no longer fits.
    pub fn set_vehicle(&mut self, vehicle: Option<Vehicle>) -> Result<(), PlanError> {
        self.ensure_open()?;
        debug!(
            "Plan {} vehicle -> {:?}",
            self.id,
            vehicle.as_ref().map(|v| v.id)
        );
        self.vehicle = vehicle;
        Ok(())
    }

    pub fn set_driver(&mut self, driver: Option<Driver>) -> Result<(), PlanError> {
        self.ensure_open()?;
        debug!(
            "Plan {} driver -> {:?}",
            self.id,
            driver.as_ref().map(|d| d.id)
        );
        self.driver = driver;
        Ok(())
    }

    /// Place a pickup and drop-off for the schedule at their time slots.
    ///
    /// For a plan built in time order this appends them at the next two positions.
    pub fn add_schedule(&mut self, schedule: &UnassignedSchedule) -> Result<Occupancy, PlanError> {
        let (pickup, dropoff) = stop_pair(schedule, 0);
        self.insert_pair(pickup, dropoff)
    }

    /// Indices (in the grown sequence) where a pair with these times goes:
    /// each point lands before the first existing point scheduled later.
    fn slot_pair(&self, pickup: &StopPoint, dropoff: &StopPoint) -> (usize, usize) {
        let len = self.points.len();
        let pickup_idx = self
            .points
            .iter()
            .position(|p| p.time > pickup.time)
            .unwrap_or(len);
        let after_pickup = self.points[pickup_idx..]
            .iter()
            .position(|p| p.time > dropoff.time)
            .unwrap_or(len - pickup_idx);
        (pickup_idx, pickup_idx + 1 + after_pickup)
    }

    /// Sequence the plan would have with the pair added, checked against the
    /// vehicle. Nothing is mutated.
    pub(crate) fn preview_pair(
        &self,
        pickup: &StopPoint,
        dropoff: &StopPoint,
    ) -> Result<(Vec<StopPoint>, Occupancy), PlanError> {
        self.ensure_open()?;
        let vehicle = self.vehicle.as_ref().ok_or(PlanError::MissingPrerequisite {
            what: Prerequisite::Vehicle,
        })?;
        if self.contains_schedule(pickup.schedule_id) {
            return Err(PlanError::DuplicateAssignment {
                schedule_id: pickup.schedule_id,
                plan_id: self.id,
            });
        }

        let (pickup_idx, dropoff_idx) = self.slot_pair(pickup, dropoff);
        let mut hypothetical = self.points.clone();
        hypothetical.insert(pickup_idx, pickup.clone());
        hypothetical.insert(dropoff_idx, dropoff.clone());
        renumber(&mut hypothetical);

        let occupancy = capacity::ensure_fits(&hypothetical, vehicle)?;
        Ok((hypothetical, occupancy))
    }

    /// Insert an existing pair at its time slots (ids, addresses and times preserved)
    pub(crate) fn insert_pair(
        &mut self,
        pickup: StopPoint,
        dropoff: StopPoint,
    ) -> Result<Occupancy, PlanError> {
        match self.preview_pair(&pickup, &dropoff) {
            Ok((points, occupancy)) => {
                debug!(
                    "Plan {} accepted schedule {} (peak {} seats)",
                    self.id, pickup.schedule_id, occupancy.max_seats
                );
                self.points = points;
                Ok(occupancy)
            }
            Err(e) => {
                debug!("Plan {} rejected schedule {}: {}", self.id, pickup.schedule_id, e);
                Err(e)
            }
        }
    }

    /// Remove both points of a schedule and renumber the rest
    pub fn remove_schedule(&mut self, schedule_id: Uuid) -> Result<(StopPoint, StopPoint), PlanError> {
        self.ensure_open()?;
        let pickup_idx = self
            .points
            .iter()
            .position(|p| p.schedule_id == schedule_id && p.kind == StopKind::Pickup);
        let dropoff_idx = self
            .points
            .iter()
            .position(|p| p.schedule_id == schedule_id && p.kind == StopKind::Dropoff);

        let (Some(pickup_idx), Some(dropoff_idx)) = (pickup_idx, dropoff_idx) else {
            return Err(PlanError::not_found(EntityKind::Schedule, schedule_id));
        };

        // Remove the later index first so the earlier one stays valid
        let (first, second) = if pickup_idx < dropoff_idx {
            (pickup_idx, dropoff_idx)
        } else {
            (dropoff_idx, pickup_idx)
        };
        let later = self.points.remove(second);
        let earlier = self.points.remove(first);
        self.renumber();

        debug!("Plan {} released schedule {}", self.id, schedule_id);
        if earlier.kind == StopKind::Pickup {
            Ok((earlier, later))
        } else {
            Ok((later, earlier))
        }
    }

    /// Replace the order of points. `new_order` must list every point id exactly once.
    pub fn reorder(&mut self, new_order: &[Uuid]) -> Result<(), PlanError> {
        self.ensure_open()?;
        if new_order.len() != self.points.len() {
            return Err(PlanError::MalformedRoute {
                reason: format!(
                    "reorder lists {} points, plan has {}",
                    new_order.len(),
                    self.points.len()
                ),
            });
        }

        let mut by_id: HashMap<Uuid, &StopPoint> = self.points.iter().map(|p| (p.id, p)).collect();
        let mut proposed: Vec<StopPoint> = Vec::with_capacity(new_order.len());
        for id in new_order {
            match by_id.remove(id) {
                Some(point) => proposed.push(point.clone()),
                None if self.points.iter().any(|p| p.id == *id) => {
                    return Err(PlanError::MalformedRoute {
                        reason: format!("point {} listed twice", id),
                    })
                }
                None => return Err(PlanError::not_found(EntityKind::Point, *id)),
            }
        }

        ordering::check_order(&proposed)?;

        self.points = proposed;
        self.renumber();
        debug!("Plan {} reordered", self.id);
        Ok(())
    }

    /// Move one point from `from_index` to `to_index` (0-based)
    pub fn move_point(&mut self, from_index: usize, to_index: usize) -> Result<(), PlanError> {
        self.ensure_open()?;
        let Some(order) = moved_indices(self.points.len(), from_index, to_index) else {
            return Err(PlanError::MalformedRoute {
                reason: format!(
                    "cannot move index {} to {} in a plan of {} points",
                    from_index,
                    to_index,
                    self.points.len()
                ),
            });
        };

        let proposed: Vec<StopPoint> = order.iter().map(|&i| self.points[i].clone()).collect();
        if would_violate_order(&self.points, from_index, to_index) {
            return Err(match ordering::check_order(&proposed) {
                Err(e) => e,
                Ok(()) => PlanError::MalformedRoute {
                    reason: "ordering check disagreed with simulated order".to_string(),
                },
            });
        }

        self.points = proposed;
        self.renumber();
        Ok(())
    }

    /// Move a point one step towards the start. A no-op at the top.
    pub fn move_up(&mut self, point_id: Uuid) -> Result<(), PlanError> {
        let index = self.index_of(point_id)?;
        if index == 0 {
            return Ok(());
        }
        self.move_point(index, index - 1)
    }

    /// Move a point one step towards the end. A no-op at the bottom.
    pub fn move_down(&mut self, point_id: Uuid) -> Result<(), PlanError> {
        let index = self.index_of(point_id)?;
        if index + 1 >= self.points.len() {
            return Ok(());
        }
        self.move_point(index, index + 1)
    }

    fn index_of(&self, point_id: Uuid) -> Result<usize, PlanError> {
        self.points
            .iter()
            .position(|p| p.id == point_id)
            .ok_or(PlanError::not_found(EntityKind::Point, point_id))
    }

    pub fn occupancy(&self) -> Result<Occupancy, PlanError> {
        capacity::compute_occupancy(&self.points)
    }

    /// Earliest and latest stop time
    pub fn estimated_window(&self) -> Option<TimeWindow> {
        TimeWindow::span_of(self.points.iter().map(|p| p.time))
    }

    /// Re-run every check. All failures are returned, not just the first.
    pub fn validate(&self) -> Vec<PlanError> {
        let mut failures = Vec::new();

        if self.vehicle.is_none() {
            failures.push(PlanError::MissingPrerequisite { what: Prerequisite::Vehicle });
        }
        if self.driver.is_none() {
            failures.push(PlanError::MissingPrerequisite { what: Prerequisite::Driver });
        }

        if let Some(reason) = self.pair_defect() {
            failures.push(PlanError::MalformedRoute { reason });
            return failures;
        }

        if let Err(e) = ordering::check_order(&self.points) {
            failures.push(e);
            return failures;
        }

        if let Some(vehicle) = &self.vehicle {
            if let Err(e) = capacity::ensure_fits(&self.points, vehicle) {
                failures.push(e);
            }
        }

        failures
    }

    /// Each schedule must contribute exactly one pickup and one drop-off
    fn pair_defect(&self) -> Option<String> {
        let mut counts: HashMap<Uuid, (u32, u32)> = HashMap::new();
        for point in &self.points {
            let entry = counts.entry(point.schedule_id).or_default();
            match point.kind {
                StopKind::Pickup => entry.0 += 1,
                StopKind::Dropoff => entry.1 += 1,
            }
        }
        counts
            .into_iter()
            .find(|(_, c)| *c != (1, 1))
            .map(|(schedule_id, (pickups, dropoffs))| {
                format!(
                    "schedule {} has {} pickups and {} drop-offs",
                    schedule_id, pickups, dropoffs
                )
            })
    }

    /// Backend creation payload for this plan
    pub fn to_create_request(&self, date: NaiveDate) -> Result<CreateRouteRequest, PlanError> {
        let vehicle = self.vehicle.as_ref().ok_or(PlanError::MissingPrerequisite {
            what: Prerequisite::Vehicle,
        })?;
        let driver = self.driver.as_ref().ok_or(PlanError::MissingPrerequisite {
            what: Prerequisite::Driver,
        })?;
        let window = self.estimated_window().ok_or_else(|| PlanError::MalformedRoute {
            reason: format!("plan '{}' has no stops to save", self.name),
        })?;

        Ok(CreateRouteRequest {
            name: self.name.clone(),
            date,
            driver_id: driver.id,
            vehicle_id: vehicle.id,
            estimated_start: window.start,
            estimated_end: window.end,
            stops: self
                .points
                .iter()
                .map(|p| StopDescriptor {
                    kind: p.kind,
                    child_id: p.child_id,
                    schedule_id: p.schedule_id,
                    position: p.position,
                    time: p.time,
                })
                .collect(),
        })
    }

    pub fn mark_saved(&mut self) {
        self.closed = Some(PlanPhase::Saved);
    }

    pub fn mark_discarded(&mut self) {
        self.closed = Some(PlanPhase::Discarded);
    }

    fn renumber(&mut self) {
        renumber(&mut self.points);
    }
}

fn renumber(points: &mut [StopPoint]) {
    for (i, point) in points.iter_mut().enumerate() {
        point.position = i as u32 + 1;
    }
}

/// Fresh pickup/drop-off points for a schedule starting at `position`
pub fn stop_pair(schedule: &UnassignedSchedule, position: u32) -> (StopPoint, StopPoint) {
    let pickup = StopPoint {
        id: Uuid::new_v4(),
        kind: StopKind::Pickup,
        child_id: schedule.child_id,
        child_name: schedule.child_name.clone(),
        schedule_id: schedule.schedule_id,
        position,
        address: schedule.pickup_address.clone(),
        time: schedule.pickup_time,
        needs: schedule.needs,
    };
    let dropoff = StopPoint {
        id: Uuid::new_v4(),
        kind: StopKind::Dropoff,
        position: position + 1,
        address: schedule.dropoff_address.clone(),
        time: schedule.dropoff_time,
        ..pickup.clone()
    };
    (pickup, dropoff)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveTime;

    use crate::error::CapacityResource;
    use crate::types::{Address, TransportNeeds};

    pub(crate) fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn address(street: &str, number: &str) -> Address {
        Address {
            street: street.to_string(),
            number: number.to_string(),
            unit: None,
            postal_code: "52062".to_string(),
            city: "Aachen".to_string(),
            coordinates: None,
        }
    }

    pub(crate) fn schedule(n: u128, pickup: NaiveTime, dropoff: NaiveTime, wheelchair: bool) -> UnassignedSchedule {
        UnassignedSchedule {
            schedule_id: Uuid::from_u128(n),
            child_id: Uuid::from_u128(n + 100),
            child_name: format!("Child {}", n),
            pickup_address: address("Hauptstraße", &n.to_string()),
            pickup_time: pickup,
            dropoff_address: address("Schulweg", "1"),
            dropoff_time: dropoff,
            needs: TransportNeeds {
                wheelchair,
                ..TransportNeeds::default()
            },
        }
    }

    pub(crate) fn vehicle(seats: u32, wheelchair_slots: u32) -> Vehicle {
        Vehicle {
            id: Uuid::from_u128(9000 + u128::from(seats)),
            name: format!("{}-seater", seats),
            license_plate: None,
            seats,
            wheelchair_slots,
        }
    }

    pub(crate) fn driver() -> Driver {
        Driver {
            id: Uuid::from_u128(7000),
            name: "Alex".to_string(),
            phone: None,
        }
    }

    fn positions(plan: &RoutePlan) -> Vec<u32> {
        plan.points().iter().map(|p| p.position).collect()
    }

    fn sequence(plan: &RoutePlan) -> Vec<(u128, StopKind)> {
        plan.points()
            .iter()
            .map(|p| (p.schedule_id.as_u128(), p.kind))
            .collect()
    }

    fn point_id(plan: &RoutePlan, schedule: u128, kind: StopKind) -> Uuid {
        plan.points()
            .iter()
            .find(|p| p.schedule_id.as_u128() == schedule && p.kind == kind)
            .map(|p| p.id)
            .unwrap()
    }

    /// Four children all on board 08:00-09:00 in a 4-seat vehicle
    pub(crate) fn full_plan() -> RoutePlan {
        let mut plan = RoutePlan::new("Full");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        for n in 1..=4 {
            plan.add_schedule(&schedule(n, t(8, 0), t(9, 0), false)).unwrap();
        }
        assert_eq!(plan.occupancy().unwrap().max_seats, 4, "fixture should be at 4 seats");
        plan
    }

    #[test]
    fn test_phases() {
        let mut plan = RoutePlan::new("Morning");
        assert_eq!(plan.phase(), PlanPhase::Empty);
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        assert_eq!(plan.phase(), PlanPhase::Empty);
        plan.set_driver(Some(driver())).unwrap();
        assert_eq!(plan.phase(), PlanPhase::Configured);
        plan.add_schedule(&schedule(1, t(8, 0), t(8, 30), false)).unwrap();
        assert_eq!(plan.phase(), PlanPhase::Populated);
        plan.mark_saved();
        assert_eq!(plan.phase(), PlanPhase::Saved);
        assert!(plan.set_driver(None).is_err());
    }

    #[test]
    fn test_add_requires_vehicle() {
        let mut plan = RoutePlan::new("No vehicle");
        let err = plan.add_schedule(&schedule(1, t(8, 0), t(8, 30), false)).unwrap_err();
        assert_eq!(err, PlanError::MissingPrerequisite { what: Prerequisite::Vehicle });
        assert!(plan.points().is_empty());
    }

    #[test]
    fn test_add_in_time_order_appends() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 10), t(8, 40), false)).unwrap();
        plan.add_schedule(&schedule(2, t(8, 45), t(9, 0), false)).unwrap();

        assert_eq!(positions(&plan), vec![1, 2, 3, 4]);
        assert_eq!(
            sequence(&plan),
            vec![
                (1, StopKind::Pickup),
                (1, StopKind::Dropoff),
                (2, StopKind::Pickup),
                (2, StopKind::Dropoff),
            ]
        );
        assert_eq!(plan.points()[1].time, t(8, 40));
        assert_eq!(plan.points()[1].address.street, "Schulweg");
    }

    #[test]
    fn test_add_overlapping_ride_lands_in_time_slot() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 10), t(8, 40), false)).unwrap();
        plan.add_schedule(&schedule(2, t(8, 15), t(8, 45), false)).unwrap();

        assert_eq!(
            sequence(&plan),
            vec![
                (1, StopKind::Pickup),
                (2, StopKind::Pickup),
                (1, StopKind::Dropoff),
                (2, StopKind::Dropoff),
            ]
        );
        assert_eq!(plan.occupancy().unwrap().max_seats, 2);
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 10), t(8, 40), false)).unwrap();
        let err = plan.add_schedule(&schedule(1, t(8, 10), t(8, 40), false)).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateAssignment { .. }));
        assert_eq!(plan.points().len(), 2);
    }

    #[test]
    fn test_capacity_gate_is_hypothetical() {
        let mut plan = full_plan();
        let before = plan.clone();

        let err = plan.add_schedule(&schedule(5, t(8, 10), t(8, 40), false)).unwrap_err();
        assert_eq!(
            err,
            PlanError::CapacityExceeded {
                resource: CapacityResource::Seats,
                required: 5,
                available: 4,
            }
        );
        assert_eq!(plan, before);
        assert_eq!(positions(&plan), (1..=8).collect::<Vec<u32>>());
    }

    #[test]
    fn test_ride_after_everyone_left_still_fits() {
        let mut plan = full_plan();
        plan.add_schedule(&schedule(5, t(9, 10), t(9, 40), false)).unwrap();
        assert_eq!(plan.points().len(), 10);
        assert_eq!(plan.occupancy().unwrap().max_seats, 4);
    }

    #[test]
    fn test_wheelchair_counts_double() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(2, 1))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 0), t(8, 30), true)).unwrap();
        assert_eq!(plan.occupancy().unwrap().max_seats, 2);

        let err = plan.add_schedule(&schedule(2, t(8, 10), t(8, 20), false)).unwrap_err();
        assert!(matches!(err, PlanError::CapacityExceeded { required: 3, available: 2, .. }));

        plan.add_schedule(&schedule(3, t(8, 40), t(9, 0), true)).unwrap();
        assert_eq!(plan.occupancy().unwrap().max_wheelchair_seats, 1);
    }

    #[test]
    fn test_remove_renumbers_and_keeps_order() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        for n in 1..=3 {
            plan.add_schedule(&schedule(n, t(8, 0), t(9, 0), false)).unwrap();
        }
        assert_eq!(positions(&plan), vec![1, 2, 3, 4, 5, 6]);

        let (pickup, dropoff) = plan.remove_schedule(Uuid::from_u128(2)).unwrap();
        assert_eq!(pickup.kind, StopKind::Pickup);
        assert_eq!(dropoff.kind, StopKind::Dropoff);

        assert_eq!(positions(&plan), vec![1, 2, 3, 4]);
        assert_eq!(
            sequence(&plan),
            vec![
                (1, StopKind::Pickup),
                (3, StopKind::Pickup),
                (1, StopKind::Dropoff),
                (3, StopKind::Dropoff),
            ]
        );
    }

    #[test]
    fn test_remove_unknown_schedule() {
        let mut plan = RoutePlan::new("A");
        let err = plan.remove_schedule(Uuid::from_u128(42)).unwrap_err();
        assert_eq!(err, PlanError::not_found(EntityKind::Schedule, Uuid::from_u128(42)));
    }

    #[test]
    fn test_reorder_sequence_keeps_invariant() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 0), t(8, 30), false)).unwrap();
        plan.add_schedule(&schedule(2, t(8, 35), t(8, 50), false)).unwrap();
        let p1 = point_id(&plan, 1, StopKind::Pickup);
        let d1 = point_id(&plan, 1, StopKind::Dropoff);
        let p2 = point_id(&plan, 2, StopKind::Pickup);
        let d2 = point_id(&plan, 2, StopKind::Dropoff);

        for order in [vec![p1, p2, d2, d1], vec![p2, p1, d2, d1], vec![p2, d2, p1, d1]] {
            plan.reorder(&order).unwrap();
            assert!(ordering::first_violation(plan.points()).is_none());
            assert_eq!(positions(&plan), vec![1, 2, 3, 4]);
            let ids: Vec<Uuid> = plan.points().iter().map(|p| p.id).collect();
            assert_eq!(ids, order);
        }

        let before = plan.clone();
        let err = plan.reorder(&[d1, p2, p1, d2]).unwrap_err();
        assert_eq!(
            err,
            PlanError::OrderingViolation {
                schedule_id: Uuid::from_u128(1),
                child_name: "Child 1".to_string(),
            }
        );
        assert_eq!(plan, before);
    }

    #[test]
    fn test_reorder_with_unknown_point() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 0), t(9, 0), false)).unwrap();
        let first = plan.points()[0].id;
        let err = plan.reorder(&[first, Uuid::from_u128(1)]).unwrap_err();
        assert!(matches!(err, PlanError::NotFound { kind: EntityKind::Point, .. }));
        assert!(!err.is_business_rule());
    }

    #[test]
    fn test_reorder_listing_a_point_twice() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 0), t(9, 0), false)).unwrap();
        let before = plan.clone();
        let first = plan.points()[0].id;

        let err = plan.reorder(&[first, first]).unwrap_err();
        assert_eq!(
            err,
            PlanError::MalformedRoute {
                reason: format!("point {} listed twice", first),
            }
        );
        assert_eq!(plan, before);
    }

    #[test]
    fn test_move_up_and_down() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 0), t(8, 30), false)).unwrap();
        plan.add_schedule(&schedule(2, t(8, 35), t(8, 50), false)).unwrap();
        // [P1, D1, P2, D2]
        let p2 = point_id(&plan, 2, StopKind::Pickup);
        let d1 = point_id(&plan, 1, StopKind::Dropoff);

        plan.move_up(p2).unwrap();
        assert_eq!(plan.points()[1].id, p2);
        assert_eq!(plan.points()[1].position, 2);

        plan.move_up(p2).unwrap();
        assert_eq!(plan.points()[0].id, p2);
        // already at the top
        plan.move_up(p2).unwrap();
        assert_eq!(plan.points()[0].id, p2);

        // [P2, P1, D1, D2]: D1 above P1 is rejected
        let before = plan.clone();
        let err = plan.move_up(d1).unwrap_err();
        assert!(matches!(err, PlanError::OrderingViolation { .. }));
        assert_eq!(plan, before);

        // P1 below D1 is rejected as well
        let p1 = point_id(&plan, 1, StopKind::Pickup);
        assert!(plan.move_down(p1).is_err());
        assert_eq!(plan, before);
    }

    #[test]
    fn test_move_point_out_of_range() {
        let mut plan = RoutePlan::new("A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.add_schedule(&schedule(1, t(8, 0), t(8, 30), false)).unwrap();
        let err = plan.move_point(0, 5).unwrap_err();
        assert!(matches!(err, PlanError::MalformedRoute { .. }));
    }

    #[test]
    fn test_vehicle_change_is_not_retroactive() {
        let mut plan = full_plan();
        plan.set_driver(Some(driver())).unwrap();
        assert!(plan.validate().is_empty());

        plan.set_vehicle(Some(vehicle(3, 0))).unwrap();
        assert_eq!(plan.points().len(), 8);
        assert_eq!(
            plan.validate(),
            vec![PlanError::CapacityExceeded {
                resource: CapacityResource::Seats,
                required: 4,
                available: 3,
            }]
        );

        plan.set_vehicle(None).unwrap();
        assert_eq!(plan.points().len(), 8);
        assert_eq!(
            plan.validate(),
            vec![PlanError::MissingPrerequisite { what: Prerequisite::Vehicle }]
        );
    }

    #[test]
    fn test_create_request_uses_stop_span() {
        let mut plan = RoutePlan::new("Morning A");
        plan.set_vehicle(Some(vehicle(4, 0))).unwrap();
        plan.set_driver(Some(driver())).unwrap();
        plan.add_schedule(&schedule(1, t(7, 50), t(8, 30), false)).unwrap();
        plan.add_schedule(&schedule(2, t(7, 40), t(8, 20), false)).unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let request = plan.to_create_request(date).unwrap();
        assert_eq!(request.estimated_start, t(7, 40));
        assert_eq!(request.estimated_end, t(8, 30));
        assert_eq!(request.driver_id, driver().id);
        assert_eq!(request.stops.len(), 4);
        assert_eq!(request.stops[0].schedule_id, Uuid::from_u128(2));
        assert_eq!(request.stops[3].position, 4);
    }

    #[test]
    fn test_closed_plan_rejects_mutation() {
        let mut plan = RoutePlan::new("A");
        plan.mark_discarded();
        let err = plan.set_vehicle(Some(vehicle(4, 0))).unwrap_err();
        assert_eq!(err, PlanError::PlanClosed { plan_id: plan.id() });
    }
}
