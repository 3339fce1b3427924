//! Capacity calculator
//!
//! Seat demand along a route is the peak of concurrent demand, not the sum of
//! all children: children board and alight at different stops. Every path that
//! needs occupancy (adding, moving, validating) goes through this module.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{CapacityResource, PlanError};
use crate::types::{StopKind, StopPoint, TransportNeeds, Vehicle};

/// Peak demand over a whole route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    /// Peak weighted seat demand (a wheelchair counts as two seats)
    pub max_seats: u32,
    /// Peak number of children on board needing a wheelchair slot
    pub max_wheelchair_seats: u32,
}

/// Walk the points in position order and track the peak concurrent demand.
///
/// A drop-off for a schedule that is not on board, or a second pickup for one
/// that already is, means the sequence is corrupt and yields `MalformedRoute`.
pub fn compute_occupancy(points: &[StopPoint]) -> Result<Occupancy, PlanError> {
    let mut ordered: Vec<&StopPoint> = points.iter().collect();
    ordered.sort_by_key(|p| p.position);

    let mut boarded: HashMap<Uuid, TransportNeeds> = HashMap::new();
    let mut seats = 0u32;
    let mut wheelchairs = 0u32;
    let mut peak = Occupancy::default();

    for point in ordered {
        match point.kind {
            StopKind::Pickup => {
                if boarded.insert(point.schedule_id, point.needs).is_some() {
                    return Err(PlanError::MalformedRoute {
                        reason: format!(
                            "second pickup for schedule {} at position {}",
                            point.schedule_id, point.position
                        ),
                    });
                }
                seats += point.needs.seat_weight();
                if point.needs.wheelchair {
                    wheelchairs += 1;
                }
            }
            StopKind::Dropoff => {
                let Some(needs) = boarded.remove(&point.schedule_id) else {
                    return Err(PlanError::MalformedRoute {
                        reason: format!(
                            "drop-off for schedule {} at position {} without a preceding pickup",
                            point.schedule_id, point.position
                        ),
                    });
                };
                seats -= needs.seat_weight();
                if needs.wheelchair {
                    wheelchairs -= 1;
                }
            }
        }

        peak.max_seats = peak.max_seats.max(seats);
        peak.max_wheelchair_seats = peak.max_wheelchair_seats.max(wheelchairs);
    }

    Ok(peak)
}

/// Reject an occupancy the vehicle cannot carry. Seats are checked first.
pub fn check_against_vehicle(occupancy: Occupancy, vehicle: &Vehicle) -> Result<(), PlanError> {
    if occupancy.max_seats > vehicle.seats {
        return Err(PlanError::CapacityExceeded {
            resource: CapacityResource::Seats,
            required: occupancy.max_seats,
            available: vehicle.seats,
        });
    }
    if occupancy.max_wheelchair_seats > vehicle.wheelchair_slots {
        return Err(PlanError::CapacityExceeded {
            resource: CapacityResource::WheelchairSlots,
            required: occupancy.max_wheelchair_seats,
            available: vehicle.wheelchair_slots,
        });
    }
    Ok(())
}

/// Compute occupancy of a (possibly hypothetical) sequence and check it against the vehicle
pub fn ensure_fits(points: &[StopPoint], vehicle: &Vehicle) -> Result<Occupancy, PlanError> {
    let occupancy = compute_occupancy(points)?;
    check_against_vehicle(occupancy, vehicle)?;
    Ok(occupancy)
}
