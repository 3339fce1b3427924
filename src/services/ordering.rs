//! Ordering validator: a child's drop-off may never precede the pickup.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::PlanError;
use crate::types::{StopEvent, StopKind};

/// First drop-off in `ordered` whose pickup has not been seen yet
pub fn first_violation<T: StopEvent>(ordered: &[T]) -> Option<&T> {
    first_violation_by(ordered.len(), move |i| &ordered[i])
}

fn first_violation_by<'a, T, F>(len: usize, at: F) -> Option<&'a T>
where
    T: StopEvent + 'a,
    F: Fn(usize) -> &'a T,
{
    let mut picked_up: HashSet<Uuid> = HashSet::new();
    for i in 0..len {
        let stop = at(i);
        match stop.kind() {
            StopKind::Pickup => {
                picked_up.insert(stop.schedule_id());
            }
            StopKind::Dropoff => {
                if !picked_up.contains(&stop.schedule_id()) {
                    return Some(stop);
                }
            }
        }
    }
    None
}

/// Index permutation produced by moving `from_index` to `to_index`
pub fn moved_indices(len: usize, from_index: usize, to_index: usize) -> Option<Vec<usize>> {
    if from_index >= len || to_index >= len {
        return None;
    }
    let mut order: Vec<usize> = (0..len).collect();
    let moved = order.remove(from_index);
    order.insert(to_index, moved);
    Some(order)
}

/// Would moving the point at `from_index` to `to_index` put a drop-off before its pickup?
///
/// The whole proposed order is checked, so this works for single steps and
/// arbitrary drags alike. Out-of-range indices are rejected.
pub fn would_violate_order<T: StopEvent>(points: &[T], from_index: usize, to_index: usize) -> bool {
    match moved_indices(points.len(), from_index, to_index) {
        Some(order) => first_violation_by(order.len(), move |i| &points[order[i]]).is_some(),
        None => true,
    }
}

/// Check a complete proposed order
pub fn check_order<T: StopEvent>(ordered: &[T]) -> Result<(), PlanError> {
    match first_violation(ordered) {
        Some(stop) => Err(PlanError::OrderingViolation {
            schedule_id: stop.schedule_id(),
            child_name: stop.child_name().to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::capacity::tests::point;

    fn two_children() -> Vec<crate::types::StopPoint> {
        // A: 1..4, B: 2..3
        vec![
            point(1, StopKind::Pickup, 1, false),
            point(2, StopKind::Pickup, 2, false),
            point(2, StopKind::Dropoff, 3, false),
            point(1, StopKind::Dropoff, 4, false),
        ]
    }

    #[test]
    fn test_valid_order_has_no_violation() {
        assert!(first_violation(&two_children()).is_none());
        assert!(check_order(&two_children()).is_ok());
    }

    #[test]
    fn test_moving_dropoff_above_pickup_violates() {
        let points = two_children();
        // B's drop-off (index 2) to the top
        assert!(would_violate_order(&points, 2, 0));
        // B's pickup (index 1) below its drop-off
        assert!(would_violate_order(&points, 1, 3));
    }

    #[test]
    fn test_moves_that_keep_pairs_ordered() {
        let points = two_children();
        // A's drop-off up one step, still after A's pickup
        assert!(!would_violate_order(&points, 3, 2));
        // B's pickup to the top
        assert!(!would_violate_order(&points, 1, 0));
        // no-op move
        assert!(!would_violate_order(&points, 2, 2));
    }

    #[test]
    fn test_non_adjacent_drag_checks_whole_order() {
        let points = vec![
            point(1, StopKind::Pickup, 1, false),
            point(2, StopKind::Pickup, 2, false),
            point(1, StopKind::Dropoff, 3, false),
            point(2, StopKind::Dropoff, 4, false),
        ];
        // A's pickup dragged to the very end passes B's stops and A's drop-off
        assert!(would_violate_order(&points, 0, 3));
        // B's drop-off dragged to just after A's pickup, ahead of B's pickup
        assert!(would_violate_order(&points, 3, 1));
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let points = two_children();
        assert!(would_violate_order(&points, 4, 0));
        assert!(would_violate_order(&points, 0, 9));
    }

    #[test]
    fn test_check_order_names_the_child() {
        let points = vec![
            point(7, StopKind::Dropoff, 1, false),
            point(7, StopKind::Pickup, 2, false),
        ];
        let err = check_order(&points).unwrap_err();
        assert_eq!(
            err,
            PlanError::OrderingViolation {
                schedule_id: Uuid::from_u128(7),
                child_name: "Child 7".to_string(),
            }
        );
    }
}
