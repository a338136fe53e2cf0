use itertools::Either;

use crate::floor::Floor;
use crate::route::Route;
use crate::strategy::Strategy;

/// Visits any queued floor encountered along the way to the next
/// planned stop, not just the stops themselves: between the current
/// position and each key in insertion order, every intermediate floor
/// that is still queued gets picked up as a detour. Intermediate
/// floors that were never requested are skipped silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopEnRoute;

/// The inclusive, direction-aware sequence of floors between `from` and
/// `to`. Ascending if `to >= from`, descending otherwise. `Either`
/// unifies the two directions into one iterator type without boxing.
fn floor_range(from: Floor, to: Floor) -> impl Iterator<Item = Floor> {
    if to >= from {
        Either::Left(from..=to)
    } else {
        Either::Right((to..=from).rev())
    }
}

impl Strategy for StopEnRoute {
    fn ordered_stops(
        &self,
        route: &mut Route,
        current: Floor,
        target: Option<Floor>,
        stop_early: &mut dyn FnMut(Floor, &[Floor]) -> bool,
    ) -> Vec<Floor> {
        if let Some(t) = target {
            route.add_ride(t, None);
        }

        let outer_keys: Vec<Floor> = route.iter().collect();
        let mut stops = Vec::new();
        let mut position = current;

        for next_stop in outer_keys {
            for floor in floor_range(position, next_stop) {
                if !route.visit_now(floor) {
                    continue;
                }
                stops.push(floor);
                position = floor;

                if stop_early(floor, &stops) {
                    return stops;
                }
                if target == Some(floor) {
                    return stops;
                }
            }
        }

        stops
    }

    fn nr_floors_to_move(&self, route: &Route, current: Floor) -> i32 {
        match route.first() {
            Some(next) => (next - current).signum(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detours_to_an_en_route_floor_before_its_own_turn() {
        let mut route = Route::new();
        route.add_ride(7, None);
        route.add_ride(5, None);
        route.add_ride(10, None);

        let stops = StopEnRoute.ordered_stops(&mut route, 3, None, &mut |_, _| false);
        assert_eq!(stops, vec![5, 7, 10]);
        assert_eq!(route.length(), 0);
    }

    #[test]
    fn floors_never_requested_are_skipped_silently() {
        let mut route = Route::new();
        route.add_ride(10, None);

        let stops = StopEnRoute.ordered_stops(&mut route, 0, None, &mut |_, _| false);
        assert_eq!(stops, vec![10]);
    }

    #[test]
    fn detours_work_descending_too() {
        let mut route = Route::new();
        route.add_ride(2, None);
        route.add_ride(8, None);

        let stops = StopEnRoute.ordered_stops(&mut route, 10, None, &mut |_, _| false);
        assert_eq!(stops, vec![8, 2]);
    }
}
