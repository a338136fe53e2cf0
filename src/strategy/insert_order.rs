use crate::floor::Floor;
use crate::route::Route;
use crate::strategy::Strategy;

/// Visits floors strictly in the order they were requested. A
/// conditional dropoff's slot is skipped silently until its pickup has
/// been visited and the slot's underlying floor becomes visitable;
/// `Route` guarantees a pickup's slot always precedes its own
/// conditional tag, so that tag is never reached before it resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOrder;

impl Strategy for InsertOrder {
    fn ordered_stops(
        &self,
        route: &mut Route,
        _current: Floor,
        target: Option<Floor>,
        stop_early: &mut dyn FnMut(Floor, &[Floor]) -> bool,
    ) -> Vec<Floor> {
        if let Some(t) = target {
            route.add_ride(t, None);
        }

        let keys: Vec<Floor> = route.iter().collect();
        let mut stops = Vec::new();

        for floor in keys {
            if !route.visit_now(floor) {
                continue;
            }
            stops.push(floor);

            if stop_early(floor, &stops) {
                return stops;
            }
            if target == Some(floor) {
                return stops;
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
    fn visits_in_insertion_order() {
        let mut route = Route::new();
        route.add_ride(7, None);
        route.add_ride(3, None);
        route.add_ride(10, None);

        let stops = InsertOrder.ordered_stops(&mut route, 0, None, &mut |_, _| false);
        assert_eq!(stops, vec![7, 3, 10]);
        assert_eq!(route.length(), 0);
    }

    #[test]
    fn conditional_dropoff_is_visited_inline_in_original_order() {
        let mut route = Route::new();
        route.add_ride(3, Some(4));
        route.add_ride(10, None);
        route.add_ride(13, None);

        let stops = InsertOrder.ordered_stops(&mut route, 0, None, &mut |_, _| false);
        assert_eq!(stops, vec![3, 4, 10, 13]);
        assert_eq!(route.length(), 0);
    }

    #[test]
    fn target_not_yet_queued_is_inserted_and_planning_stops_there() {
        let mut route = Route::new();
        route.add_ride(2, None);

        let stops = InsertOrder.ordered_stops(&mut route, 0, Some(9), &mut |_, _| false);
        assert_eq!(stops, vec![2, 9]);
    }

    #[test]
    fn nr_floors_to_move_returns_a_unit_step_toward_the_front_of_the_queue() {
        let mut route = Route::new();
        assert_eq!(InsertOrder.nr_floors_to_move(&route, 5), 0);

        route.add_ride(8, None);
        assert_eq!(InsertOrder.nr_floors_to_move(&route, 5), 1);
        route.add_ride(1, None);
        assert_eq!(InsertOrder.nr_floors_to_move(&route, 5), 1);
    }

    #[test]
    fn nr_floors_to_move_returns_minus_one_when_the_front_is_below_current() {
        let mut route = Route::new();
        route.add_ride(2, None);
        assert_eq!(InsertOrder.nr_floors_to_move(&route, 5), -1);
    }
}
