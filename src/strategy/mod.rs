mod insert_order;
mod stop_en_route;

pub use insert_order::InsertOrder;
pub use stop_en_route::StopEnRoute;

use crate::error::Error;
use crate::floor::Floor;
use crate::route::Route;

/// Batch size for the cooperative traversal below: `ordered_stops` is
/// given at most this many stops before the batching wrapper forces it
/// to return, so a long estimation never blocks the runtime for longer
/// than it takes to plan a handful of stops.
const BATCH_SIZE: u32 = 10;

/// Safety bound on the number of batches a single `estimate_pickup_dropoff_time`
/// call may run through. A `Strategy` that never advances `current` toward
/// `target` (a bug, not a legitimate route state) trips this instead of
/// looping forever.
const MAX_BATCHES: u32 = 1000;

/// A planner for one elevator's route. Implementations are pure: all
/// state lives in the `Route` passed by the caller, so the same
/// strategy value can plan for every elevator in a bank.
///
/// `estimate_pickup_dropoff_time` is not part of this trait: it is the
/// same batched algorithm for every strategy (see the free function
/// below), built entirely on top of `ordered_stops`, so there is
/// nothing for an implementation to override.
pub trait Strategy: Send + Sync {
    /// Plans the order in which `route`'s queued floors will be
    /// visited, starting from `current` and, if given, heading toward
    /// `target` (inserted into the route first if not already queued).
    /// Mutates `route` in place via `visit_now` as it plans each stop.
    ///
    /// `stop_early`, if given, is called after every stop actually
    /// visited with `(floor, stops_so_far)`; returning `true` ends the
    /// call early, returning whatever stops were planned up to and
    /// including that one.
    fn ordered_stops(
        &self,
        route: &mut Route,
        current: Floor,
        target: Option<Floor>,
        stop_early: &mut dyn FnMut(Floor, &[Floor]) -> bool,
    ) -> Vec<Floor>;

    /// The number of floors (signed: positive up, negative down) the
    /// elevator should move right now given its current position and
    /// queued route. `0` means stay put (e.g. doors should open instead).
    fn nr_floors_to_move(&self, route: &Route, current: Floor) -> i32;

    /// Called before a ride is admitted to an elevator's route. The
    /// default never vetoes; a bank-level admission policy may still
    /// reject the ride on other grounds.
    fn check_if_ride_is_vetoed(
        &self,
        _route: &Route,
        _current: Floor,
        _pickup: Floor,
        _dropoff: Option<Floor>,
    ) -> bool {
        false
    }
}

/// The travel/dwell constants an estimate is priced against, plus the
/// soft ceiling past which a candidate is reported as unreachable in
/// time rather than merely slow.
#[derive(Debug, Clone, Copy)]
pub struct EstimationLimits {
    pub travel_time_per_floor_ms: i64,
    pub door_open_time_ms: i64,
    pub estimation_limit_ms: i64,
}

/// Runs `strategy.ordered_stops` against a private copy of `route` in
/// bounded batches, yielding to the runtime between batches, until
/// `current` reaches `target`, the route copy empties, or `stop_early`
/// signals a hard stop. Returns the floor actually reached.
///
/// This is the only place `ordered_stops` is driven in an unbounded
/// loop; callers outside estimation invoke it directly, once, for a
/// route short enough that a single call already returns everything.
async fn batched_traverse_to_target(
    strategy: &dyn Strategy,
    route: &mut Route,
    mut current: Floor,
    target: Floor,
    stop_early: &mut dyn FnMut(Floor, &[Floor]) -> bool,
) -> Result<Floor, Error> {
    let mut done = false;
    let mut batches = 0u32;

    while !done && current != target && route.length() > 0 {
        batches += 1;
        if batches > MAX_BATCHES {
            return Err(Error::internal_bug(
                "strategy::batched_traverse_to_target",
                "exceeded the batch safety bound without reaching the target or draining the route",
                format!("current={current} target={target} route_length={}", route.length()),
            ));
        }

        let mut in_batch = 0u32;
        let mut halted = false;
        let stops = strategy.ordered_stops(route, current, Some(target), &mut |floor, stops_so_far| {
            in_batch += 1;
            if stop_early(floor, stops_so_far) {
                halted = true;
                return true;
            }
            in_batch >= BATCH_SIZE
        });
        done = halted;

        if let Some(&last) = stops.last() {
            current = last;
        } else {
            // ordered_stops produced nothing this pass; nothing left to
            // converge on.
            break;
        }

        tokio::task::yield_now().await;
    }

    Ok(current)
}

/// Estimates, in milliseconds, how long it would take this elevator to
/// reach `pickup` and then (if given) `dropoff`, without mutating the
/// elevator's real route: `route` is expected to already be a private
/// copy. Returns `-1` if the estimate exceeds `limits.estimation_limit_ms`
/// or if the underlying traversal trips its safety bound.
pub async fn estimate_pickup_dropoff_time(
    strategy: &dyn Strategy,
    mut route: Route,
    current: Floor,
    pickup: Floor,
    dropoff: Option<Floor>,
    limits: &EstimationLimits,
) -> i64 {
    let mut estimated_time: i64 = 0;
    let mut last = current;

    let mut accumulate = |floor: Floor, _stops_so_far: &[Floor]| {
        estimated_time += limits.door_open_time_ms + ((floor - last) as i64).abs() * limits.travel_time_per_floor_ms;
        last = floor;
        estimated_time > limits.estimation_limit_ms
    };

    let mut position = current;
    if position == pickup {
        estimated_time += limits.door_open_time_ms;
    } else {
        match batched_traverse_to_target(strategy, &mut route, position, pickup, &mut accumulate).await {
            Ok(reached) => position = reached,
            Err(e) => {
                log::warn!("estimate_pickup_dropoff_time: {e}");
                return -1;
            }
        }
    }

    if estimated_time > limits.estimation_limit_ms {
        return -1;
    }

    if let Some(dropoff) = dropoff {
        match batched_traverse_to_target(strategy, &mut route, position, dropoff, &mut accumulate).await {
            Ok(_) => {}
            Err(e) => {
                log::warn!("estimate_pickup_dropoff_time: {e}");
                return -1;
            }
        }
    }

    if estimated_time > limits.estimation_limit_ms {
        -1
    } else {
        estimated_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: EstimationLimits =
        EstimationLimits { travel_time_per_floor_ms: 1000, door_open_time_ms: 3000, estimation_limit_ms: 600_000 };

    #[tokio::test]
    async fn estimate_is_minus_one_past_the_limit() {
        let strategy = InsertOrder;
        let mut route = Route::new();
        route.add_ride(500, None);

        let tight = EstimationLimits { estimation_limit_ms: 1000, ..LIMITS };
        let time = estimate_pickup_dropoff_time(&strategy, route.copy(), 0, 500, None, &tight).await;
        assert_eq!(time, -1);

        let time = estimate_pickup_dropoff_time(&strategy, route, 0, 500, None, &LIMITS).await;
        assert!(time > 0);
    }

    #[tokio::test]
    async fn estimate_already_at_pickup_only_charges_door_time() {
        let strategy = InsertOrder;
        let route = Route::new();
        let time = estimate_pickup_dropoff_time(&strategy, route, 5, 5, None, &LIMITS).await;
        assert_eq!(time, LIMITS.door_open_time_ms);
    }
}
