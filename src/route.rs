use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::event::ButtonEvent;
use crate::floor::Floor;

const BUTTON_CHANNEL_CAPACITY: usize = 256;

/// A per-occurrence identity tag wrapping a floor. Two tags for the same
/// floor never compare equal: identity is the freshly minted `Uuid`, not
/// the floor value. Used to reserve a slot in the route's insertion
/// order without being a visitable stop in its own right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionalFloor {
    id: Uuid,
    floor: Floor,
}

impl ConditionalFloor {
    fn new(floor: Floor) -> Self {
        ConditionalFloor { id: Uuid::new_v4(), floor }
    }

    pub fn floor(&self) -> Floor {
        self.floor
    }
}

impl From<ConditionalFloor> for Floor {
    fn from(cf: ConditionalFloor) -> Floor {
        cf.floor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RouteKey {
    Floor(Floor),
    Conditional(ConditionalFloor),
}

impl RouteKey {
    fn numeric(&self) -> Floor {
        match self {
            RouteKey::Floor(f) => *f,
            RouteKey::Conditional(cf) => cf.floor(),
        }
    }
}

/// Per-floor data carried in the route: which conditional tags become
/// new stops when this floor is visited, which conditional tags get
/// dropped from the queue on that same visit, and how many times
/// `add_ride` has targeted this floor.
#[derive(Debug, Clone)]
pub struct RouteItem {
    floor: Floor,
    visit_after: Vec<ConditionalFloor>,
    delete_on_visit: Vec<ConditionalFloor>,
    request_count: u32,
}

impl RouteItem {
    pub fn floor(&self) -> Floor {
        self.floor
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn visit_after(&self) -> &[ConditionalFloor] {
        &self.visit_after
    }
}

/// An ordered queue of floors to visit, with conditional-after-pickup
/// reservations. Floor keys appear at most once; conditional tags are
/// identity-unique placeholders that reserve a later insertion slot.
pub struct Route {
    order: Vec<RouteKey>,
    items: HashMap<Floor, RouteItem>,
    buttons: broadcast::Sender<ButtonEvent>,
}

impl Route {
    pub fn new() -> Self {
        let (buttons, _) = broadcast::channel(BUTTON_CHANNEL_CAPACITY);
        Route { order: Vec::new(), items: HashMap::new(), buttons }
    }

    pub fn subscribe_buttons(&self) -> broadcast::Receiver<ButtonEvent> {
        self.buttons.subscribe()
    }

    /// Adds (or re-requests) a ride. Idempotent at the "which floors are
    /// buttoned" level; `request_count` increments on every call for an
    /// already-present pickup. `dropoff`, if given, mints a fresh
    /// conditional tag that reserves its slot in the queue now and is
    /// fulfilled when `pickup` is visited.
    pub fn add_ride(&mut self, pickup: Floor, dropoff: Option<Floor>) -> &RouteItem {
        if let Some(item) = self.items.get_mut(&pickup) {
            item.request_count += 1;
        } else {
            self.order.push(RouteKey::Floor(pickup));
            self.items.insert(
                pickup,
                RouteItem { floor: pickup, visit_after: Vec::new(), delete_on_visit: Vec::new(), request_count: 1 },
            );
            let _ = self.buttons.send(ButtonEvent { floor: pickup, active: true });
        }

        if let Some(dropoff) = dropoff {
            let cf = ConditionalFloor::new(dropoff);
            self.order.push(RouteKey::Conditional(cf));
            self.items.get_mut(&pickup).expect("just inserted or already present").visit_after.push(cf);
        }

        self.items.get(&pickup).expect("just inserted or already present")
    }

    /// True iff `f` is present as a Floor key. Conditional tags never
    /// count, even if their underlying floor matches.
    pub fn should_visit(&self, f: Floor) -> bool {
        self.items.contains_key(&f)
    }

    /// Visits `f` if it is queued: spawns a fresh queue entry for every
    /// conditional tag in its `visit_after` list (recording the tag in
    /// the new entry's `delete_on_visit`), drops every tag in its own
    /// `delete_on_visit`, then removes `f` itself. No-op returning
    /// `false` if `f` was not queued.
    pub fn visit_now(&mut self, f: Floor) -> bool {
        if !self.items.contains_key(&f) {
            return false;
        }

        let visit_after = self.items.get(&f).expect("checked above").visit_after.clone();
        for cf in visit_after {
            let floor = cf.floor();
            self.add_ride(floor, None);
            self.items.get_mut(&floor).expect("add_ride just ensured this").delete_on_visit.push(cf);
        }

        let delete_on_visit = self.items.get(&f).expect("checked above").delete_on_visit.clone();
        for cf in delete_on_visit {
            self.order.retain(|k| *k != RouteKey::Conditional(cf));
        }

        self.items.remove(&f);
        self.order.retain(|k| *k != RouteKey::Floor(f));
        let _ = self.buttons.send(ButtonEvent { floor: f, active: false });
        true
    }

    /// The queue's first key, as a numeric floor. Conditional tags are
    /// returned here (strategies use them as ordering hints).
    pub fn first(&self) -> Option<Floor> {
        self.order.first().map(RouteKey::numeric)
    }

    pub fn length(&self) -> usize {
        self.order.len()
    }

    /// Iterates every key's numeric floor value in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Floor> + '_ {
        self.order.iter().map(RouteKey::numeric)
    }

    /// Floors of Floor-keys only; order is unspecified.
    pub fn pushed_buttons(&self) -> Vec<Floor> {
        self.items.keys().copied().collect()
    }

    /// A deep, independent clone. Operations run against the copy never
    /// reach this route's subscribers: the copy gets its own,
    /// unobserved button channel.
    pub fn copy(&self) -> Route {
        let (buttons, _) = broadcast::channel(BUTTON_CHANNEL_CAPACITY);
        Route { order: self.order.clone(), items: self.items.clone(), buttons }
    }
}

impl Default for Route {
    fn default() -> Self {
        Route::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_add_ride_is_idempotent_on_keys() {
        let mut route = Route::new();
        route.add_ride(7, None);
        route.add_ride(7, None);
        route.add_ride(7, None);
        assert_eq!(route.length(), 1);
        assert_eq!(route.add_ride(7, None).request_count(), 4);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut route = Route::new();
        route.add_ride(7, None);
        route.add_ride(5, None);
        route.add_ride(10, None);
        assert_eq!(route.iter().collect::<Vec<_>>(), vec![7, 5, 10]);
    }

    #[test]
    fn conditional_dropoff_reserves_a_slot_without_being_visitable() {
        let mut route = Route::new();
        route.add_ride(3, Some(4));
        assert!(route.should_visit(3));
        assert!(!route.should_visit(4));
        assert_eq!(route.first(), Some(3));
    }

    #[test]
    fn conditional_dropoff_preserves_order_across_a_visit() {
        let mut route = Route::new();
        route.add_ride(3, Some(4));
        route.add_ride(10, None);
        route.add_ride(13, None);

        assert_eq!(route.length(), 4);
        assert!(route.should_visit(3));
        assert!(!route.should_visit(4));
        assert_eq!(route.first(), Some(3));

        assert!(route.visit_now(3));
        assert_eq!(route.length(), 4);
        assert_eq!(route.first(), Some(4));
        assert!(route.should_visit(4));
    }

    #[test]
    fn visit_now_on_absent_floor_is_a_no_op() {
        let mut route = Route::new();
        route.add_ride(7, None);
        assert!(!route.visit_now(99));
        assert_eq!(route.length(), 1);
    }

    #[test]
    fn copy_is_independent_of_the_original() {
        let mut route = Route::new();
        route.add_ride(7, None);
        let mut copy = route.copy();
        copy.add_ride(9, None);
        copy.visit_now(7);

        assert_eq!(route.length(), 1);
        assert!(route.should_visit(7));
        assert_eq!(copy.length(), 1);
        assert!(copy.should_visit(9));
    }

    #[test]
    fn two_conditional_floors_for_the_same_floor_are_distinct() {
        let mut route = Route::new();
        route.add_ride(1, Some(5));
        route.add_ride(1, Some(5));
        let item = route.add_ride(1, None);
        assert_eq!(item.visit_after().len(), 2);
        assert_ne!(item.visit_after()[0], item.visit_after()[1]);
    }
}
