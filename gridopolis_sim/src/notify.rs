// Change notification registry.
//
// Rendering and other observers never sit inside the grid. They register
// with the `Notifier` and are addressed by `ListenerId`. Two kinds exist:
// - `ModelListener`: whole-model events (grid region changed, clock moved,
//   census published).
// - `CellListener`: events for one cell (population changed, bulldozed),
//   delivered through subscriptions keyed by `CellKey`.
//
// A `CellKey` names a zone by id rather than by location, so a subscriber
// watching any of a zone's nine slots hears about the zone as a whole. When
// the thing a key names is replaced (a slot repainted, a zone demolished)
// its subscriptions are retired: a listener attached to a cell never hears
// about the cell that took its place.
//
// Listeners are notified in registration order (per key, in subscription
// order). They are never consulted for control flow.
//
// See also: `city.rs`, which decides when each event fires.

use crate::time::SimTime;
use crate::types::{CellType, GridLocation, GridRectangle, ListenerId, ZoneId};
use crate::zone::Census;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Observer of whole-model events. Every method has an empty default.
pub trait ModelListener {
    fn grid_changed(&mut self, _rect: GridRectangle) {}
    fn time_changed(&mut self, _now: SimTime) {}
    fn census_changed(&mut self, _census: &Census) {}
}

/// Observer of individual cells.
pub trait CellListener {
    fn bulldozed(&mut self, _cell: &CellNotice) {}
    fn changed(&mut self, _cell: &CellNotice) {}
}

/// The identity a cell subscription is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    /// A plain terrain or road cell at a location.
    At(GridLocation),
    /// A zone, covering all nine of its slots.
    Zone(ZoneId),
}

/// What a cell listener is told about the cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellNotice {
    pub key: CellKey,
    pub cell_type: CellType,
    /// Zone population; `None` for non-zone cells.
    pub population: Option<i32>,
}

#[derive(Default)]
pub struct Notifier {
    next_listener_id: u32,
    model_listeners: BTreeMap<ListenerId, Box<dyn ModelListener>>,
    cell_listeners: BTreeMap<ListenerId, Box<dyn CellListener>>,
    subscriptions: FxHashMap<CellKey, SmallVec<[ListenerId; 2]>>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("model_listeners", &self.model_listeners.len())
            .field("cell_listeners", &self.cell_listeners.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    // -- registration -----------------------------------------------------

    pub fn add_model_listener(&mut self, listener: Box<dyn ModelListener>) -> ListenerId {
        let id = ListenerId::next(&mut self.next_listener_id);
        self.model_listeners.insert(id, listener);
        id
    }

    pub fn remove_model_listener(&mut self, id: ListenerId) -> Option<Box<dyn ModelListener>> {
        self.model_listeners.remove(&id)
    }

    /// Register a cell listener. It hears nothing until subscribed to a key.
    pub fn add_cell_listener(&mut self, listener: Box<dyn CellListener>) -> ListenerId {
        let id = ListenerId::next(&mut self.next_listener_id);
        self.cell_listeners.insert(id, listener);
        id
    }

    /// Drop a cell listener along with all of its subscriptions.
    pub fn remove_cell_listener(&mut self, id: ListenerId) -> Option<Box<dyn CellListener>> {
        let removed = self.cell_listeners.remove(&id)?;
        self.subscriptions.retain(|_, ids| {
            ids.retain(|l| *l != id);
            !ids.is_empty()
        });
        Some(removed)
    }

    /// Attach a registered cell listener to `key`. Returns false if `id` is
    /// not a registered cell listener.
    pub fn subscribe(&mut self, key: CellKey, id: ListenerId) -> bool {
        if !self.cell_listeners.contains_key(&id) {
            return false;
        }
        self.subscriptions.entry(key).or_default().push(id);
        true
    }

    /// Detach one subscription of `id` from `key`.
    pub fn unsubscribe(&mut self, key: CellKey, id: ListenerId) -> bool {
        let Some(ids) = self.subscriptions.get_mut(&key) else {
            return false;
        };
        let Some(pos) = ids.iter().position(|l| *l == id) else {
            return false;
        };
        ids.remove(pos);
        if ids.is_empty() {
            self.subscriptions.remove(&key);
        }
        true
    }

    /// Forget every subscription on `key`; the cell it named is gone.
    pub fn retire(&mut self, key: CellKey) {
        self.subscriptions.remove(&key);
    }

    /// Forget every subscription. Used when the whole grid is replaced.
    pub fn retire_all(&mut self) {
        self.subscriptions.clear();
    }

    pub fn subscriber_count(&self, key: CellKey) -> usize {
        self.subscriptions.get(&key).map_or(0, |ids| ids.len())
    }

    // -- delivery ---------------------------------------------------------

    pub fn grid_changed(&mut self, rect: GridRectangle) {
        for listener in self.model_listeners.values_mut() {
            listener.grid_changed(rect);
        }
    }

    pub fn time_changed(&mut self, now: SimTime) {
        for listener in self.model_listeners.values_mut() {
            listener.time_changed(now);
        }
    }

    pub fn census_changed(&mut self, census: &Census) {
        for listener in self.model_listeners.values_mut() {
            listener.census_changed(census);
        }
    }

    pub fn cell_changed(&mut self, notice: &CellNotice) {
        self.deliver(notice, |l, n| l.changed(n));
    }

    pub fn cell_bulldozed(&mut self, notice: &CellNotice) {
        self.deliver(notice, |l, n| l.bulldozed(n));
    }

    fn deliver(&mut self, notice: &CellNotice, f: impl Fn(&mut dyn CellListener, &CellNotice)) {
        let Some(ids) = self.subscriptions.get(&notice.key) else {
            return;
        };
        for id in ids {
            if let Some(listener) = self.cell_listeners.get_mut(id) {
                f(listener.as_mut(), notice);
            }
        }
    }
}
