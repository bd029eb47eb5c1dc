//! Listener registry and parent set embedded in every event target.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::event::{Event, EventKind};
use crate::value::ObjectId;

/// Callback invoked synchronously for each matching event.
///
/// Listeners run with no internal borrow held, so they may read or mutate the
/// document, including the target they are registered on.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Handle returned by `add_listener`, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Where an event is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TargetKey {
    Document,
    Object(ObjectId),
    Reference(crate::reference::RefId),
}

#[derive(Default)]
pub(crate) struct EventTarget {
    listeners: Vec<(ListenerId, EventKind, Listener)>,
    parents: IndexSet<ObjectId>,
}

impl EventTarget {
    pub(crate) fn add_listener(&mut self, id: ListenerId, kind: EventKind, listener: Listener) {
        self.listeners.push((id, kind, listener));
    }

    pub(crate) fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Snapshot of the listeners for `kind`, in registration order.
    pub(crate) fn listeners_for(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| Rc::clone(l))
            .collect()
    }

    pub(crate) fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub(crate) fn add_parent(&mut self, parent: ObjectId) -> bool {
        self.parents.insert(parent)
    }

    pub(crate) fn remove_parent(&mut self, parent: ObjectId) -> bool {
        self.parents.shift_remove(&parent)
    }

    pub(crate) fn parents(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.parents.iter().copied()
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.listeners.len())
            .field("parents", &self.parents)
            .finish()
    }
}
