//! Mutation events.
//!
//! Every change to a container is described by a [`MutationEvent`]. The same
//! value is used three ways:
//!
//! - applied to storage by the document's single state-transition function,
//! - dispatched to listeners of the target container,
//! - stored in an operation record so it can be inverted by undo.
//!
//! The remaining [`Event`] variants are notifications only and never enter
//! the history.

use crate::document::DocState;
use crate::error::{DocError, Result};
use crate::reference::RefId;
use crate::value::{ObjectId, Value};

/// Listener registration key. One per [`Event`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ValueChanged,
    ValuesAdded,
    ValuesRemoved,
    ValuesSet,
    TextInserted,
    TextDeleted,
    ReferenceShifted,
    ObjectChanged,
    UndoRedoStateChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationEvent {
    /// A map key was written (`new_value = Some`) or removed (`None`).
    ValueChanged {
        target: ObjectId,
        key: String,
        new_value: Option<Value>,
        old_value: Option<Value>,
        /// Position of `key` in the map's key order. Filled in when the event
        /// is applied, so the inverse puts a removed key back where it was.
        index: Option<usize>,
    },
    ValuesAdded {
        target: ObjectId,
        index: usize,
        values: Vec<Value>,
    },
    ValuesRemoved {
        target: ObjectId,
        index: usize,
        values: Vec<Value>,
    },
    /// `values` overwrite `old_values` starting at `index`.
    ValuesSet {
        target: ObjectId,
        index: usize,
        values: Vec<Value>,
        old_values: Vec<Value>,
    },
    TextInserted {
        target: ObjectId,
        index: usize,
        text: String,
    },
    TextDeleted {
        target: ObjectId,
        index: usize,
        text: String,
    },
}

impl MutationEvent {
    pub fn target(&self) -> ObjectId {
        match self {
            MutationEvent::ValueChanged { target, .. }
            | MutationEvent::ValuesAdded { target, .. }
            | MutationEvent::ValuesRemoved { target, .. }
            | MutationEvent::ValuesSet { target, .. }
            | MutationEvent::TextInserted { target, .. }
            | MutationEvent::TextDeleted { target, .. } => *target,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            MutationEvent::ValueChanged { .. } => EventKind::ValueChanged,
            MutationEvent::ValuesAdded { .. } => EventKind::ValuesAdded,
            MutationEvent::ValuesRemoved { .. } => EventKind::ValuesRemoved,
            MutationEvent::ValuesSet { .. } => EventKind::ValuesSet,
            MutationEvent::TextInserted { .. } => EventKind::TextInserted,
            MutationEvent::TextDeleted { .. } => EventKind::TextDeleted,
        }
    }

    /// The event that, applied right after `self`, restores the previous
    /// storage state.
    pub fn inverse(&self) -> MutationEvent {
        match self.clone() {
            MutationEvent::ValueChanged {
                target,
                key,
                new_value,
                old_value,
                index,
            } => MutationEvent::ValueChanged {
                target,
                key,
                new_value: old_value,
                old_value: new_value,
                index,
            },
            MutationEvent::ValuesAdded {
                target,
                index,
                values,
            } => MutationEvent::ValuesRemoved {
                target,
                index,
                values,
            },
            MutationEvent::ValuesRemoved {
                target,
                index,
                values,
            } => MutationEvent::ValuesAdded {
                target,
                index,
                values,
            },
            MutationEvent::ValuesSet {
                target,
                index,
                values,
                old_values,
            } => MutationEvent::ValuesSet {
                target,
                index,
                values: old_values,
                old_values: values,
            },
            MutationEvent::TextInserted {
                target,
                index,
                text,
            } => MutationEvent::TextDeleted {
                target,
                index,
                text,
            },
            MutationEvent::TextDeleted {
                target,
                index,
                text,
            } => MutationEvent::TextInserted {
                target,
                index,
                text,
            },
        }
    }

    /// Re-reads the values a `ValuesSet` currently covers from storage.
    ///
    /// Must run immediately before [`MutationEvent::inverse`] during undo and
    /// redo: the inverse writes back `old_values` and must remember exactly
    /// what it overwrote. Other variants carry their payload verbatim.
    pub(crate) fn refresh(&mut self, state: &DocState) -> Result<()> {
        if let MutationEvent::ValuesSet {
            target,
            index,
            values,
            ..
        } = self
        {
            let list = state.list(*target)?;
            let end = *index + values.len();
            let current = list.get(*index..end).ok_or(DocError::InvalidRange {
                start: *index,
                end,
                len: list.len(),
            })?;
            *values = current.to_vec();
        }
        Ok(())
    }
}

/// Aggregate change notification. Fired once per distinct target at the end
/// of a compound operation and bubbled to every ancestor container.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectChanged {
    /// Container whose storage changed.
    pub target: ObjectId,
    /// The events applied to `target`, in application order.
    pub events: Vec<MutationEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceShifted {
    pub reference: RefId,
    pub old_index: Option<usize>,
    /// `None` when the anchor was deleted.
    pub new_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoRedoStateChanged {
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Anything a listener can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Mutation(MutationEvent),
    ObjectChanged(ObjectChanged),
    ReferenceShifted(ReferenceShifted),
    UndoRedoStateChanged(UndoRedoStateChanged),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Mutation(e) => e.kind(),
            Event::ObjectChanged(_) => EventKind::ObjectChanged,
            Event::ReferenceShifted(_) => EventKind::ReferenceShifted,
            Event::UndoRedoStateChanged(_) => EventKind::UndoRedoStateChanged,
        }
    }

    /// Only the aggregate event travels up the containment graph.
    pub fn bubbles(&self) -> bool {
        matches!(self, Event::ObjectChanged(_))
    }

    pub fn as_mutation(&self) -> Option<&MutationEvent> {
        match self {
            Event::Mutation(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_object_changed(&self) -> Option<&ObjectChanged> {
        match self {
            Event::ObjectChanged(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_reference_shifted(&self) -> Option<&ReferenceShifted> {
        match self {
            Event::ReferenceShifted(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_undo_redo_state(&self) -> Option<&UndoRedoStateChanged> {
        match self {
            Event::UndoRedoStateChanged(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ObjectId {
        ObjectId(n)
    }

    #[test]
    fn inverse_swaps_list_add_and_remove() {
        let added = MutationEvent::ValuesAdded {
            target: id(1),
            index: 2,
            values: vec![Value::Int(9)],
        };
        let inv = added.inverse();
        assert_eq!(inv.kind(), EventKind::ValuesRemoved);
        assert_eq!(inv.inverse(), added);
    }

    #[test]
    fn inverse_swaps_map_values() {
        let ev = MutationEvent::ValueChanged {
            target: id(0),
            key: "a".into(),
            new_value: Some(Value::Int(1)),
            old_value: None,
            index: Some(2),
        };
        match ev.inverse() {
            MutationEvent::ValueChanged {
                new_value,
                old_value,
                index,
                ..
            } => {
                assert_eq!(new_value, None);
                assert_eq!(old_value, Some(Value::Int(1)));
                assert_eq!(index, Some(2));
            }
            other => panic!("unexpected inverse {other:?}"),
        }
    }

    #[test]
    fn inverse_swaps_text_ops() {
        let ev = MutationEvent::TextInserted {
            target: id(3),
            index: 0,
            text: "hi".into(),
        };
        assert_eq!(ev.inverse().kind(), EventKind::TextDeleted);
        assert_eq!(ev.inverse().target(), id(3));
    }

    #[test]
    fn only_object_changed_bubbles() {
        let changed = Event::ObjectChanged(ObjectChanged {
            target: id(1),
            events: Vec::new(),
        });
        assert!(changed.bubbles());
        let state = Event::UndoRedoStateChanged(UndoRedoStateChanged {
            can_undo: true,
            can_redo: false,
        });
        assert!(!state.bubbles());
        assert_eq!(state.kind(), EventKind::UndoRedoStateChanged);
    }
}
