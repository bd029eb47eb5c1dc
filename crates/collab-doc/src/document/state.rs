//! The document arena and its single state-transition function.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::containers::checked_range;
use crate::document::history::History;
use crate::error::{DocError, Result};
use crate::event::{EventKind, MutationEvent, ReferenceShifted};
use crate::reference::{RefId, ReferenceSlot};
use crate::target::{EventTarget, Listener, ListenerId, TargetKey};
use crate::value::{ObjectId, ObjectKind, Value};

#[derive(Debug)]
pub(crate) enum Storage {
    Map(IndexMap<String, Value>),
    List(Vec<Value>),
    Text(String),
}

impl Storage {
    pub(crate) fn empty(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Map => Storage::Map(IndexMap::new()),
            ObjectKind::List => Storage::List(Vec::new()),
            ObjectKind::Text => Storage::Text(String::new()),
        }
    }

    pub(crate) fn kind(&self) -> ObjectKind {
        match self {
            Storage::Map(_) => ObjectKind::Map,
            Storage::List(_) => ObjectKind::List,
            Storage::Text(_) => ObjectKind::Text,
        }
    }

    fn contains_object(&self, id: ObjectId) -> bool {
        match self {
            Storage::Map(map) => map.values().any(|v| v.object_id() == Some(id)),
            Storage::List(list) => list.iter().any(|v| v.object_id() == Some(id)),
            Storage::Text(_) => false,
        }
    }

    fn object_ids(&self) -> Vec<ObjectId> {
        match self {
            Storage::Map(map) => map.values().filter_map(Value::object_id).collect(),
            Storage::List(list) => list.iter().filter_map(Value::object_id).collect(),
            Storage::Text(_) => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ObjectSlot {
    pub(crate) storage: Storage,
    pub(crate) target: EventTarget,
    pub(crate) references: IndexSet<RefId>,
}

/// Everything a document owns. Lives behind a `RefCell`; no borrow of it is
/// ever held while a listener runs.
#[derive(Debug)]
pub(crate) struct DocState {
    /// Indexed by `ObjectId`; containers are never removed.
    objects: Vec<ObjectSlot>,
    pub(crate) references: HashMap<RefId, ReferenceSlot>,
    pub(crate) next_reference: u64,
    next_listener: u64,
    /// Document-level listeners (undo/redo state).
    target: EventTarget,
    pub(crate) history: History,
}

impl DocState {
    pub(crate) fn new(history_limit: usize) -> Self {
        Self {
            objects: Vec::new(),
            references: HashMap::new(),
            next_reference: 0,
            next_listener: 0,
            target: EventTarget::default(),
            history: History::new(history_limit),
        }
    }

    /// A fresh state whose first slot holds the empty root map.
    pub(crate) fn with_root(history_limit: usize) -> Self {
        let mut state = Self::new(history_limit);
        state.objects.push(ObjectSlot {
            storage: Storage::empty(ObjectKind::Map),
            target: EventTarget::default(),
            references: IndexSet::new(),
        });
        state
    }

    /// Drops every container, reference and listener.
    pub(crate) fn clear(&mut self) {
        self.objects.clear();
        self.references.clear();
        self.target.clear_listeners();
        self.history.clear();
    }

    /// Allocates a container. Container values already in `storage` get this
    /// container as a parent.
    pub(crate) fn create(&mut self, storage: Storage) -> Result<ObjectId> {
        let id = ObjectId(self.objects.len() as u64);
        self.objects.push(ObjectSlot {
            storage: Storage::empty(storage.kind()),
            target: EventTarget::default(),
            references: IndexSet::new(),
        });
        self.fill(id, storage)?;
        Ok(id)
    }

    /// Replaces a container's storage without events and links the container
    /// values it holds. Only used before the container is observable.
    pub(crate) fn fill(&mut self, id: ObjectId, storage: Storage) -> Result<()> {
        let children = storage.object_ids();
        self.slot_mut(id)?.storage = storage;
        for child in children {
            self.slot_mut(child)?.target.add_parent(id);
        }
        Ok(())
    }

    pub(crate) fn slot(&self, id: ObjectId) -> Result<&ObjectSlot> {
        self.objects
            .get(id.slot())
            .ok_or(DocError::UnknownObject(id))
    }

    pub(crate) fn slot_mut(&mut self, id: ObjectId) -> Result<&mut ObjectSlot> {
        self.objects
            .get_mut(id.slot())
            .ok_or(DocError::UnknownObject(id))
    }

    pub(crate) fn kind(&self, id: ObjectId) -> Result<ObjectKind> {
        Ok(self.slot(id)?.storage.kind())
    }

    pub(crate) fn map(&self, id: ObjectId) -> Result<&IndexMap<String, Value>> {
        match &self.slot(id)?.storage {
            Storage::Map(map) => Ok(map),
            other => Err(wrong_kind(id, ObjectKind::Map, other)),
        }
    }

    pub(crate) fn list(&self, id: ObjectId) -> Result<&Vec<Value>> {
        match &self.slot(id)?.storage {
            Storage::List(list) => Ok(list),
            other => Err(wrong_kind(id, ObjectKind::List, other)),
        }
    }

    pub(crate) fn text(&self, id: ObjectId) -> Result<&str> {
        match &self.slot(id)?.storage {
            Storage::Text(text) => Ok(text),
            other => Err(wrong_kind(id, ObjectKind::Text, other)),
        }
    }

    fn map_mut(&mut self, id: ObjectId) -> Result<&mut IndexMap<String, Value>> {
        match &mut self.slot_mut(id)?.storage {
            Storage::Map(map) => Ok(map),
            other => Err(wrong_kind(id, ObjectKind::Map, other)),
        }
    }

    fn list_mut(&mut self, id: ObjectId) -> Result<&mut Vec<Value>> {
        match &mut self.slot_mut(id)?.storage {
            Storage::List(list) => Ok(list),
            other => Err(wrong_kind(id, ObjectKind::List, other)),
        }
    }

    fn text_mut(&mut self, id: ObjectId) -> Result<&mut String> {
        match &mut self.slot_mut(id)?.storage {
            Storage::Text(text) => Ok(text),
            other => Err(wrong_kind(id, ObjectKind::Text, other)),
        }
    }

    /// Length of a list or text, the containers that accept references.
    pub(crate) fn positional_len(&self, id: ObjectId) -> Result<usize> {
        match &self.slot(id)?.storage {
            Storage::List(list) => Ok(list.len()),
            Storage::Text(text) => Ok(text.chars().count()),
            other => Err(wrong_kind(id, ObjectKind::List, other)),
        }
    }

    fn target_mut(&mut self, key: TargetKey) -> Result<&mut EventTarget> {
        match key {
            TargetKey::Document => Ok(&mut self.target),
            TargetKey::Object(id) => Ok(&mut self.slot_mut(id)?.target),
            TargetKey::Reference(id) => Ok(&mut self.reference_mut(id)?.target),
        }
    }

    pub(crate) fn add_listener(
        &mut self,
        key: TargetKey,
        kind: EventKind,
        listener: Listener,
    ) -> Result<ListenerId> {
        let id = ListenerId(self.next_listener);
        self.target_mut(key)?.add_listener(id, kind, listener);
        self.next_listener += 1;
        Ok(id)
    }

    pub(crate) fn remove_listener(&mut self, key: TargetKey, id: ListenerId) -> Result<bool> {
        Ok(self.target_mut(key)?.remove_listener(id))
    }

    pub(crate) fn listeners_for(&self, key: TargetKey, kind: EventKind) -> Vec<Listener> {
        let target = match key {
            TargetKey::Document => Some(&self.target),
            TargetKey::Object(id) => self.slot(id).ok().map(|slot| &slot.target),
            TargetKey::Reference(id) => self.reference(id).ok().map(|slot| &slot.target),
        };
        target.map(|t| t.listeners_for(kind)).unwrap_or_default()
    }

    /// Every container that (transitively) holds `origin`, breadth-first,
    /// each exactly once. `origin` itself is never included.
    pub(crate) fn ancestors(&self, origin: ObjectId) -> Vec<ObjectId> {
        let mut seen = HashSet::from([origin]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([origin]);
        while let Some(id) = queue.pop_front() {
            let Ok(slot) = self.slot(id) else {
                continue;
            };
            for parent in slot.target.parents() {
                if seen.insert(parent) {
                    order.push(parent);
                    queue.push_back(parent);
                }
            }
        }
        order
    }

    /// Applies one event to storage, maintains parent links and shifts index
    /// references. Returns the reference shifts to announce.
    ///
    /// A `ValueChanged` is normalized in place: a `Null` value becomes a
    /// removal and `index` is set to the key's position, so the inverse
    /// restores the key where it was.
    pub(crate) fn apply(&mut self, event: &mut MutationEvent) -> Result<Vec<ReferenceShifted>> {
        trace!(target = %event.target(), kind = ?event.kind(), "applying mutation event");
        match event {
            MutationEvent::ValueChanged {
                target,
                key,
                new_value,
                index,
                ..
            } => {
                if matches!(new_value, Some(Value::Null)) {
                    *new_value = None;
                }
                let map = self.map_mut(*target)?;
                let replaced = match new_value {
                    Some(value) => match map.get_index_of(key.as_str()) {
                        Some(at) => {
                            *index = Some(at);
                            map.insert(key.clone(), value.clone())
                        }
                        None => {
                            let at = index.map_or(map.len(), |at| at.min(map.len()));
                            map.shift_insert(at, key.clone(), value.clone());
                            *index = Some(at);
                            None
                        }
                    },
                    None => map.shift_remove_full(key.as_str()).map(|(at, _, old)| {
                        *index = Some(at);
                        old
                    }),
                };
                self.unlink_missing(*target, replaced.iter())?;
                self.link(*target, new_value.iter())?;
                Ok(Vec::new())
            }
            MutationEvent::ValuesAdded {
                target,
                index,
                values,
            } => {
                let list = self.list_mut(*target)?;
                if *index > list.len() {
                    return Err(DocError::IndexOutOfRange {
                        index: *index,
                        len: list.len(),
                    });
                }
                list.splice(*index..*index, values.iter().cloned());
                self.link(*target, values.iter())?;
                Ok(self.shift_inserted(*target, *index, values.len()))
            }
            MutationEvent::ValuesRemoved {
                target,
                index,
                values,
            } => {
                let list = self.list_mut(*target)?;
                let end = *index + values.len();
                checked_range(*index, end, list.len())?;
                let removed: Vec<Value> = list.drain(*index..end).collect();
                self.unlink_missing(*target, removed.iter())?;
                Ok(self.shift_removed(*target, *index, values.len()))
            }
            MutationEvent::ValuesSet {
                target,
                index,
                values,
                ..
            } => {
                let list = self.list_mut(*target)?;
                let end = *index + values.len();
                checked_range(*index, end, list.len())?;
                let replaced: Vec<Value> = list.splice(*index..end, values.iter().cloned()).collect();
                self.unlink_missing(*target, replaced.iter())?;
                self.link(*target, values.iter())?;
                Ok(Vec::new())
            }
            MutationEvent::TextInserted {
                target,
                index,
                text,
            } => {
                let content = self.text_mut(*target)?;
                let at = byte_offset(content, *index).ok_or(DocError::IndexOutOfRange {
                    index: *index,
                    len: content.chars().count(),
                })?;
                content.insert_str(at, text);
                Ok(self.shift_inserted(*target, *index, text.chars().count()))
            }
            MutationEvent::TextDeleted {
                target,
                index,
                text,
            } => {
                let content = self.text_mut(*target)?;
                let count = text.chars().count();
                let end = *index + count;
                let out_of_bounds = DocError::InvalidRange {
                    start: *index,
                    end,
                    len: content.chars().count(),
                };
                let (Some(from), Some(to)) = (byte_offset(content, *index), byte_offset(content, end))
                else {
                    return Err(out_of_bounds);
                };
                content.replace_range(from..to, "");
                Ok(self.shift_removed(*target, *index, count))
            }
        }
    }

    fn link<'a>(&mut self, parent: ObjectId, values: impl Iterator<Item = &'a Value>) -> Result<()> {
        for child in values.filter_map(Value::object_id) {
            self.slot_mut(child)?.target.add_parent(parent);
        }
        Ok(())
    }

    /// Drops `parent` from each removed container that is no longer stored
    /// anywhere in `parent`.
    fn unlink_missing<'a>(
        &mut self,
        parent: ObjectId,
        removed: impl Iterator<Item = &'a Value>,
    ) -> Result<()> {
        let candidates: Vec<ObjectId> = removed.filter_map(Value::object_id).collect();
        if candidates.is_empty() {
            return Ok(());
        }
        let storage = &self.slot(parent)?.storage;
        let gone: Vec<ObjectId> = candidates
            .into_iter()
            .filter(|child| !storage.contains_object(*child))
            .collect();
        for child in gone {
            self.slot_mut(child)?.target.remove_parent(parent);
        }
        Ok(())
    }
}

fn wrong_kind(id: ObjectId, expected: ObjectKind, actual: &Storage) -> DocError {
    DocError::WrongKind {
        id,
        expected,
        actual: actual.kind(),
    }
}

/// Byte position of the `index`-th char; `index == char count` maps to the
/// end of the string.
fn byte_offset(text: &str, index: usize) -> Option<usize> {
    text.char_indices()
        .map(|(at, _)| at)
        .chain(std::iter::once(text.len()))
        .nth(index)
}
