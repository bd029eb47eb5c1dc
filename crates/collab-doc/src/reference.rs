//! Positional anchors inside lists and texts.
//!
//! An [`IndexReference`] follows its position across every insert and delete
//! applied to the owning container, including the ones replayed by undo and
//! redo. Anchors whose position is deleted either collapse onto the start of
//! the deleted range or, when created with `can_be_deleted`, become
//! invalidated for good.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::document::{DocShared, DocState};
use crate::error::{DocError, Result};
use crate::event::{Event, EventKind, ReferenceShifted};
use crate::target::{EventTarget, ListenerId, TargetKey};
use crate::value::ObjectId;

/// Identifier of a registered index reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub(crate) u64);

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct ReferenceSlot {
    pub(crate) owner: ObjectId,
    pub(crate) index: Option<usize>,
    pub(crate) can_be_deleted: bool,
    pub(crate) target: EventTarget,
}

/// New position after `count` items were inserted at `at`.
pub(crate) fn shifted_on_insert(index: usize, at: usize, count: usize) -> usize {
    if index >= at {
        index + count
    } else {
        index
    }
}

/// New position after the half-open range `[at, at + count)` was removed.
pub(crate) fn shifted_on_remove(
    index: usize,
    at: usize,
    count: usize,
    can_be_deleted: bool,
) -> Option<usize> {
    if index >= at + count {
        Some(index - count)
    } else if index >= at {
        if can_be_deleted {
            None
        } else {
            Some(at)
        }
    } else {
        Some(index)
    }
}

impl DocState {
    pub(crate) fn register_reference(
        &mut self,
        owner: ObjectId,
        index: usize,
        can_be_deleted: bool,
    ) -> Result<RefId> {
        let len = self.positional_len(owner)?;
        if index > len {
            return Err(DocError::IndexOutOfRange { index, len });
        }
        let id = RefId(self.next_reference);
        self.next_reference += 1;
        self.references.insert(
            id,
            ReferenceSlot {
                owner,
                index: Some(index),
                can_be_deleted,
                target: EventTarget::default(),
            },
        );
        self.slot_mut(owner)?.references.insert(id);
        Ok(id)
    }

    pub(crate) fn release_reference(&mut self, id: RefId) -> Result<()> {
        let slot = self
            .references
            .remove(&id)
            .ok_or(DocError::UnknownReference(id))?;
        self.slot_mut(slot.owner)?.references.shift_remove(&id);
        Ok(())
    }

    pub(crate) fn reference(&self, id: RefId) -> Result<&ReferenceSlot> {
        self.references.get(&id).ok_or(DocError::UnknownReference(id))
    }

    pub(crate) fn reference_mut(&mut self, id: RefId) -> Result<&mut ReferenceSlot> {
        self.references
            .get_mut(&id)
            .ok_or(DocError::UnknownReference(id))
    }

    pub(crate) fn shift_inserted(
        &mut self,
        owner: ObjectId,
        at: usize,
        count: usize,
    ) -> Vec<ReferenceShifted> {
        self.shift_references(owner, |index, _| Some(shifted_on_insert(index, at, count)))
    }

    pub(crate) fn shift_removed(
        &mut self,
        owner: ObjectId,
        at: usize,
        count: usize,
    ) -> Vec<ReferenceShifted> {
        self.shift_references(owner, |index, can_be_deleted| {
            shifted_on_remove(index, at, count, can_be_deleted)
        })
    }

    fn shift_references<F>(&mut self, owner: ObjectId, rule: F) -> Vec<ReferenceShifted>
    where
        F: Fn(usize, bool) -> Option<usize>,
    {
        let ids: Vec<RefId> = match self.slot(owner) {
            Ok(slot) => slot.references.iter().copied().collect(),
            Err(_) => return Vec::new(),
        };
        let mut shifts = Vec::new();
        for id in ids {
            let Some(slot) = self.references.get_mut(&id) else {
                continue;
            };
            let Some(index) = slot.index else {
                continue;
            };
            let next = rule(index, slot.can_be_deleted);
            if next != slot.index {
                slot.index = next;
                shifts.push(ReferenceShifted {
                    reference: id,
                    old_index: Some(index),
                    new_index: next,
                });
            }
        }
        shifts
    }
}

/// A registered anchor. Cheap to clone; all clones address the same anchor.
#[derive(Clone)]
pub struct IndexReference {
    doc: Weak<DocShared>,
    id: RefId,
    owner: ObjectId,
}

impl IndexReference {
    pub(crate) fn new(doc: Weak<DocShared>, id: RefId, owner: ObjectId) -> Self {
        Self { doc, id, owner }
    }

    fn shared(&self) -> Result<Rc<DocShared>> {
        DocShared::upgrade(&self.doc)
    }

    pub fn id(&self) -> RefId {
        self.id
    }

    /// The container this reference points into.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Current position, `None` once the anchor has been deleted.
    pub fn index(&self) -> Result<Option<usize>> {
        let shared = self.shared()?;
        let state = shared.state.borrow();
        Ok(state.reference(self.id)?.index)
    }

    pub fn can_be_deleted(&self) -> Result<bool> {
        let shared = self.shared()?;
        let state = shared.state.borrow();
        Ok(state.reference(self.id)?.can_be_deleted)
    }

    pub fn is_valid(&self) -> Result<bool> {
        Ok(self.index()?.is_some())
    }

    /// Stops tracking. Later accesses fail with `UnknownReference`.
    pub fn release(&self) -> Result<()> {
        let shared = self.shared()?;
        let mut state = shared.state.borrow_mut();
        state.release_reference(self.id)
    }

    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        let shared = self.shared()?;
        let mut state = shared.state.borrow_mut();
        state.add_listener(TargetKey::Reference(self.id), kind, Rc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let shared = self.shared()?;
        let mut state = shared.state.borrow_mut();
        state.remove_listener(TargetKey::Reference(self.id), id)
    }
}

impl PartialEq for IndexReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.doc, &other.doc)
    }
}

impl fmt::Debug for IndexReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexReference")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_shifts_at_or_after_position() {
        assert_eq!(shifted_on_insert(5, 2, 1), 6);
        assert_eq!(shifted_on_insert(5, 5, 3), 8);
        assert_eq!(shifted_on_insert(5, 6, 3), 5);
    }

    #[test]
    fn remove_shifts_right_side_only() {
        assert_eq!(shifted_on_remove(5, 0, 2, false), Some(3));
        assert_eq!(shifted_on_remove(5, 6, 2, true), Some(5));
    }

    #[test]
    fn remove_collapses_or_invalidates_inside_range() {
        assert_eq!(shifted_on_remove(3, 2, 2, false), Some(2));
        assert_eq!(shifted_on_remove(5, 4, 2, true), None);
        assert_eq!(shifted_on_remove(4, 4, 2, true), None);
    }

    #[test]
    fn one_past_range_end_only_shifts() {
        assert_eq!(shifted_on_remove(6, 4, 2, true), Some(4));
    }
}
