use std::collections::HashSet;
use std::rc::Rc;

use crate::containers::{checked_range, Handle};
use crate::document::execute;
use crate::error::{DocError, Result};
use crate::event::{Event, EventKind, MutationEvent};
use crate::reference::IndexReference;
use crate::target::ListenerId;
use crate::value::{ObjectId, Value};

/// Handle to an ordered sequence container.
#[derive(Clone, PartialEq)]
pub struct ListRef(pub(crate) Handle);

impl ListRef {
    pub fn id(&self) -> ObjectId {
        self.0.id()
    }

    pub fn get(&self, index: usize) -> Result<Option<Value>> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.list(self.id())?.get(index).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.list(self.id())?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of the current items.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.list(self.id())?.clone())
    }

    pub fn index_of(&self, value: &Value) -> Result<Option<usize>> {
        self.index_of_by(value, |a, b| a == b)
    }

    pub fn last_index_of(&self, value: &Value) -> Result<Option<usize>> {
        self.last_index_of_by(value, |a, b| a == b)
    }

    /// First position whose item `eq` considers equal to `value`.
    ///
    /// The comparator runs on a snapshot, so it may read the document.
    pub fn index_of_by<F>(&self, value: &Value, eq: F) -> Result<Option<usize>>
    where
        F: Fn(&Value, &Value) -> bool,
    {
        Ok(self.to_vec()?.iter().position(|item| eq(item, value)))
    }

    pub fn last_index_of_by<F>(&self, value: &Value, eq: F) -> Result<Option<usize>>
    where
        F: Fn(&Value, &Value) -> bool,
    {
        Ok(self.to_vec()?.iter().rposition(|item| eq(item, value)))
    }

    /// Overwrites the item at `index` and returns the previous item.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        self.0.check_value(&value)?;
        let shared = self.0.shared()?;
        let old = {
            let state = shared.state.borrow();
            let list = state.list(self.id())?;
            list.get(index).cloned().ok_or(DocError::IndexOutOfRange {
                index,
                len: list.len(),
            })?
        };
        execute(
            &shared,
            vec![MutationEvent::ValuesSet {
                target: self.id(),
                index,
                values: vec![value],
                old_values: vec![old.clone()],
            }],
        )?;
        Ok(old)
    }

    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.insert_all(index, [value.into()])
    }

    pub fn insert_all<I, V>(&self, index: usize, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        for value in &values {
            self.0.check_value(value)?;
        }
        let len = self.len()?;
        if index > len {
            return Err(DocError::IndexOutOfRange { index, len });
        }
        if values.is_empty() {
            return Ok(());
        }
        let shared = self.0.shared()?;
        execute(
            &shared,
            vec![MutationEvent::ValuesAdded {
                target: self.id(),
                index,
                values,
            }],
        )
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        self.push_all([value.into()])
    }

    pub fn push_all<I, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let len = self.len()?;
        self.insert_all(len, values)
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let len = self.len()?;
        if index >= len {
            return Err(DocError::IndexOutOfRange { index, len });
        }
        let mut removed = self.remove_range(index, index + 1)?;
        removed.pop().ok_or(DocError::IndexOutOfRange { index, len })
    }

    /// Removes the half-open range `start..end`.
    pub fn remove_range(&self, start: usize, end: usize) -> Result<Vec<Value>> {
        let shared = self.0.shared()?;
        let values = {
            let state = shared.state.borrow();
            let list = state.list(self.id())?;
            checked_range(start, end, list.len())?;
            list[start..end].to_vec()
        };
        if values.is_empty() {
            return Ok(values);
        }
        execute(
            &shared,
            vec![MutationEvent::ValuesRemoved {
                target: self.id(),
                index: start,
                values: values.clone(),
            }],
        )?;
        Ok(values)
    }

    /// Removes the first occurrence of `value`. Returns whether one was found.
    pub fn remove_value(&self, value: &Value) -> Result<bool> {
        match self.index_of(value)? {
            Some(index) => {
                self.remove(index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn clear(&self) -> Result<()> {
        let len = self.len()?;
        self.remove_range(0, len).map(|_| ())
    }

    /// Anchors a position that follows later inserts and deletes.
    pub fn register_reference(&self, index: usize, can_be_deleted: bool) -> Result<IndexReference> {
        let shared = self.0.shared()?;
        let id = shared
            .state
            .borrow_mut()
            .register_reference(self.id(), index, can_be_deleted)?;
        Ok(IndexReference::new(Rc::downgrade(&shared), id, self.id()))
    }

    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        self.0.add_listener(kind, listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        self.0.remove_listener(id)
    }

    pub fn parents(&self) -> Result<Vec<ObjectId>> {
        self.0.parents()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.0.to_json()
    }

    pub(crate) fn export_with(&self, visited: &mut HashSet<ObjectId>) -> Result<serde_json::Value> {
        self.0.export(visited)
    }
}

impl std::fmt::Debug for ListRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ListRef({:?})", self.0)
    }
}
