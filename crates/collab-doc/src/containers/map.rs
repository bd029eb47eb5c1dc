use std::collections::HashSet;

use crate::containers::Handle;
use crate::document::execute;
use crate::error::Result;
use crate::event::{Event, EventKind, MutationEvent};
use crate::target::ListenerId;
use crate::value::{ObjectId, Value};

/// Handle to a key/value container.
///
/// Keys keep insertion order. Every write produces one `ValueChanged` event.
#[derive(Clone, PartialEq)]
pub struct MapRef(pub(crate) Handle);

impl MapRef {
    pub fn id(&self) -> ObjectId {
        self.0.id()
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.map(self.id())?.get(key).cloned())
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.map(self.id())?.contains_key(key))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.map(self.id())?.keys().cloned().collect())
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.map(self.id())?.values().cloned().collect())
    }

    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state
            .map(self.id())?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.map(self.id())?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Writes `value` under `key` and returns the value it replaced.
    ///
    /// Writing [`Value::Null`] removes the key, exactly like [`delete`].
    ///
    /// [`delete`]: MapRef::delete
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        let value = value.into();
        if value.is_null() {
            return self.delete(&key);
        }
        self.0.check_value(&value)?;
        let shared = self.0.shared()?;
        let old_value = shared.state.borrow().map(self.id())?.get(&key).cloned();
        execute(
            &shared,
            vec![MutationEvent::ValueChanged {
                target: self.id(),
                key,
                new_value: Some(value),
                old_value: old_value.clone(),
                index: None,
            }],
        )?;
        Ok(old_value)
    }

    /// Removes `key`. Absent keys produce no event.
    pub fn delete(&self, key: &str) -> Result<Option<Value>> {
        let shared = self.0.shared()?;
        let old_value = shared.state.borrow().map(self.id())?.get(key).cloned();
        if old_value.is_none() {
            return Ok(None);
        }
        execute(
            &shared,
            vec![MutationEvent::ValueChanged {
                target: self.id(),
                key: key.to_string(),
                new_value: None,
                old_value: old_value.clone(),
                index: None,
            }],
        )?;
        Ok(old_value)
    }

    /// Removes every key as one compound operation.
    pub fn clear(&self) -> Result<()> {
        let shared = self.0.shared()?;
        let events: Vec<MutationEvent> = shared
            .state
            .borrow()
            .map(self.id())?
            .iter()
            .map(|(key, value)| MutationEvent::ValueChanged {
                target: self.id(),
                key: key.clone(),
                new_value: None,
                old_value: Some(value.clone()),
                index: None,
            })
            .collect();
        execute(&shared, events)
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

    /// Containers currently holding this map.
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

impl std::fmt::Debug for MapRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MapRef({:?})", self.0)
    }
}
