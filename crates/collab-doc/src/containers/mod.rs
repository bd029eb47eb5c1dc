//! Container handles.
//!
//! [`MapRef`], [`ListRef`] and [`TextRef`] are thin, clonable handles: a weak
//! pointer to the owning document plus the container's [`ObjectId`]. All state
//! lives in the document arena. Every accessor fails with
//! [`DocError::DocumentClosed`] once the document is closed or dropped.

mod list;
mod map;
mod text;

pub use list::ListRef;
pub use map::MapRef;
pub use text::TextRef;

use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::document::DocShared;
use crate::error::{DocError, Result};
use crate::event::{Event, EventKind};
use crate::target::{ListenerId, TargetKey};
use crate::value::{ObjectId, ObjectKind, Value};

#[derive(Clone)]
pub(crate) struct Handle {
    doc: Weak<DocShared>,
    id: ObjectId,
}

impl Handle {
    pub(crate) fn new(doc: Weak<DocShared>, id: ObjectId) -> Self {
        Self { doc, id }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn shared(&self) -> Result<Rc<DocShared>> {
        DocShared::upgrade(&self.doc)
    }

    /// Rejects container values that live in a different document.
    pub(crate) fn check_value(&self, value: &Value) -> Result<()> {
        check_owned(&self.doc, value)
    }

    pub(crate) fn add_listener<F>(&self, kind: EventKind, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        let shared = self.shared()?;
        let mut state = shared.state.borrow_mut();
        state.add_listener(TargetKey::Object(self.id), kind, Rc::new(listener))
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let shared = self.shared()?;
        let mut state = shared.state.borrow_mut();
        state.remove_listener(TargetKey::Object(self.id), id)
    }

    pub(crate) fn parents(&self) -> Result<Vec<ObjectId>> {
        let shared = self.shared()?;
        let state = shared.state.borrow();
        let parents = state.slot(self.id)?.target.parents().collect();
        Ok(parents)
    }

    pub(crate) fn to_json(&self) -> Result<serde_json::Value> {
        let shared = self.shared()?;
        let state = shared.state.borrow();
        state.view_object(self.id, &mut Vec::new())
    }

    pub(crate) fn export(&self, visited: &mut HashSet<ObjectId>) -> Result<serde_json::Value> {
        let shared = self.shared()?;
        let state = shared.state.borrow();
        state.export_object(self.id, visited)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.doc, &other.doc)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Value {
    pub(crate) fn handle(&self) -> Option<&Handle> {
        match self {
            Value::Map(m) => Some(&m.0),
            Value::List(l) => Some(&l.0),
            Value::Text(t) => Some(&t.0),
            _ => None,
        }
    }
}

/// Wraps a container id of the given kind into a handle value.
pub(crate) fn object_value(doc: Weak<DocShared>, id: ObjectId, kind: ObjectKind) -> Value {
    let handle = Handle::new(doc, id);
    match kind {
        ObjectKind::Map => Value::Map(MapRef(handle)),
        ObjectKind::List => Value::List(ListRef(handle)),
        ObjectKind::Text => Value::Text(TextRef(handle)),
    }
}

/// Fails with `ForeignObject` when `value` is a container of another document.
pub(crate) fn check_owned(doc: &Weak<DocShared>, value: &Value) -> Result<()> {
    match value.handle() {
        Some(other) if !Weak::ptr_eq(doc, &other.doc) => Err(DocError::ForeignObject(other.id)),
        _ => Ok(()),
    }
}

/// Converts a half-open range over `len` items into a validated count.
pub(crate) fn checked_range(start: usize, end: usize, len: usize) -> Result<usize> {
    if start > end || end > len {
        return Err(DocError::InvalidRange { start, end, len });
    }
    Ok(end - start)
}
