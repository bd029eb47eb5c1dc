use std::collections::HashSet;
use std::rc::Rc;

use crate::containers::{checked_range, Handle};
use crate::diff::str::{diff, TextEditKind};
use crate::document::execute;
use crate::error::{DocError, Result};
use crate::event::{Event, EventKind, MutationEvent};
use crate::reference::IndexReference;
use crate::target::ListenerId;
use crate::value::ObjectId;

/// Handle to a text container.
///
/// Positions and lengths count Unicode scalar values (`char`s), not bytes.
#[derive(Clone, PartialEq)]
pub struct TextRef(pub(crate) Handle);

impl TextRef {
    pub fn id(&self) -> ObjectId {
        self.0.id()
    }

    pub fn text(&self) -> Result<String> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.text(self.id())?.to_string())
    }

    pub fn len(&self) -> Result<usize> {
        let shared = self.0.shared()?;
        let state = shared.state.borrow();
        Ok(state.text(self.id())?.chars().count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn append(&self, text: &str) -> Result<()> {
        let len = self.len()?;
        self.insert_str(len, text)
    }

    pub fn insert_str(&self, index: usize, text: &str) -> Result<()> {
        let len = self.len()?;
        if index > len {
            return Err(DocError::IndexOutOfRange { index, len });
        }
        if text.is_empty() {
            return Ok(());
        }
        let shared = self.0.shared()?;
        execute(
            &shared,
            vec![MutationEvent::TextInserted {
                target: self.id(),
                index,
                text: text.to_string(),
            }],
        )
    }

    /// Removes the half-open char range `start..end` and returns it.
    pub fn remove_range(&self, start: usize, end: usize) -> Result<String> {
        let shared = self.0.shared()?;
        let removed: String = {
            let state = shared.state.borrow();
            let text = state.text(self.id())?;
            let count = checked_range(start, end, text.chars().count())?;
            text.chars().skip(start).take(count).collect()
        };
        if removed.is_empty() {
            return Ok(removed);
        }
        execute(
            &shared,
            vec![MutationEvent::TextDeleted {
                target: self.id(),
                index: start,
                text: removed.clone(),
            }],
        )?;
        Ok(removed)
    }

    /// Replaces the whole content with the minimal set of inserts and deletes,
    /// applied as one compound operation.
    pub fn set_text(&self, text: &str) -> Result<()> {
        let current = self.text()?;
        let events: Vec<MutationEvent> = diff(&current, text)
            .into_iter()
            .map(|edit| match edit.kind {
                TextEditKind::Insert => MutationEvent::TextInserted {
                    target: self.id(),
                    index: edit.index,
                    text: edit.text,
                },
                TextEditKind::Delete => MutationEvent::TextDeleted {
                    target: self.id(),
                    index: edit.index,
                    text: edit.text,
                },
            })
            .collect();
        let shared = self.0.shared()?;
        execute(&shared, events)
    }

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

impl std::fmt::Debug for TextRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TextRef({:?})", self.0)
    }
}
