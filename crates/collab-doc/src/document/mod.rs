//! The document: container arena, event dispatch and undo/redo.
//!
//! # Overview
//!
//! A [`Document`] owns every container it creates. Handles ([`MapRef`],
//! [`ListRef`], [`TextRef`], [`IndexReference`](crate::IndexReference)) only hold a weak pointer
//! back to it, so closing or dropping the document turns every later access
//! into [`DocError::DocumentClosed`].
//!
//! All mutations funnel through one path:
//!
//! 1. a container method validates its arguments and builds the
//!    [`MutationEvent`]s describing the change,
//! 2. `execute` opens a compound operation and applies the events one by
//!    one, dispatching each to the target's listeners right after it landed
//!    in storage,
//! 3. closing the outermost compound operation dispatches one
//!    [`ObjectChanged`] per touched container (bubbling to every ancestor)
//!    and commits the recorded events as one undo step.
//!
//! Undo and redo replay a record through the same apply path with recording
//! switched off.

mod history;
mod import;
mod options;
mod state;

pub use history::OperationRecord;
pub use options::DocumentOptions;

pub(crate) use state::{DocState, Storage};

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::containers::{check_owned, object_value, Handle, ListRef, MapRef, TextRef};
use crate::error::{DocError, Result};
use crate::event::{Event, EventKind, MutationEvent, ObjectChanged, UndoRedoStateChanged};
use crate::target::{ListenerId, TargetKey};
use crate::value::{ObjectId, ObjectKind, Value};

use history::Mode;

/// Id of the root map of every document.
pub const ROOT_ID: ObjectId = ObjectId(0);

// ── Shared state ──────────────────────────────────────────────────────────

pub(crate) struct DocShared {
    closed: Cell<bool>,
    pub(crate) state: RefCell<DocState>,
}

impl DocShared {
    /// Resolves a handle's back pointer, failing once the document is gone.
    pub(crate) fn upgrade(doc: &Weak<DocShared>) -> Result<Rc<DocShared>> {
        match doc.upgrade() {
            Some(shared) if !shared.closed.get() => Ok(shared),
            _ => Err(DocError::DocumentClosed),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(DocError::DocumentClosed);
        }
        Ok(())
    }
}

// ── Mutation pipeline ─────────────────────────────────────────────────────

/// Applies `events` as one compound operation.
///
/// There is no rollback: if an event fails, the ones before it stay applied
/// and recorded, and the error is returned once the operation is closed.
pub(crate) fn execute(shared: &Rc<DocShared>, events: Vec<MutationEvent>) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    begin(shared)?;
    let mut outcome = Ok(());
    for event in events {
        if let Err(err) = apply_event(shared, event) {
            outcome = Err(err);
            break;
        }
    }
    end(shared);
    outcome
}

/// Applies one event and dispatches it. Returns the event as applied, with
/// any positions storage filled in.
fn apply_event(shared: &DocShared, mut event: MutationEvent) -> Result<MutationEvent> {
    shared.ensure_open()?;
    let shifts = {
        let mut state = shared.state.borrow_mut();
        let shifts = state.apply(&mut event)?;
        state.history.observe(&event);
        shifts
    };
    dispatch(
        shared,
        TargetKey::Object(event.target()),
        &Event::Mutation(event.clone()),
    );
    for shift in shifts {
        dispatch(
            shared,
            TargetKey::Reference(shift.reference),
            &Event::ReferenceShifted(shift),
        );
    }
    Ok(event)
}

fn begin(shared: &DocShared) -> Result<()> {
    shared.ensure_open()?;
    shared.state.borrow_mut().history.begin();
    Ok(())
}

/// Closes one compound-operation level. The outermost close announces the
/// changes and commits the record.
fn end(shared: &DocShared) {
    if shared.closed.get() {
        return;
    }
    let depth = shared.state.borrow().history.depth();
    match depth {
        0 => {
            warn!("end_compound_operation without a matching begin");
            return;
        }
        1 => {}
        _ => {
            shared.state.borrow_mut().history.leave();
            return;
        }
    }
    // Listeners may mutate while the scope is still open; their events join
    // this operation and get announced in the next round.
    loop {
        if shared.closed.get() {
            return;
        }
        let pending = shared.state.borrow_mut().history.take_unnotified();
        if pending.is_empty() {
            break;
        }
        for changed in aggregate(pending) {
            dispatch_object_changed(shared, changed);
        }
    }
    let flipped = {
        let mut state = shared.state.borrow_mut();
        state.history.leave();
        state.history.commit()
    };
    if let Some(flags) = flipped {
        dispatch(shared, TargetKey::Document, &Event::UndoRedoStateChanged(flags));
    }
}

/// Groups events by target, in order of first appearance.
fn aggregate(events: Vec<MutationEvent>) -> Vec<ObjectChanged> {
    let mut buckets: IndexMap<ObjectId, Vec<MutationEvent>> = IndexMap::new();
    for event in events {
        buckets.entry(event.target()).or_default().push(event);
    }
    buckets
        .into_iter()
        .map(|(target, events)| ObjectChanged { target, events })
        .collect()
}

fn dispatch(shared: &DocShared, key: TargetKey, event: &Event) {
    let listeners = shared.state.borrow().listeners_for(key, event.kind());
    for listener in listeners {
        listener(event);
    }
}

/// Dispatches on the origin, then once on every ancestor.
fn dispatch_object_changed(shared: &DocShared, changed: ObjectChanged) {
    let origin = changed.target;
    let ancestors = shared.state.borrow().ancestors(origin);
    let event = Event::ObjectChanged(changed);
    dispatch(shared, TargetKey::Object(origin), &event);
    for ancestor in ancestors {
        dispatch(shared, TargetKey::Object(ancestor), &event);
    }
}

/// Inverts `events` back to front and applies the inverses without
/// recording them. Returns what was actually applied, in application order.
fn replay(shared: &DocShared, events: Vec<MutationEvent>) -> (Vec<MutationEvent>, Result<()>) {
    let previous = shared.state.borrow_mut().history.set_mode(Mode::Replaying);
    let mut applied = Vec::with_capacity(events.len());
    let mut outcome = begin(shared);
    if outcome.is_ok() {
        for mut event in events.into_iter().rev() {
            let step = {
                let state = shared.state.borrow();
                event.refresh(&state).map(|()| event.inverse())
            };
            match step.and_then(|inverse| apply_event(shared, inverse)) {
                Ok(inverse) => applied.push(inverse),
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        end(shared);
    }
    shared.state.borrow_mut().history.set_mode(previous);
    (applied, outcome)
}

// ── Document ──────────────────────────────────────────────────────────────

/// A local collaborative document.
///
/// Cloning yields another owner of the same document.
#[derive(Clone)]
pub struct Document {
    shared: Rc<DocShared>,
    options: DocumentOptions,
}

impl Document {
    pub fn new() -> Self {
        Self::with_options(DocumentOptions::default())
    }

    pub fn with_options(options: DocumentOptions) -> Self {
        let state = DocState::with_root(options.history_limit);
        Self {
            shared: Rc::new(DocShared {
                closed: Cell::new(false),
                state: RefCell::new(state),
            }),
            options,
        }
    }

    /// Creates a document and seeds it with `init`. Edits made by `init` are
    /// dispatched as usual but never enter the undo history.
    pub fn with_initializer<F>(options: DocumentOptions, init: F) -> Result<Self>
    where
        F: FnOnce(&Document) -> Result<()>,
    {
        let doc = Self::with_options(options);
        doc.initialize(init)?;
        Ok(doc)
    }

    fn initialize<F>(&self, init: F) -> Result<()>
    where
        F: FnOnce(&Document) -> Result<()>,
    {
        let previous = self
            .shared
            .state
            .borrow_mut()
            .history
            .set_mode(Mode::Initializing);
        let outcome = begin(&self.shared).and_then(|()| {
            let outcome = init(self);
            end(&self.shared);
            outcome
        });
        self.shared.state.borrow_mut().history.set_mode(previous);
        outcome
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    fn open(&self) -> Result<&Rc<DocShared>> {
        self.shared.ensure_open()?;
        Ok(&self.shared)
    }

    fn weak(&self) -> Weak<DocShared> {
        Rc::downgrade(&self.shared)
    }

    pub fn root(&self) -> Result<MapRef> {
        self.map(ROOT_ID)
    }

    pub fn create_map(&self) -> Result<MapRef> {
        self.create_map_with(Vec::<(String, Value)>::new())
    }

    /// Creates a map holding `entries`. Initial entries are not events.
    pub fn create_map_with<I, K, V>(&self, entries: I) -> Result<MapRef>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut entries: IndexMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        entries.retain(|_, value| !value.is_null());
        let id = self.create(Storage::Map(entries))?;
        self.map(id)
    }

    pub fn create_list(&self) -> Result<ListRef> {
        self.create_list_with(Vec::<Value>::new())
    }

    /// Creates a list holding `values`. Initial values are not events.
    pub fn create_list_with<I, V>(&self, values: I) -> Result<ListRef>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let id = self.create(Storage::List(values))?;
        self.list(id)
    }

    pub fn create_text(&self) -> Result<TextRef> {
        self.create_text_with("")
    }

    pub fn create_text_with(&self, text: &str) -> Result<TextRef> {
        let id = self.create(Storage::Text(text.to_string()))?;
        self.text(id)
    }

    fn create(&self, storage: Storage) -> Result<ObjectId> {
        let shared = self.open()?;
        let weak = self.weak();
        match &storage {
            Storage::Map(map) => map.values().try_for_each(|v| check_owned(&weak, v))?,
            Storage::List(list) => list.iter().try_for_each(|v| check_owned(&weak, v))?,
            Storage::Text(_) => {}
        }
        let id = shared.state.borrow_mut().create(storage)?;
        debug!(id = %id, "created container");
        Ok(id)
    }

    pub fn map(&self, id: ObjectId) -> Result<MapRef> {
        self.check_kind(id, ObjectKind::Map)?;
        Ok(MapRef(Handle::new(self.weak(), id)))
    }

    pub fn list(&self, id: ObjectId) -> Result<ListRef> {
        self.check_kind(id, ObjectKind::List)?;
        Ok(ListRef(Handle::new(self.weak(), id)))
    }

    pub fn text(&self, id: ObjectId) -> Result<TextRef> {
        self.check_kind(id, ObjectKind::Text)?;
        Ok(TextRef(Handle::new(self.weak(), id)))
    }

    /// Looks a container up by id, whatever its kind.
    pub fn object(&self, id: ObjectId) -> Result<Value> {
        let shared = self.open()?;
        let kind = shared.state.borrow().kind(id)?;
        Ok(object_value(self.weak(), id, kind))
    }

    fn check_kind(&self, id: ObjectId, expected: ObjectKind) -> Result<()> {
        let shared = self.open()?;
        let actual = shared.state.borrow().kind(id)?;
        if actual != expected {
            return Err(DocError::WrongKind {
                id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn begin_compound_operation(&self) -> Result<()> {
        begin(self.open()?)
    }

    /// Closes the innermost compound operation. Unmatched calls are ignored.
    pub fn end_compound_operation(&self) -> Result<()> {
        end(self.open()?);
        Ok(())
    }

    /// Runs `f` inside one compound operation; the scope is closed even when
    /// `f` fails.
    pub fn compound<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.begin_compound_operation()?;
        let outcome = f();
        end(&self.shared);
        outcome
    }

    pub fn can_undo(&self) -> Result<bool> {
        let shared = self.open()?;
        let can_undo = shared.state.borrow().history.can_undo();
        Ok(can_undo)
    }

    pub fn can_redo(&self) -> Result<bool> {
        let shared = self.open()?;
        let can_redo = shared.state.borrow().history.can_redo();
        Ok(can_redo)
    }

    /// Reverts the most recent record. Returns `false` when there was
    /// nothing to undo.
    pub fn undo(&self) -> Result<bool> {
        let shared = self.open()?;
        let (before, position, events) = {
            let mut state = shared.state.borrow_mut();
            if state.history.depth() > 0 {
                warn!("undo requested inside an open compound operation");
                return Ok(false);
            }
            let before = state.history.flags();
            match state.history.start_undo() {
                Some((position, events)) => (before, position, events),
                None => return Ok(false),
            }
        };
        debug!(position, events = events.len(), "undo");
        let (applied, outcome) = replay(shared, events);
        let after = {
            let mut state = shared.state.borrow_mut();
            state.history.store(position, applied);
            state.history.flags()
        };
        self.notify_flags(before, after);
        outcome.map(|()| true)
    }

    /// Re-applies the most recently undone record. Returns `false` when there
    /// was nothing to redo.
    pub fn redo(&self) -> Result<bool> {
        let shared = self.open()?;
        let (before, position, events) = {
            let mut state = shared.state.borrow_mut();
            if state.history.depth() > 0 {
                warn!("redo requested inside an open compound operation");
                return Ok(false);
            }
            let before = state.history.flags();
            match state.history.start_redo() {
                Some((position, events)) => (before, position, events),
                None => return Ok(false),
            }
        };
        debug!(position, events = events.len(), "redo");
        let (applied, outcome) = replay(shared, events);
        let after = {
            let mut state = shared.state.borrow_mut();
            state.history.store(position, applied);
            state.history.finish_redo();
            state.history.flags()
        };
        self.notify_flags(before, after);
        outcome.map(|()| true)
    }

    fn notify_flags(&self, before: UndoRedoStateChanged, after: UndoRedoStateChanged) {
        if before != after {
            dispatch(
                &self.shared,
                TargetKey::Document,
                &Event::UndoRedoStateChanged(after),
            );
        }
    }

    /// Number of retained records, undone ones included.
    pub fn history_len(&self) -> Result<usize> {
        let shared = self.open()?;
        let len = shared.state.borrow().history.len();
        Ok(len)
    }

    pub fn records(&self) -> Result<Vec<OperationRecord>> {
        let shared = self.open()?;
        let records = shared.state.borrow().history.records().to_vec();
        Ok(records)
    }

    /// Forgets every record.
    pub fn clear_history(&self) -> Result<()> {
        let shared = self.open()?;
        let (before, after) = {
            let mut state = shared.state.borrow_mut();
            let before = state.history.flags();
            state.history.clear();
            (before, state.history.flags())
        };
        debug!("history cleared");
        self.notify_flags(before, after);
        Ok(())
    }

    /// Registers a document-level listener. Only `UndoRedoStateChanged` is
    /// dispatched here.
    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        let shared = self.open()?;
        let mut state = shared.state.borrow_mut();
        state.add_listener(TargetKey::Document, kind, Rc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let shared = self.open()?;
        let mut state = shared.state.borrow_mut();
        state.remove_listener(TargetKey::Document, id)
    }

    /// Releases all storage. Every later access through this document or any
    /// of its handles fails with `DocumentClosed`.
    pub fn close(&self) {
        if self.shared.closed.replace(true) {
            return;
        }
        debug!("closing document");
        self.shared.state.borrow_mut().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    /// Plain JSON view of the root map.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.root()?.to_json()
    }

    /// Serializes the whole document, sharing repeated containers through
    /// `$ref` back-references.
    pub fn export(&self) -> Result<serde_json::Value> {
        self.root()?.export_with(&mut HashSet::new())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("closed", &self.shared.closed.get())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<Event>>>, impl Fn(&Event) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |event: &Event| sink.borrow_mut().push(event.clone()))
    }

    #[test]
    fn root_is_an_empty_map() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        assert_eq!(root.id(), ROOT_ID);
        assert!(root.is_empty().unwrap());
    }

    #[test]
    fn lookup_by_id_checks_kind() {
        let doc = Document::new();
        let list = doc.create_list().unwrap();
        assert_eq!(doc.list(list.id()).unwrap(), list);
        assert_eq!(
            doc.text(list.id()).unwrap_err(),
            DocError::WrongKind {
                id: list.id(),
                expected: ObjectKind::Text,
                actual: ObjectKind::List
            }
        );
        assert_eq!(
            doc.map(ObjectId(99)).unwrap_err(),
            DocError::UnknownObject(ObjectId(99))
        );
    }

    #[test]
    fn compound_operation_is_one_record() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        doc.compound(|| {
            root.set("a", 1)?;
            root.set("b", 2)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(doc.history_len().unwrap(), 1);
        assert!(doc.undo().unwrap());
        assert!(root.is_empty().unwrap());
    }

    #[test]
    fn object_changed_fires_once_per_target_at_outermost_end() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        let (seen, listener) = recorder();
        root.add_listener(EventKind::ObjectChanged, listener).unwrap();
        doc.begin_compound_operation().unwrap();
        root.set("a", 1).unwrap();
        root.set("b", 2).unwrap();
        assert!(seen.borrow().is_empty());
        doc.end_compound_operation().unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_object_changed().unwrap().events.len(), 2);
    }

    #[test]
    fn unmatched_end_is_ignored() {
        let doc = Document::new();
        doc.end_compound_operation().unwrap();
        doc.root().unwrap().set("a", 1).unwrap();
        assert_eq!(doc.history_len().unwrap(), 1);
    }

    #[test]
    fn undo_inside_open_operation_is_a_no_op() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        root.set("a", 1).unwrap();
        doc.begin_compound_operation().unwrap();
        assert!(!doc.undo().unwrap());
        doc.end_compound_operation().unwrap();
        assert_eq!(root.get("a").unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn initializer_edits_are_not_undoable() {
        let doc = Document::with_initializer(DocumentOptions::default(), |doc| {
            doc.root()?.set("seed", true)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(doc.root().unwrap().get("seed").unwrap(), Some(Value::Bool(true)));
        assert!(!doc.can_undo().unwrap());
    }

    #[test]
    fn clear_history_drops_records() {
        let doc = Document::new();
        doc.root().unwrap().set("a", 1).unwrap();
        doc.clear_history().unwrap();
        assert_eq!(doc.history_len().unwrap(), 0);
        assert!(!doc.can_undo().unwrap());
    }

    #[test]
    fn closed_document_rejects_access() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        doc.close();
        assert!(doc.is_closed());
        assert_eq!(root.get("a").unwrap_err(), DocError::DocumentClosed);
        assert_eq!(doc.undo().unwrap_err(), DocError::DocumentClosed);
    }

    #[test]
    fn dropped_document_rejects_handles() {
        let doc = Document::new();
        let root = doc.root().unwrap();
        drop(doc);
        assert_eq!(root.len().unwrap_err(), DocError::DocumentClosed);
    }

    #[test]
    fn foreign_initial_values_are_rejected() {
        let a = Document::new();
        let b = Document::new();
        let foreign = b.create_list().unwrap();
        assert_eq!(
            a.create_list_with([Value::from(foreign.clone())]).unwrap_err(),
            DocError::ForeignObject(foreign.id())
        );
    }
}
