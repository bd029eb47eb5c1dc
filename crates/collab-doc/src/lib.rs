//! collab-doc: local collaborative document engine.
//!
//! A [`Document`] holds a graph of map, list and text containers. Every change
//! is described by an invertible [`MutationEvent`], dispatched to listeners
//! on the changed container, summarized as an [`ObjectChanged`] that bubbles
//! to every container holding it, and recorded for undo/redo. Lists and texts
//! carry [`IndexReference`] anchors that follow their position through edits.
//!
//! ```
//! use collab_doc::{Document, Value};
//!
//! let doc = Document::new();
//! let root = doc.root()?;
//! let title = doc.create_text_with("Hello")?;
//! root.set("title", title.clone())?;
//! title.set_text("Hello, world")?;
//! assert_eq!(doc.to_json()?, serde_json::json!({"title": "Hello, world"}));
//!
//! doc.undo()?;
//! assert_eq!(title.text()?, "Hello");
//! assert_eq!(root.get("title")?, Some(Value::from(title)));
//! # Ok::<(), collab_doc::DocError>(())
//! ```

pub mod containers;
pub mod diff;
pub mod document;
pub mod error;
pub mod event;
pub mod export;
pub mod reference;
pub mod target;
pub mod value;

pub use containers::{ListRef, MapRef, TextRef};
pub use document::{Document, DocumentOptions, OperationRecord, ROOT_ID};
pub use error::{DocError, Result};
pub use event::{
    Event, EventKind, MutationEvent, ObjectChanged, ReferenceShifted, UndoRedoStateChanged,
};
pub use export::Export;
pub use reference::{IndexReference, RefId};
pub use target::{Listener, ListenerId};
pub use value::{ObjectId, ObjectKind, Value};
