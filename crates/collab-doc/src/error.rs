//! Error type shared by every document, container and reference operation.

use thiserror::Error;

use crate::reference::RefId;
use crate::value::{ObjectId, ObjectKind};

/// Usage errors raised synchronously at the call site.
///
/// None of these leave the document half-mutated: every mutator validates its
/// arguments before building events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocError {
    #[error("document is closed")]
    DocumentClosed,
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("range {start}..{end} out of bounds for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
    #[error("no object with id {0}")]
    UnknownObject(ObjectId),
    #[error("object {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },
    #[error("object {0} belongs to another document")]
    ForeignObject(ObjectId),
    #[error("index reference {0} is not registered")]
    UnknownReference(RefId),
    #[error("invalid export data: {0}")]
    InvalidExport(String),
}

pub type Result<T, E = DocError> = std::result::Result<T, E>;
