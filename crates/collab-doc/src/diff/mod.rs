//! Sequence diff utilities.

pub mod str;
