#![deny(warnings)]

//! Persistence layer: session-scoped draft storage for the wizard.
//!
//! A [`SessionMedium`] is any string key/value store living as long as one
//! browsing session; [`DraftStore`] namespaces keys under a fixed prefix and
//! stores JSON-serialized slots on top of it.

mod draft;
mod medium;

pub use draft::{DraftStore, DEFAULT_PREFIX};
pub use medium::{FileMedium, MemoryMedium, SessionMedium};

use thiserror::Error;

/// Errors raised while writing to a session medium.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
