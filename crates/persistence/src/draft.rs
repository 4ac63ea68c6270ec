//! Namespaced, JSON-serialized draft slots.

use crate::{PersistenceError, SessionMedium};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Key prefix of wizard drafts.
pub const DEFAULT_PREFIX: &str = "mw_draft_";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a, T> {
    saved_at: DateTime<Utc>,
    value: &'a T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    saved_at: DateTime<Utc>,
    value: T,
}

/// Draft slots stored under a fixed key prefix of a [`SessionMedium`].
///
/// Reads fail soft: a missing or undecodable slot is reported as absent.
/// Writing a slot replaces it whole; the last write wins.
#[derive(Debug, Clone)]
pub struct DraftStore<M> {
    medium: M,
    prefix: String,
}

impl<M: SessionMedium> DraftStore<M> {
    pub fn new(medium: M) -> Self {
        Self::with_prefix(medium, DEFAULT_PREFIX)
    }

    pub fn with_prefix(medium: M, prefix: impl Into<String>) -> Self {
        Self {
            medium,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.medium.get_item(&self.full_key(key))?;
        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(env) => Some(env.value),
            Err(e) => {
                debug!(key, error = %e, "ignoring undecodable draft slot");
                None
            }
        }
    }

    /// When the slot was last written, if it is present and well-formed.
    pub fn saved_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.medium.get_item(&self.full_key(key))?;
        serde_json::from_str::<Envelope<IgnoredAny>>(&raw)
            .ok()
            .map(|env| env.saved_at)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let text = serde_json::to_string(&EnvelopeRef {
            saved_at: Utc::now(),
            value,
        })?;
        self.medium.set_item(&self.full_key(key), text)?;
        debug!(key, "draft slot saved");
        Ok(())
    }

    pub fn clear(&mut self, key: &str) -> Result<(), PersistenceError> {
        let full = self.full_key(key);
        self.medium.remove_item(&full)
    }

    /// Remove every slot under this store's prefix; other keys are untouched.
    /// Returns the number of slots removed.
    pub fn clear_all(&mut self) -> Result<usize, PersistenceError> {
        let owned: Vec<String> = self
            .medium
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .collect();
        for k in &owned {
            self.medium.remove_item(k)?;
        }
        info!(removed = owned.len(), "draft cleared");
        Ok(owned.len())
    }

    /// Slot names currently present, without the prefix.
    pub fn keys(&self) -> Vec<String> {
        self.medium
            .keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    pub fn into_inner(self) -> M {
        self.medium
    }
}
