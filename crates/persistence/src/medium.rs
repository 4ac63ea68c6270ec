//! Backing media for the draft store.

use crate::PersistenceError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// String key/value storage scoped to one session.
pub trait SessionMedium {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String) -> Result<(), PersistenceError>;
    fn remove_item(&mut self, key: &str) -> Result<(), PersistenceError>;
    /// Every key currently stored, including keys written by other owners.
    fn keys(&self) -> Vec<String>;
}

/// In-process medium; contents vanish with the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    items: BTreeMap<String, String>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl SessionMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

/// Medium backed by a single JSON object on disk, loaded on open and
/// rewritten after every change.
#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileMedium {
    /// Open or create the medium at `path`. A missing file starts empty; an
    /// unreadable or malformed file is discarded with a warning.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding malformed session file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session file unreadable");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), entries = items.len(), "session medium opened");
        Self { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.items)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionMedium for FileMedium {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.items.insert(key.to_string(), value);
        self.flush()
    }

    fn remove_item(&mut self, key: &str) -> Result<(), PersistenceError> {
        if self.items.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}
