//! Client session storage.
//!
//! The session is a flat key-value store with last-writer-wins semantics.
//! Components receive it as an `Arc<dyn SessionStore>` so tests can swap the
//! backing store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::errors::{ClientError, ClientResult};
use crate::models::user::UserProfile;

/// Well-known session keys
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USER: &str = "user";
    pub const PERMISSION_CODES: &str = "permission_codes";
}

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;
    fn clear(&self) -> ClientResult<()>;

    fn access_token(&self) -> Option<String> {
        self.get(keys::ACCESS_TOKEN).filter(|t| !t.is_empty())
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(keys::REFRESH_TOKEN).filter(|t| !t.is_empty())
    }

    fn user(&self) -> Option<UserProfile> {
        self.get(keys::USER).and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Derived copy of the last fetched permission codes. Never authoritative.
    fn cached_permission_codes(&self) -> Option<Vec<String>> {
        self.get(keys::PERMISSION_CODES).and_then(|raw| serde_json::from_str(&raw).ok())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: &str, refresh: Option<&str>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(keys::ACCESS_TOKEN.to_string(), access.to_string());
        if let Some(refresh) = refresh {
            entries.insert(keys::REFRESH_TOKEN.to_string(), refresh.to_string());
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map(|e| e.is_empty()).unwrap_or(true)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> ClientResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClientError::session("session store lock poisoned"))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClientError::session("session store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClientError::session("session store lock poisoned"))?;
        entries.clear();
        Ok(())
    }
}

/// Session persisted as a JSON object on disk, so CLI invocations share a login.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileSessionStore {
    pub fn open(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| ClientError::session(format!("failed to read {}: {err}", path.display())))?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)
                    .map_err(|err| ClientError::session(format!("corrupt session file {}: {err}", path.display())))?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `f` to a copy, persists it, and only then swaps it in.
    fn mutate(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> ClientResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClientError::session("session store lock poisoned"))?;
        let mut next = entries.clone();
        f(&mut next);

        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn persist(&self, entries: &HashMap<String, String>) -> ClientResult<()> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)
                    .map_err(|err| ClientError::session(format!("failed to remove {}: {err}", self.path.display())))?;
            }
            return Ok(());
        }

        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw)
            .map_err(|err| ClientError::session(format!("failed to write {}: {err}", self.path.display())))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> ClientResult<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> ClientResult<()> {
        self.mutate(|entries| entries.clear())
    }
}
