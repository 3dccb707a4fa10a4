//! Durable state stores.
//!
//! Two implementations of [`BaseStateStore`]:
//! - [`MemoryStateStore`] for tests and embedding
//! - [`FileStateStore`], one JSON document on disk (the app's local storage)
//!
//! Both enforce the same rules: versions only grow, a removal leaves a
//! tombstone, and removing a key also removes every key paired with it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::BaseStateStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Version conflict on {key}: expected {expected}, found {found}")]
    VersionConflict {
        key: StateKey,
        expected: u64,
        found: u64,
    },
}

/// The closed set of durable keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    CurrentPrincipal,
    SessionExpiry,
    Registry,
    AuditLog,
    ServiceRequests,
    Notifications,
}

impl StateKey {
    pub const ALL: [StateKey; 6] = [
        StateKey::CurrentPrincipal,
        StateKey::SessionExpiry,
        StateKey::Registry,
        StateKey::AuditLog,
        StateKey::ServiceRequests,
        StateKey::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::CurrentPrincipal => "backoffice.currentPrincipal",
            StateKey::SessionExpiry => "backoffice.sessionExpiry",
            StateKey::Registry => "backoffice.registry",
            StateKey::AuditLog => "backoffice.auditLog",
            StateKey::ServiceRequests => "backoffice.serviceRequests",
            StateKey::Notifications => "backoffice.notifications",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    /// Keys that must disappear together with this one.
    ///
    /// A session expiry without a principal is meaningless, so dropping the
    /// current principal always drops the expiry in the same write.
    pub fn paired(&self) -> &'static [StateKey] {
        match self {
            StateKey::CurrentPrincipal => &[StateKey::SessionExpiry],
            _ => &[],
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value as read from the store. `value` is `None` for never-written or
/// removed keys; `version` is 0 only for never-written keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Versioned {
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    pub version: u64,
}

impl Versioned {
    /// Deserialize the value into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        match &self.value {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

/// Read a typed record and the version it was read at.
pub async fn load<T: DeserializeOwned>(
    store: &dyn BaseStateStore,
    key: StateKey,
) -> Result<(Option<T>, u64), StoreError> {
    let entry = store.get(key).await?;
    Ok((entry.decode()?, entry.version))
}

/// Write a typed record if the key is still at `expected_version`.
pub async fn save<T: Serialize>(
    store: &dyn BaseStateStore,
    key: StateKey,
    record: &T,
    expected_version: u64,
) -> Result<u64, StoreError> {
    let value = serde_json::to_value(record)?;
    store.put(key, value, Some(expected_version)).await
}

fn apply_put(
    entries: &mut HashMap<StateKey, Versioned>,
    key: StateKey,
    value: serde_json::Value,
    expected_version: Option<u64>,
) -> Result<u64, StoreError> {
    let current = entries.get(&key).map(|entry| entry.version).unwrap_or(0);
    if let Some(expected) = expected_version {
        if expected != current {
            return Err(StoreError::VersionConflict {
                key,
                expected,
                found: current,
            });
        }
    }
    let version = current + 1;
    entries.insert(
        key,
        Versioned {
            value: Some(value),
            version,
        },
    );
    Ok(version)
}

fn apply_remove(entries: &mut HashMap<StateKey, Versioned>, key: StateKey) {
    for target in std::iter::once(key).chain(key.paired().iter().copied()) {
        if let Some(entry) = entries.get_mut(&target) {
            if entry.value.is_some() {
                entry.value = None;
                entry.version += 1;
            }
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<StateKey, Versioned>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseStateStore for MemoryStateStore {
    async fn get(&self, key: StateKey) -> Result<Versioned, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&key).cloned().unwrap_or_default())
    }

    async fn put(
        &self,
        key: StateKey,
        value: serde_json::Value,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        apply_put(&mut entries, key, value, expected_version)
    }

    async fn remove(&self, key: StateKey) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        apply_remove(&mut entries, key);
        Ok(())
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// Whole-document JSON store. Every mutation rewrites the file through a
/// temp file + rename, so a crash leaves either the old or the new document.
pub struct FileStateStore {
    path: PathBuf,
    entries: RwLock<HashMap<StateKey, Versioned>>,
}

impl FileStateStore {
    /// Open (or lazily create) the state file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                let document: BTreeMap<String, Versioned> = serde_json::from_slice(&bytes)?;
                document
                    .into_iter()
                    .filter_map(|(name, entry)| match StateKey::from_name(&name) {
                        Some(key) => Some((key, entry)),
                        None => {
                            debug!(key = %name, "Ignoring unknown key in state file");
                            None
                        }
                    })
                    .collect()
            }
            Ok(_) => HashMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = entries.len(), "State file opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &HashMap<StateKey, Versioned>) -> Result<(), StoreError> {
        let document: BTreeMap<&str, &Versioned> = entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
            .collect();
        let bytes = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl BaseStateStore for FileStateStore {
    async fn get(&self, key: StateKey) -> Result<Versioned, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&key).cloned().unwrap_or_default())
    }

    async fn put(
        &self,
        key: StateKey,
        value: serde_json::Value,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        let version = apply_put(&mut next, key, value, expected_version)?;
        self.flush(&next).await?;
        *entries = next;
        Ok(version)
    }

    async fn remove(&self, key: StateKey) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        apply_remove(&mut next, key);
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }
}
