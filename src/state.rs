//! File-backed state store
//!
//! All tracked resources live in one TOML document, grouped by resource
//! type and keyed by identifier. Every save writes the whole file through a
//! temp file and a rename, so a crash never leaves a half-written state.
//! Writes inside a batch are saved once, when the batch ends.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lifecycle::{ResourceId, ResourceRecord, StateStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

// ============================================================================
// State File
// ============================================================================

/// On-disk layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    /// Last time the state was saved
    pub last_updated: DateTime<Utc>,

    /// Records by resource type, then by identifier
    #[serde(default)]
    pub resources: BTreeMap<String, BTreeMap<String, ResourceRecord>>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: StateFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize state to TOML")?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .with_context(|| format!("Failed to write temp state file in {}", dir.display()))?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }
}

// ============================================================================
// FileStateStore
// ============================================================================

/// [`StateStore`] persisted to a TOML file
///
/// The file is read once on open; afterwards the in-memory copy is
/// authoritative. Outside a batch every mutation rewrites the whole file
/// before it is committed in memory, so N writes cost N full saves. Wrap
/// bulk work such as a refresh in [`StateStore::begin_batch`] and
/// [`StateStore::end_batch`] to save once.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    file: StateFile,
    batch_depth: usize,
    /// Changes held back by an open batch
    dirty: bool,
}

impl FileStateStore {
    /// Get the state directory path (~/.local/state/mqform)
    pub fn state_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("mqform"))
    }

    /// Open the store at the default location
    pub fn open_default() -> Result<Self> {
        Self::open(Self::state_dir()?.join("state.toml"))
    }

    /// Open the store at `path`, starting empty if the file doesn't exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = StateFile::load(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                ..Default::default()
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_updated(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.lock()?.file.last_updated)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::new("state file lock poisoned"))
    }

    /// Apply `change`; outside a batch, save a copy first and commit it
    /// only if the save succeeds
    fn mutate<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StateFile) -> bool,
    {
        let mut inner = self.lock()?;
        if inner.batch_depth > 0 {
            if change(&mut inner.file) {
                inner.file.last_updated = Utc::now();
                inner.dirty = true;
            }
            return Ok(());
        }

        let mut next = inner.file.clone();
        if !change(&mut next) {
            return Ok(());
        }
        next.last_updated = Utc::now();
        next.save(&self.path).map_err(into_store_error)?;
        inner.file = next;
        Ok(())
    }
}

fn into_store_error(err: anyhow::Error) -> StoreError {
    StoreError::new(format!("{err:#}"))
}

impl StateStore for FileStateStore {
    fn get(&self, resource_type: &str, id: &ResourceId) -> Result<Option<ResourceRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .file
            .resources
            .get(resource_type)
            .and_then(|records| records.get(&id.to_string()))
            .cloned())
    }

    fn put(&self, resource_type: &str, record: &ResourceRecord) -> Result<(), StoreError> {
        self.mutate(|state| {
            state
                .resources
                .entry(resource_type.to_string())
                .or_default()
                .insert(record.id.to_string(), record.clone());
            true
        })
    }

    fn remove(&self, resource_type: &str, id: &ResourceId) -> Result<(), StoreError> {
        self.mutate(|state| {
            let Some(records) = state.resources.get_mut(resource_type) else {
                return false;
            };
            let removed = records.remove(&id.to_string()).is_some();
            if records.is_empty() {
                state.resources.remove(resource_type);
            }
            removed
        })
    }

    fn list(&self, resource_type: &str) -> Result<Vec<ResourceId>, StoreError> {
        let inner = self.lock()?;
        let mut ids: Vec<ResourceId> = inner
            .file
            .resources
            .get(resource_type)
            .map(|records| records.values().map(|r| r.id.clone()).collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    fn begin_batch(&self) {
        match self.lock() {
            Ok(mut inner) => inner.batch_depth += 1,
            Err(e) => log::warn!("Cannot start state batch: {e}"),
        }
    }

    /// A failed save keeps the changes pending; the next save retries them
    fn end_batch(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.batch_depth = inner.batch_depth.saturating_sub(1);
        if inner.batch_depth > 0 || !inner.dirty {
            return Ok(());
        }
        inner.file.save(&self.path).map_err(into_store_error)?;
        inner.dirty = false;
        Ok(())
    }
}
