//! Resume-state stores.
//!
//! A store maps a [`Fingerprint`] to the partial uploads recorded for it.
//! The uploader consults it before creating a new remote upload and clears
//! it once an upload completes.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Fingerprint, TransferError};

/// What is needed to continue an interrupted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeState {
    /// Remote URL of the partial upload.
    pub upload_url: String,
    /// Total size of the file being uploaded.
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Lookup, insert and delete of resume state, keyed by fingerprint.
///
/// Operations on one fingerprint must never touch entries of another.
pub trait ResumeStore: Send + Sync {
    /// Returns every recorded state for `fingerprint`, oldest first.
    fn find(&self, fingerprint: &Fingerprint) -> Result<Vec<ResumeState>, TransferError>;

    /// Records `state`, replacing an entry with the same upload URL.
    fn save(&self, fingerprint: &Fingerprint, state: ResumeState) -> Result<(), TransferError>;

    /// Forgets every state recorded for `fingerprint`.
    fn remove(&self, fingerprint: &Fingerprint) -> Result<(), TransferError>;

    /// Returns the most recently created state for `fingerprint`, if any.
    fn latest(&self, fingerprint: &Fingerprint) -> Result<Option<ResumeState>, TransferError> {
        Ok(self
            .find(fingerprint)?
            .into_iter()
            .max_by_key(|s| s.created_at))
    }
}

type StateMap = BTreeMap<Fingerprint, Vec<ResumeState>>;

fn upsert(map: &mut StateMap, fingerprint: &Fingerprint, state: ResumeState) {
    let states = map.entry(fingerprint.clone()).or_default();
    states.retain(|s| s.upload_url != state.upload_url);
    states.push(state);
    states.sort_by_key(|s| s.created_at);
}

// ---------------------------------------------------------------------------
// MemoryResumeStore
// ---------------------------------------------------------------------------

/// Process-local store. State is lost when the process exits.
#[derive(Default)]
pub struct MemoryResumeStore {
    states: RwLock<StateMap>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fingerprints with recorded state.
    pub fn len(&self) -> usize {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResumeStore for MemoryResumeStore {
    fn find(&self, fingerprint: &Fingerprint) -> Result<Vec<ResumeState>, TransferError> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        Ok(states.get(fingerprint).cloned().unwrap_or_default())
    }

    fn save(&self, fingerprint: &Fingerprint, state: ResumeState) -> Result<(), TransferError> {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        upsert(&mut states, fingerprint, state);
        Ok(())
    }

    fn remove(&self, fingerprint: &Fingerprint) -> Result<(), TransferError> {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states.remove(fingerprint);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileResumeStore
// ---------------------------------------------------------------------------

/// Persistent store backed by a JSON file.
///
/// The file is the source of truth: every operation re-reads it, so several
/// processes can share one file without dropping each other's entries.
/// Changes are written to a temporary file and renamed into place.
pub struct FileResumeStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileResumeStore {
    /// Opens the store at `path`, checking that existing state is readable.
    pub fn open(path: PathBuf) -> Result<Self, TransferError> {
        let states = load_states(&path)?;
        debug!("opened resume store with {} file(s) at {:?}", states.len(), path);
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to the state on disk and writes the result back.
    fn update<F>(&self, change: F) -> Result<(), TransferError>
    where
        F: FnOnce(&mut StateMap) -> bool,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut states = load_states(&self.path)?;
        if change(&mut states) {
            self.persist(&states)?;
        }
        Ok(())
    }

    /// Atomically replaces the file with `map`. Callers hold the lock.
    fn persist(&self, map: &StateMap) -> Result<(), TransferError> {
        let json = serde_json::to_string_pretty(map)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!("persisted resume state for {} file(s) to {:?}", map.len(), self.path);
        Ok(())
    }
}

impl ResumeStore for FileResumeStore {
    fn find(&self, fingerprint: &Fingerprint) -> Result<Vec<ResumeState>, TransferError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut states = load_states(&self.path)?;
        Ok(states.remove(fingerprint).unwrap_or_default())
    }

    fn save(&self, fingerprint: &Fingerprint, state: ResumeState) -> Result<(), TransferError> {
        self.update(|states| {
            upsert(states, fingerprint, state);
            true
        })
    }

    fn remove(&self, fingerprint: &Fingerprint) -> Result<(), TransferError> {
        self.update(|states| states.remove(fingerprint).is_some())
    }
}

/// Loads resume state from a JSON file on disk.
fn load_states(path: &Path) -> Result<StateMap, TransferError> {
    if !path.exists() {
        return Ok(StateMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(StateMap::new());
    }
    let states: StateMap = serde_json::from_str(&data)?;
    debug!("loaded resume state for {} file(s) from {:?}", states.len(), path);
    Ok(states)
}

/// Returns the default resume-state file path.
pub fn default_store_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("reelup").join("uploads.json"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
