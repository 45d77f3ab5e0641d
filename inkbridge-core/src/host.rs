//! Interfaces to the content-management host

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::entry::Entry;
use crate::error::{InkbridgeError, Result};

/// Entry storage and versioning service owned by the host
#[async_trait]
pub trait EntryHost: Send + Sync {
    /// Fetch the latest snapshot of an entry
    async fn get_entry(&self, id: &str) -> Result<Entry>;

    /// Submit an updated entry; returns it with the new version.
    ///
    /// Hosts reject snapshots older than their current version with
    /// [`InkbridgeError::WriteConflict`].
    async fn update_entry(&self, entry: Entry) -> Result<Entry>;
}

/// Asset file details for one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFile {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFields {
    pub file: BTreeMap<String, AssetFile>,
}

/// An asset as returned by the host's asset picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub fields: AssetFields,
}

impl AssetRecord {
    pub fn new<N: Into<String>, U: Into<String>>(locale: &str, file_name: N, url: U) -> Self {
        let mut file = BTreeMap::new();
        file.insert(
            locale.to_string(),
            AssetFile {
                file_name: file_name.into(),
                url: url.into(),
            },
        );
        Self {
            fields: AssetFields { file },
        }
    }

    /// File details for a locale
    pub fn file(&self, locale: &str) -> Option<&AssetFile> {
        self.fields.file.get(locale)
    }
}

/// The host's asset selection dialog
#[async_trait]
pub trait AssetPicker: Send + Sync {
    /// Let the user pick assets; `None` means the dialog was cancelled
    async fn select_assets(&self) -> Result<Option<Vec<AssetRecord>>>;
}

/// In-process host with optimistic concurrency
#[derive(Debug, Default)]
pub struct MemoryHost {
    entries: Mutex<HashMap<String, Entry>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host holding the given entries
    pub fn with_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.sys.id.clone(), entry))
            .collect();
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Insert or replace an entry without version checks
    pub fn insert(&self, entry: Entry) -> Result<()> {
        self.lock()?.insert(entry.sys.id.clone(), entry);
        Ok(())
    }

    /// Remove an entry; returns it if it was stored
    pub fn remove(&self, id: &str) -> Result<Option<Entry>> {
        Ok(self.lock()?.remove(id))
    }

    /// Snapshot of a stored entry
    pub fn entry(&self, id: &str) -> Option<Entry> {
        self.entries.lock().ok()?.get(id).cloned()
    }

    /// All stored entries ordered by id
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .entries
            .lock()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.sys.id.cmp(&b.sys.id));
        entries
    }

    /// Mark an entry as published at its current version
    pub fn publish(&self, id: &str) -> Result<Entry> {
        let mut entries = self.lock()?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| InkbridgeError::host(format!("Entry not found: {}", id)))?;
        entry.sys.version += 1;
        entry.sys.published_version = Some(entry.sys.version - 1);
        Ok(entry.clone())
    }

    /// Number of `get_entry` calls served
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of accepted `update_entry` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| InkbridgeError::host("entry store lock poisoned"))
    }
}

#[async_trait]
impl EntryHost for MemoryHost {
    async fn get_entry(&self, id: &str) -> Result<Entry> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| InkbridgeError::load_failure(id, "entry not found"))
    }

    async fn update_entry(&self, mut entry: Entry) -> Result<Entry> {
        let mut entries = self.lock()?;
        let current = entries
            .get(entry.id())
            .ok_or_else(|| InkbridgeError::host(format!("Entry not found: {}", entry.id())))?;

        if current.sys.version != entry.sys.version {
            return Err(InkbridgeError::write_conflict(
                entry.id(),
                entry.sys.version,
                current.sys.version,
            ));
        }

        entry.sys.version += 1;
        entry.sys.published_version = current.sys.published_version;
        entries.insert(entry.sys.id.clone(), entry.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(entry)
    }
}

/// Asset picker returning a fixed selection
#[derive(Debug, Clone, Default)]
pub struct StaticAssetPicker {
    selection: Option<Vec<AssetRecord>>,
}

impl StaticAssetPicker {
    pub fn new(selection: Vec<AssetRecord>) -> Self {
        Self {
            selection: Some(selection),
        }
    }

    /// A picker whose dialog is always cancelled
    pub fn cancelled() -> Self {
        Self { selection: None }
    }
}

#[async_trait]
impl AssetPicker for StaticAssetPicker {
    async fn select_assets(&self) -> Result<Option<Vec<AssetRecord>>> {
        Ok(self.selection.clone())
    }
}
