//! JSON file entry store backing the `edit` command

use anyhow::{Context, Result};
use inkbridge_core::{Entry, MemoryHost};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    entries: Vec<Entry>,
}

/// Entries loaded from a JSON file into an in-memory host
pub struct JsonStore {
    path: PathBuf,
    host: Arc<MemoryHost>,
}

impl JsonStore {
    /// Load the store file
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read store {}", path.display()))?;
        let file: StoreFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse store {}", path.display()))?;

        tracing::debug!("Loaded {} entries from {}", file.entries.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            host: Arc::new(MemoryHost::with_entries(file.entries)),
        })
    }

    pub fn host(&self) -> Arc<MemoryHost> {
        self.host.clone()
    }

    /// Write the host's entries back to the store file
    pub fn save(&self) -> Result<()> {
        let file = StoreFile {
            entries: self.host.entries(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write store {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{ "entries": [ { "sys": { "id": "post", "version": 3, "publishedVersion": 2 },
                 "fields": { "body": { "en-US": "Hello" } } } ] }"#,
        )
        .unwrap();

        let store = JsonStore::open(&path).unwrap();
        let entry = store.host().entry("post").unwrap();
        assert_eq!(entry.sys.version, 3);
        assert_eq!(entry.sys.published_version, Some(2));
        assert_eq!(entry.body("body", "en-US").unwrap(), Some("Hello"));

        store.save().unwrap();
        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(reopened.host().entry("post"), Some(entry));
    }

    #[test]
    fn test_missing_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(JsonStore::open(&dir.path().join("missing.json")).is_err());
    }
}
