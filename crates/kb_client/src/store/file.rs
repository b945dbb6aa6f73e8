use std::collections::BTreeMap;
use std::fs::{create_dir_all, read_to_string, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CredentialStore, StoreWrite};
use crate::error::StoreError;

/// JSON-object file surviving restarts.
///
/// Each batch rewrites a sibling temp file and renames it over the original,
/// so a reader sees either the old or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_entries() {
            Ok(mut entries) => entries.remove(key),
            Err(err) => {
                log::warn!("Unreadable credential file {}: {}", self.path.display(), err);
                None
            }
        }
    }

    fn apply(&self, batch: &[StoreWrite]) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Io("file store lock poisoned".to_string()))?;
        let mut entries = self.read_entries().unwrap_or_else(|err| {
            log::warn!(
                "Discarding unreadable credential file {}: {}",
                self.path.display(),
                err
            );
            BTreeMap::new()
        });
        for write in batch {
            match write {
                StoreWrite::Set(key, value) => {
                    entries.insert((*key).to_string(), value.clone());
                }
                StoreWrite::Remove(key) => {
                    entries.remove(*key);
                }
            }
        }
        self.write_entries(&entries)
    }
}
