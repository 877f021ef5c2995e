// Durable key/value storage.
// A small JSON file of string items, written atomically, that outlives the process.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::Result;

/// A stored value with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub value: String,
    /// When the value was written.
    pub stored_at: DateTime<Utc>,
}

impl StoredItem {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            stored_at: Utc::now(),
        }
    }
}

type Items = BTreeMap<String, StoredItem>;

/// Serialises read-modify-write cycles across every handle in the process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

fn write_lock() -> MutexGuard<'static, ()> {
    WRITE_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// File-backed storage keyed by string, in the spirit of browser `localStorage`.
///
/// Every operation reads the file fresh, so separate handles on the same path
/// always agree.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    /// Storage backed by the file at `path`. The file is created on first write.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value, or `None` if the key is absent.
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_entry(key)?.map(|item| item.value))
    }

    /// Read a value along with when it was stored.
    pub fn get_entry(&self, key: &str) -> Result<Option<StoredItem>> {
        let mut items = self.load()?;
        Ok(items.remove(key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = write_lock();
        let mut items = self.load()?;
        items.insert(key.to_string(), StoredItem::new(value));
        self.save(&items)
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let _guard = write_lock();
        let mut items = self.load()?;
        let removed = items.remove(key).is_some();
        if removed {
            self.save(&items)?;
        }
        Ok(removed)
    }

    /// Remove every key.
    pub fn clear(&self) -> Result<()> {
        let _guard = write_lock();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<Items> {
        if !self.path.exists() {
            return Ok(Items::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Items::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, items: &Items) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(items)?;

        // Write atomically via a temp file unique to this write
        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> LocalStorage {
        LocalStorage::at(dir.path().join("nested").join("storage.json"))
    }

    #[test]
    fn test_set_and_get_item() {
        let temp_dir = TempDir::new().unwrap();
        let store = storage(&temp_dir);

        store.set_item("authToken", "abc123").unwrap();
        assert_eq!(store.get_item("authToken").unwrap().as_deref(), Some("abc123"));

        let entry = store.get_entry("authToken").unwrap().unwrap();
        assert!(entry.stored_at <= Utc::now());
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = storage(&temp_dir);

        assert_eq!(store.get_item("authToken").unwrap(), None);
        assert!(!store.remove_item("authToken").unwrap());
    }

    #[test]
    fn test_remove_keeps_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = storage(&temp_dir);

        store.set_item("authToken", "abc123").unwrap();
        store.set_item("theme", "dark").unwrap();
        assert!(store.remove_item("authToken").unwrap());

        assert_eq!(store.get_item("authToken").unwrap(), None);
        assert_eq!(store.get_item("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_handles_share_file() {
        let temp_dir = TempDir::new().unwrap();
        let a = storage(&temp_dir);
        let b = storage(&temp_dir);

        a.set_item("authToken", "one").unwrap();
        assert_eq!(b.get_item("authToken").unwrap().as_deref(), Some("one"));

        b.clear().unwrap();
        assert_eq!(a.get_item("authToken").unwrap(), None);
        assert!(!a.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        assert!(LocalStorage::at(path).get_item("authToken").is_err());
    }

    #[test]
    fn test_concurrent_writers_keep_every_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = storage(&temp_dir);

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.set_item(&format!("key{i}"), "v").unwrap())
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        for i in 0..8 {
            assert_eq!(store.get_item(&format!("key{i}")).unwrap().as_deref(), Some("v"));
        }
    }
}
