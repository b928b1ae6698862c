//! Persistence of the saved widget set.
//!
//! `KeyValueStore` models a local storage area: named slots holding one
//! string value each, always written whole. `LocalWidgetStore` keeps the
//! saved widgets as a JSON array in the fixed `UserData` slot.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use weatherdash_core::{StorageError, WidgetError};

use crate::widget::Widget;

/// Slot holding the saved widget set.
pub const USER_DATA_KEY: &str = "UserData";

/// Named string slots with whole-value writes.
pub trait KeyValueStore: Send + Sync {
    /// Read a slot. Returns `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace a slot's value in a single write.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Open (and create if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!("Opened storage directory {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key: {:?}", key),
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        // Readers see either the old file or the new one, never a partial write.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process slots, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Durable saved-widget set, deduplicated by city.
pub trait WidgetStore: Send + Sync {
    /// Saved widgets in insertion order. Missing or unreadable data yields
    /// an empty list.
    fn load(&self) -> Vec<Widget>;

    /// Append the widgets whose city is not saved yet and persist the whole
    /// set in one write. Returns the widgets that were added.
    ///
    /// # Errors
    /// `WidgetError::DuplicateCity` when nothing new remains (nothing is
    /// written). `WidgetError::Storage` when the saved set cannot be read
    /// (nothing is written) or the write fails. Corrupt saved data is
    /// replaced rather than reported.
    fn merge_and_save(&self, new_widgets: &[Widget]) -> Result<Vec<Widget>, WidgetError>;

    /// Persist exactly `widgets`, replacing whatever was saved.
    ///
    /// # Errors
    /// Returns `StorageError` when encoding or writing fails.
    fn overwrite(&self, widgets: &[Widget]) -> Result<(), StorageError>;
}

/// `WidgetStore` over a `KeyValueStore` slot.
pub struct LocalWidgetStore<K> {
    slots: K,
    // Serializes load-merge-write cycles within this process.
    write_lock: Mutex<()>,
}

impl<K: KeyValueStore> LocalWidgetStore<K> {
    pub fn new(slots: K) -> Self {
        Self {
            slots,
            write_lock: Mutex::new(()),
        }
    }

    pub fn slots(&self) -> &K {
        &self.slots
    }

    fn read(&self) -> Result<Vec<Widget>, StorageError> {
        match self.slots.get(USER_DATA_KEY)? {
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, widgets: &[Widget]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(widgets)?;
        self.slots.set(USER_DATA_KEY, &encoded)
    }
}

impl LocalWidgetStore<FileKeyValueStore> {
    /// File-backed store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Ok(Self::new(FileKeyValueStore::open(dir)?))
    }
}

impl LocalWidgetStore<MemoryKeyValueStore> {
    pub fn in_memory() -> Self {
        Self::new(MemoryKeyValueStore::new())
    }
}

impl<K: KeyValueStore> WidgetStore for LocalWidgetStore<K> {
    fn load(&self) -> Vec<Widget> {
        match self.read() {
            Ok(widgets) => widgets,
            Err(e) => {
                tracing::warn!("Ignoring unreadable saved widgets: {}", e);
                Vec::new()
            }
        }
    }

    fn merge_and_save(&self, new_widgets: &[Widget]) -> Result<Vec<Widget>, WidgetError> {
        let _guard = self.write_lock.lock();
        let mut saved = match self.read() {
            Ok(saved) => saved,
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!("Replacing corrupt saved widgets: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut added: Vec<Widget> = Vec::new();
        for widget in new_widgets {
            let known = saved.iter().chain(added.iter()).any(|w| w.city == widget.city);
            if !known {
                added.push(widget.clone());
            }
        }

        if added.is_empty() {
            let city = new_widgets
                .first()
                .map(|w| w.city.clone())
                .unwrap_or_default();
            tracing::info!("Nothing new to save (duplicate city {:?})", city);
            return Err(WidgetError::DuplicateCity(city));
        }

        saved.extend(added.iter().cloned());
        self.write(&saved)?;
        tracing::info!("Saved {} widget(s), {} total", added.len(), saved.len());
        Ok(added)
    }

    fn overwrite(&self, widgets: &[Widget]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        self.write(widgets)?;
        tracing::debug!("Overwrote saved widgets ({} total)", widgets.len());
        Ok(())
    }
}
