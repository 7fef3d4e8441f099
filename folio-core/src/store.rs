//! Reading-state persistence over a caller-supplied key/value store.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::book::BookId;
use crate::settings::Settings;

pub const KEY_CURRENT_PAGE: &str = "reading.currentPage";
pub const KEY_SETTINGS: &str = "reading.settings";
pub const KEY_BOOKMARKS: &str = "reading.bookmarks";
pub const KEY_BOOK_ID: &str = "reading.bookId";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub page_number: usize,
    pub label: String,
    /// Unix time in milliseconds.
    pub timestamp: u64,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.inner.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in a single JSON object on disk, replaced atomically on write.
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state directory at {:?}", parent))?;
        }
        Ok(Self {
            path,
            cache: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let mut file = File::open(&self.path)
            .with_context(|| format!("failed to open state file {:?}", self.path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let entries = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode state file {:?}", self.path))?;
        Ok(entries)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(entries)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp state file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace state file {:?}", self.path))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cache = self.cache.lock();
        if cache.is_none() {
            *cache = Some(self.read_all()?);
        }
        Ok(cache.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut cache = self.cache.lock();
        let mut entries = match cache.take() {
            Some(entries) => entries,
            None => self.read_all()?,
        };
        entries.insert(key.to_string(), value);
        let written = self.write_all(&entries);
        *cache = Some(entries);
        written
    }
}

/// Typed view over the `reading.*` keys.
#[derive(Clone)]
pub struct ReadingStore {
    inner: Arc<dyn KeyValueStore>,
}

impl ReadingStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("failed to decode stored value for {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.inner.set(key, raw)
    }

    pub fn load_current_page(&self) -> Result<Option<usize>> {
        self.load(KEY_CURRENT_PAGE)
    }

    pub fn save_current_page(&self, page_number: usize) -> Result<()> {
        self.save(KEY_CURRENT_PAGE, &page_number)
    }

    pub fn load_settings(&self) -> Result<Option<Settings>> {
        self.load(KEY_SETTINGS)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.save(KEY_SETTINGS, settings)
    }

    pub fn load_bookmarks(&self) -> Result<Vec<Bookmark>> {
        Ok(self.load(KEY_BOOKMARKS)?.unwrap_or_default())
    }

    pub fn save_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<()> {
        self.save(KEY_BOOKMARKS, &bookmarks)
    }

    pub fn load_book_id(&self) -> Result<Option<BookId>> {
        self.load(KEY_BOOK_ID)
    }

    pub fn save_book_id(&self, id: BookId) -> Result<()> {
        self.save(KEY_BOOK_ID, &id)
    }
}
