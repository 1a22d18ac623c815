//! Disk-backed cache store
//!
//! Persists cache entries as JSON files, one per key, so that separate
//! processes (the CLI `purge` command, a server) share the same entry.

use directories::ProjectDirs;
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{CacheEntry, CacheError, CacheStore};

/// Stores cache entries as JSON files in a directory
///
/// Uses an XDG-compliant cache directory by default (`~/.cache/mp-challenge/`
/// on Linux). Replacement is atomic: entries are written to a temporary file
/// and renamed over the previous one.
#[derive(Debug, Clone)]
pub struct DiskStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl DiskStore {
    /// Creates a store in the XDG cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "mp-challenge")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a store in a custom directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to a cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!(".{}.json.tmp", key))
    }
}

impl<T> CacheStore<T> for DiskStore
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn read(&self, key: &str) -> Result<Option<CacheEntry<T>>, CacheError> {
        let path = self.cache_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e)),
        };
        let entry = serde_json::from_str(&content)?;
        Ok(Some(entry))
    }

    fn write(&self, key: &str, entry: &CacheEntry<T>) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir)?;

        let json = serde_json::to_string_pretty(entry)?;
        let temp = self.temp_path(key);
        fs::write(&temp, json)?;
        fs::rename(&temp, self.cache_path(key))?;

        debug!("cache entry '{}' written to {}", key, self.cache_dir.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.cache_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}
