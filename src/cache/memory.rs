//! In-process cache store

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{CacheEntry, CacheError, CacheStore};

/// Keeps cache entries in memory behind a read-write lock
///
/// Readers clone the entry they find, so an in-flight reader keeps the old
/// value while a writer swaps in the replacement.
#[derive(Debug)]
pub struct MemoryStore<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> CacheStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync,
{
    fn read(&self, key: &str) -> Result<Option<CacheEntry<T>>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, entry: &CacheEntry<T>) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }
}
