//! Cache module for the normalized dataset
//!
//! This module provides a typed, TTL-bounded cache over pluggable storage
//! backends. Entries are replaced whole, never updated in place. Refreshes of
//! the same key are serialized through a per-key async lock so that a burst
//! of concurrent misses performs a single upstream fetch, while different keys
//! never wait on each other.

mod manager;
mod memory;

pub use manager::DiskStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Default time-to-live for cached datasets
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Errors raised by cache storage backends
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the backing store failed
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A cached value with its storage time and time-to-live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached data
    pub value: T,
    /// When the data was cached
    pub stored_at: DateTime<Utc>,
    /// How long the entry stays fresh
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Creates an entry stored now
    pub fn new(value: T, ttl: Duration) -> Self {
        Self::stored_at(value, Utc::now(), ttl)
    }

    /// Creates an entry with an explicit storage time
    pub fn stored_at(value: T, stored_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            stored_at,
            ttl,
        }
    }

    /// Whether the entry is past its TTL at `now`
    ///
    /// A TTL too large to represent never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - self.stored_at > ttl,
            Err(_) => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// When the entry stops being fresh, if representable
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.stored_at.checked_add_signed(ttl))
    }
}

/// Storage backend for cache entries
pub trait CacheStore<T>: Send + Sync {
    /// Reads the entry for `key`, expired or not
    fn read(&self, key: &str) -> Result<Option<CacheEntry<T>>, CacheError>;

    /// Stores `entry` under `key`, replacing any previous entry atomically
    fn write(&self, key: &str, entry: &CacheEntry<T>) -> Result<(), CacheError>;

    /// Deletes the entry for `key`; returns whether one existed
    fn remove(&self, key: &str) -> Result<bool, CacheError>;
}

/// Typed TTL cache over a [`CacheStore`]
pub struct Cache<T> {
    store: Box<dyn CacheStore<T>>,
    ttl: Duration,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<T> std::fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("ttl", &self.ttl)
            .field("store", &"<dyn CacheStore>")
            .finish()
    }
}

impl<T> Cache<T> {
    /// Creates a cache whose new entries live for `ttl`
    pub fn new(store: impl CacheStore<T> + 'static, ttl: Duration) -> Self {
        Self {
            store: Box::new(store),
            ttl,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// TTL applied to new entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `key`, expired or not
    ///
    /// Unreadable entries are logged and reported as absent.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<T>> {
        match self.store.read(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cache read for '{}' failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    /// Returns the value for `key` if a non-expired entry exists
    pub fn get_fresh(&self, key: &str) -> Option<T> {
        match self.entry(key) {
            Some(entry) if !entry.is_expired() => {
                debug!("cache HIT for '{}'", key);
                Some(entry.value)
            }
            Some(_) => {
                debug!("cache entry for '{}' expired", key);
                None
            }
            None => {
                debug!("cache MISS for '{}'", key);
                None
            }
        }
    }

    /// Stores `value` as a new entry, replacing the previous one
    pub fn put(&self, key: &str, value: T) -> Result<(), CacheError> {
        self.store.write(key, &CacheEntry::new(value, self.ttl))
    }

    /// Removes the entry for `key`; returns whether one existed
    pub fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.store.remove(key)?;
        debug!("cache entry '{}' invalidated (existed: {})", key, removed);
        Ok(removed)
    }

    /// Lock serializing refreshes of `key`
    pub fn refresh_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }
}
