//! Cached proxy over the upstream challenge data
//!
//! Ties the remote source, the normalizer and the cache together behind the
//! get-or-refresh contract:
//!
//! - a fresh entry is served without a network call
//! - a miss, an expired entry or a forced refresh fetches and normalizes,
//!   then replaces the entry (TTL one hour by default)
//! - a failed fetch or normalization leaves the cache untouched and returns
//!   the error; nothing is retried

use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{Cache, CacheEntry, CacheError};
use crate::data::{DataNormalizer, DataSource, Dataset, TransportError, ValidationError};
use crate::logging::DIAGNOSTICS_TARGET;

/// Cache key of the normalized dataset
pub const CACHE_KEY: &str = "challenge_data";

/// Failure of a dataset read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream unreachable, timed out or answered non-2xx
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Upstream payload does not have the expected shape
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

/// Serves the dataset from cache, fetching from upstream on demand
pub struct DatasetProxy {
    source: Arc<dyn DataSource>,
    normalizer: DataNormalizer,
    cache: Cache<Dataset>,
    key: String,
}

impl std::fmt::Debug for DatasetProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetProxy")
            .field("key", &self.key)
            .field("cache", &self.cache)
            .field("normalizer", &self.normalizer)
            .finish()
    }
}

impl DatasetProxy {
    pub fn new(source: Arc<dyn DataSource>, normalizer: DataNormalizer, cache: Cache<Dataset>) -> Self {
        Self {
            source,
            normalizer,
            cache,
            key: CACHE_KEY.to_string(),
        }
    }

    /// Returns the dataset, fetching it when the cache cannot serve it
    ///
    /// # Arguments
    /// * `force_refresh` - Skip the freshness check and always fetch
    ///
    /// # Returns
    /// * `Ok(Dataset)` from the cache or from a successful fetch
    /// * `Err(FetchError)` if the fetch or normalization failed; the previous
    ///   entry, if any, is kept untouched
    pub async fn get_or_refresh(&self, force_refresh: bool) -> Result<Dataset, FetchError> {
        if !force_refresh {
            if let Some(dataset) = self.cache.get_fresh(&self.key) {
                return Ok(dataset);
            }
        }

        let lock = self.cache.refresh_lock(&self.key);
        let _guard = lock.lock().await;

        // Another reader may have refreshed while we waited
        if !force_refresh {
            if let Some(dataset) = self.cache.get_fresh(&self.key) {
                return Ok(dataset);
            }
        }

        let raw = self.source.fetch().await.map_err(|e| {
            error!(
                target: DIAGNOSTICS_TARGET,
                "{} (DatasetProxy::get_or_refresh)", e
            );
            e
        })?;

        let dataset = self.normalizer.normalize(&raw).map_err(|e| {
            error!(
                target: DIAGNOSTICS_TARGET,
                "{} (DatasetProxy::get_or_refresh)", e
            );
            e
        })?;

        if let Err(e) = self.cache.put(&self.key, dataset.clone()) {
            warn!("failed to store refreshed dataset: {}", e);
        } else {
            info!(
                "dataset refreshed: {} row(s), cached for {:?}",
                dataset.rows.len(),
                self.cache.ttl()
            );
        }

        Ok(dataset)
    }

    /// Drops the cached entry without touching the network
    ///
    /// The next read refetches. Returns whether an entry existed.
    pub fn invalidate(&self) -> Result<bool, CacheError> {
        self.cache.invalidate(&self.key)
    }

    /// Invalidates the entry, then performs a default read
    pub async fn reset(&self) -> Result<Dataset, FetchError> {
        if let Err(e) = self.invalidate() {
            warn!("failed to invalidate cache entry: {}", e);
        }
        self.get_or_refresh(false).await
    }

    /// Current cache entry, expired or not
    pub fn cached_entry(&self) -> Option<CacheEntry<Dataset>> {
        self.cache.entry(&self.key)
    }
}
