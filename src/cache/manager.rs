//! Cache manager.

use super::backend::{CacheBackend, FileCache, NullCache};
use super::key::CacheKey;
use crate::config::CacheSettings;
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
    pub max_entry_size: usize,
    /// Per-category TTL overrides.
    pub category_ttls: HashMap<String, Duration>,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
            category_ttls: HashMap::new(),
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            default_ttl: Duration::from_secs(settings.default_ttl_secs),
            enabled: settings.enabled,
            category_ttls: settings
                .category_ttl_secs
                .iter()
                .map(|(k, v)| (k.clone(), Duration::from_secs(*v)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_category_ttl(mut self, category: impl Into<String>, ttl: Duration) -> Self {
        self.category_ttls.insert(category.into(), ttl);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    /// Entries removed by category invalidation or expiry purges.
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Typed JSON cache over a [`CacheBackend`], with per-category TTLs and counters.
pub struct CacheManager {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: Arc<AtomicStats>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: Arc::new(AtomicStats::default()),
        }
    }

    /// File-backed manager from config settings, or a [`NullCache`] when caching is disabled.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let config = CacheConfig::from_settings(settings);
        let backend: Box<dyn CacheBackend> = if settings.enabled {
            Box::new(FileCache::new(settings.resolved_dir()))
        } else {
            Box::new(NullCache::new())
        };
        Self::new(config, backend)
    }

    pub fn ttl_for(&self, category: &str) -> Duration {
        self.config
            .category_ttls
            .get(category)
            .copied()
            .unwrap_or(self.config.default_ttl)
    }

    /// Look up a value. Entries that no longer deserialize as `T` count as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let prefixed = self.prefix_key(key);
        match self.backend.get(&prefixed).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(val) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(val))
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "cached value does not decode; treating as miss");
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Store with the TTL configured for the key's category.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.ttl_for(&key.category))
            .await
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let data = serde_json::to_vec(value)?;
        if data.len() > self.config.max_entry_size {
            debug!(key = %key, size = data.len(), "value exceeds max entry size; not cached");
            return Ok(());
        }
        let prefixed = self.prefix_key(key);
        match self.backend.set(&prefixed, &data, ttl).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        let prefixed = self.prefix_key(key);
        match self.backend.delete(&prefixed).await {
            Ok(d) => {
                if d {
                    self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                }
                Ok(d)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Return the cached value, or run `fetch`, store its result and return it.
    ///
    /// A failed store is logged and does not fail the call.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(v)) => return Ok(v),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "cache read failed; fetching"),
        }
        let value = fetch().await?;
        if let Err(e) = self.set(key, &value).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
        Ok(value)
    }

    pub async fn invalidate_category(&self, category: &str) -> Result<usize> {
        let category = match &self.config.key_prefix {
            Some(p) => format!("{}.{}", p, category),
            None => category.to_string(),
        };
        let n = self.backend.clear_category(&category).await?;
        self.stats.evictions.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        let n = self.backend.purge_expired().await?;
        self.stats.evictions.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn prefix_key(&self, key: &CacheKey) -> CacheKey {
        match &self.config.key_prefix {
            Some(p) => key.with_prefix(p),
            None => key.clone(),
        }
    }
}
