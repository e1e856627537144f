//! Cache backend implementations.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    async fn exists(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    /// Drop every entry of one category; returns how many were removed.
    async fn clear_category(&self, category: &str) -> Result<usize>;
    /// Drop expired entries; returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
    /// Number of live (unexpired) entries.
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

struct MemoryEntry {
    category: String,
    data: Vec<u8>,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Bounded in-process cache with least-recently-used eviction.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, MemoryEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let id = key.storage_id();
        let mut entries = self.lock();
        let expired = match entries.get(&id) {
            Some(e) if !e.is_expired() => return Ok(Some(e.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(&id);
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        self.lock().put(
            key.storage_id(),
            MemoryEntry {
                category: key.category.clone(),
                data: value.to_vec(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock().pop(&key.storage_id()).is_some())
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self
            .lock()
            .peek(&key.storage_id())
            .map(|e| !e.is_expired())
            .unwrap_or(false))
    }

    async fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }

    async fn clear_category(&self, category: &str) -> Result<usize> {
        let mut entries = self.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.category == category)
            .map(|(k, _)| k.clone())
            .collect();
        for k in &doomed {
            entries.pop(k);
        }
        Ok(doomed.len())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for k in &doomed {
            entries.pop(k);
        }
        Ok(doomed.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.lock().iter().filter(|(_, e)| !e.is_expired()).count())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// On-disk envelope for one cached value.
#[derive(Serialize, Deserialize)]
struct FileEnvelope {
    name: String,
    created_at_ms: u64,
    expires_at_ms: u64,
    /// base64 of the stored bytes
    data: String,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

enum FileRead {
    Missing,
    Live(Vec<u8>),
    /// Expired or unreadable; the file should be removed.
    Stale,
}

/// Persistent cache: one JSON envelope per entry under `<root>/<category>/<hash>.json`.
///
/// Survives process restarts, which is what makes metadata caching worthwhile
/// for short-lived CLI invocations.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn category_dir(&self, category: &str) -> Result<PathBuf> {
        let valid = !category.is_empty()
            && category != "."
            && category != ".."
            && !category.contains(['/', '\\']);
        if !valid {
            return Err(Error::cache_with_context(
                format!("invalid cache category '{category}'"),
                ErrorContext::new()
                    .with_field_path("category")
                    .with_source("file_cache"),
            ));
        }
        Ok(self.root.join(category))
    }

    fn entry_path(&self, key: &CacheKey) -> Result<PathBuf> {
        Ok(self
            .category_dir(&key.category)?
            .join(format!("{}.json", key.hash())))
    }

    async fn read_entry(path: &Path) -> Result<FileRead> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileRead::Missing),
            Err(e) => return Err(e.into()),
        };
        let envelope: FileEnvelope = match serde_json::from_slice(&raw) {
            Ok(env) => env,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding corrupt cache file");
                return Ok(FileRead::Stale);
            }
        };
        if now_ms() >= envelope.expires_at_ms {
            return Ok(FileRead::Stale);
        }
        match general_purpose::STANDARD.decode(envelope.data.as_bytes()) {
            Ok(data) => Ok(FileRead::Live(data)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding undecodable cache file");
                Ok(FileRead::Stale)
            }
        }
    }

    async fn remove_quietly(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn entry_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut rd = match tokio::fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                out.push(path);
            }
        }
        Ok(out)
    }

    async fn category_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut rd = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = rd.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                out.push(entry.path());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key)?;
        match Self::read_entry(&path).await? {
            FileRead::Live(data) => Ok(Some(data)),
            FileRead::Missing => Ok(None),
            FileRead::Stale => {
                Self::remove_quietly(&path).await?;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let dir = self.category_dir(&key.category)?;
        tokio::fs::create_dir_all(&dir).await?;

        let now = now_ms();
        let envelope = FileEnvelope {
            name: key.name.clone(),
            created_at_ms: now,
            expires_at_ms: now
                .saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
            data: general_purpose::STANDARD.encode(value),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        // Write-then-rename so readers never observe a half-written file.
        let hash = key.hash();
        let tmp = dir.join(format!("{}.{}.tmp", hash, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, dir.join(format!("{}.json", hash))).await?;
        debug!(key = %key, ttl_secs = ttl.as_secs(), "cache entry written");
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Self::remove_quietly(&self.entry_path(key)?).await
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        let path = self.entry_path(key)?;
        Ok(matches!(Self::read_entry(&path).await?, FileRead::Live(_)))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_category(&self, category: &str) -> Result<usize> {
        let dir = self.category_dir(category)?;
        let count = Self::entry_files(&dir).await?.len();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in self.category_dirs().await? {
            for path in Self::entry_files(&dir).await? {
                if let FileRead::Stale = Self::read_entry(&path).await? {
                    if Self::remove_quietly(&path).await? {
                        removed += 1;
                    }
                }
            }
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        let mut live = 0;
        for dir in self.category_dirs().await? {
            for path in Self::entry_files(&dir).await? {
                if let FileRead::Live(_) = Self::read_entry(&path).await? {
                    live += 1;
                }
            }
        }
        Ok(live)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn exists(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn clear_category(&self, _: &str) -> Result<usize> {
        Ok(0)
    }
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_memory_accepts_unbounded_ttl() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("fields", "forever");
        cache.set(&key, b"x", Duration::MAX).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"x".to_vec()));
        assert_eq!(cache.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_set_get_delete() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("fields", "all");
        cache.set(&key, b"payload", HOUR).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"payload".to_vec()));
        assert!(cache.exists(&key).await.unwrap());
        assert!(cache.delete(&key).await.unwrap());
        assert!(!cache.delete(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_zero_ttl_is_stale() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("fields", "all");
        cache.set(&key, b"x", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_lru_eviction() {
        let cache = MemoryCache::new(2);
        let a = CacheKey::new("c", "a");
        let b = CacheKey::new("c", "b");
        let c = CacheKey::new("c", "c");
        cache.set(&a, b"1", HOUR).await.unwrap();
        cache.set(&b, b"2", HOUR).await.unwrap();
        // touch `a` so `b` becomes the eviction candidate
        cache.get(&a).await.unwrap();
        cache.set(&c, b"3", HOUR).await.unwrap();

        assert!(cache.exists(&a).await.unwrap());
        assert!(!cache.exists(&b).await.unwrap());
        assert!(cache.exists(&c).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_clear_category() {
        let cache = MemoryCache::new(10);
        cache.set(&CacheKey::new("fields", "1"), b"a", HOUR).await.unwrap();
        cache.set(&CacheKey::new("fields", "2"), b"b", HOUR).await.unwrap();
        cache.set(&CacheKey::new("boards", "1"), b"c", HOUR).await.unwrap();

        assert_eq!(cache.clear_category("fields").await.unwrap(), 2);
        assert_eq!(cache.len().await.unwrap(), 1);
        assert!(cache.exists(&CacheKey::new("boards", "1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_purge_expired() {
        let cache = MemoryCache::new(10);
        cache.set(&CacheKey::new("c", "old"), b"a", Duration::ZERO).await.unwrap();
        cache.set(&CacheKey::new("c", "new"), b"b", HOUR).await.unwrap();
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_accepts_unbounded_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::new("fields", "forever");
        cache.set(&key, b"x", Duration::MAX).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_file_round_trip_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let key = CacheKey::new("projects", "/rest/api/3/project");
        {
            let cache = FileCache::new(dir.path());
            cache.set(&key, br#"[{"key":"PROJ"}]"#, HOUR).await.unwrap();
        }
        // a fresh instance over the same directory sees the entry
        let cache = FileCache::new(dir.path());
        assert_eq!(
            cache.get(&key).await.unwrap(),
            Some(br#"[{"key":"PROJ"}]"#.to_vec())
        );
        assert!(dir
            .path()
            .join("projects")
            .join(format!("{}.json", key.hash()))
            .exists());
    }

    #[tokio::test]
    async fn test_file_expired_entry_is_removed_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::new("fields", "all");
        cache.set(&key, b"x", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(!dir
            .path()
            .join("fields")
            .join(format!("{}.json", key.hash()))
            .exists());
    }

    #[tokio::test]
    async fn test_file_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::new("fields", "all");
        std::fs::create_dir_all(dir.path().join("fields")).unwrap();
        std::fs::write(
            dir.path().join("fields").join(format!("{}.json", key.hash())),
            b"{not json",
        )
        .unwrap();

        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_category_eviction_and_purge() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.set(&CacheKey::new("fields", "a"), b"1", HOUR).await.unwrap();
        cache.set(&CacheKey::new("fields", "b"), b"2", HOUR).await.unwrap();
        cache.set(&CacheKey::new("boards", "a"), b"3", HOUR).await.unwrap();
        cache.set(&CacheKey::new("boards", "old"), b"4", Duration::ZERO).await.unwrap();

        assert_eq!(cache.len().await.unwrap(), 3);
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.clear_category("fields").await.unwrap(), 2);
        assert_eq!(cache.clear_category("fields").await.unwrap(), 0);
        assert_eq!(cache.len().await.unwrap(), 1);

        cache.clear().await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_rejects_path_like_categories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let err = cache
            .set(&CacheKey::new("../escape", "x"), b"1", HOUR)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cache { .. }));
    }

    #[tokio::test]
    async fn test_null_cache_never_stores() {
        let cache = NullCache::new();
        let key = CacheKey::new("c", "k");
        cache.set(&key, b"x", HOUR).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert_eq!(cache.name(), "null");
    }
}
