//! # Response caching
//!
//! Caches slow-changing JIRA metadata (custom fields, projects, boards) so
//! short-lived CLI invocations do not refetch it on every run.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Typed JSON access with per-category TTLs and statistics |
//! | [`CacheConfig`] | TTLs, size limit and key prefix |
//! | [`CacheBackend`] | Storage trait |
//! | [`FileCache`] | Persistent per-category directories of JSON envelopes |
//! | [`MemoryCache`] | In-process LRU |
//! | [`NullCache`] | No-op backend used when caching is disabled |
//! | [`CacheKey`] | Category plus hashed name |
//!
//! ```rust
//! use jira_lib_rust::cache::{CacheConfig, CacheManager, MemoryCache};
//! use std::time::Duration;
//!
//! let config = CacheConfig::new()
//!     .with_ttl(Duration::from_secs(3600))
//!     .with_category_ttl("fields", Duration::from_secs(86400));
//! let cache = CacheManager::new(config, Box::new(MemoryCache::new(1000)));
//! assert_eq!(cache.backend_name(), "memory");
//! ```

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, FileCache, MemoryCache, NullCache};
pub use key::CacheKey;
pub use manager::{CacheConfig, CacheManager, CacheStats};
