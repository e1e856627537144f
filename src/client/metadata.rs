//! Cached lookups of slow-changing JIRA metadata.

use super::api::ApiClient;
use super::endpoints::{AGILE_PREFIX, API_PREFIX};
use crate::cache::{CacheKey, CacheManager};
use crate::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataCategory {
    Fields,
    Projects,
    IssueTypes,
    Boards,
    Priorities,
}

impl MetadataCategory {
    pub const ALL: [MetadataCategory; 5] = [
        MetadataCategory::Fields,
        MetadataCategory::Projects,
        MetadataCategory::IssueTypes,
        MetadataCategory::Boards,
        MetadataCategory::Priorities,
    ];

    /// Cache category name; also the directory name in the file cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataCategory::Fields => "fields",
            MetadataCategory::Projects => "projects",
            MetadataCategory::IssueTypes => "issue_types",
            MetadataCategory::Boards => "boards",
            MetadataCategory::Priorities => "priorities",
        }
    }
}

impl fmt::Display for MetadataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MetadataCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown metadata category: {s}")))
    }
}

/// Memoizes metadata calls in a [`CacheManager`]; a miss fetches and stores.
pub struct MetadataCache {
    client: Arc<dyn ApiClient>,
    cache: Arc<CacheManager>,
}

impl MetadataCache {
    pub fn new(client: Arc<dyn ApiClient>, cache: Arc<CacheManager>) -> Self {
        Self { client, cache }
    }

    pub async fn fields(&self) -> Result<Value> {
        self.cached(MetadataCategory::Fields, &format!("{API_PREFIX}/field"))
            .await
    }

    pub async fn projects(&self) -> Result<Value> {
        self.cached(MetadataCategory::Projects, &format!("{API_PREFIX}/project"))
            .await
    }

    pub async fn issue_types(&self) -> Result<Value> {
        self.cached(
            MetadataCategory::IssueTypes,
            &format!("{API_PREFIX}/issuetype"),
        )
        .await
    }

    pub async fn priorities(&self) -> Result<Value> {
        self.cached(
            MetadataCategory::Priorities,
            &format!("{API_PREFIX}/priority"),
        )
        .await
    }

    pub async fn board(&self, board_id: u64) -> Result<Value> {
        self.cached(
            MetadataCategory::Boards,
            &format!("{AGILE_PREFIX}/board/{board_id}"),
        )
        .await
    }

    /// Resolve a field's display name (e.g. `Story Points`) to its id (`customfield_10016`).
    ///
    /// Matching is case-insensitive.
    pub async fn field_id(&self, name: &str) -> Result<Option<String>> {
        let fields = self.fields().await?;
        let wanted = name.to_lowercase();
        Ok(fields.as_array().and_then(|all| {
            all.iter()
                .find(|f| {
                    f.get("name")
                        .and_then(Value::as_str)
                        .map(|n| n.to_lowercase() == wanted)
                        .unwrap_or(false)
                })
                .and_then(|f| f.get("id").and_then(Value::as_str))
                .map(str::to_string)
        }))
    }

    /// Evict a category so the next lookup refetches it.
    pub async fn refresh(&self, category: MetadataCategory) -> Result<usize> {
        let n = self.cache.invalidate_category(category.as_str()).await?;
        info!(category = %category, evicted = n, "metadata cache refreshed");
        Ok(n)
    }

    async fn cached(&self, category: MetadataCategory, endpoint: &str) -> Result<Value> {
        let key = CacheKey::for_request(category.as_str(), endpoint, None);
        let client = &self.client;
        self.cache
            .get_or_fetch(&key, || async move { client.get(endpoint, None).await })
            .await
    }
}
