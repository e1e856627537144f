//! Cache key generation.

use crate::types::QueryParams;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A cache entry address: a category (the unit of bulk eviction) plus a name.
///
/// Backends store entries under `<category>/<sha256(name)>`, so arbitrary
/// names (URLs, JQL) are safe as file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub category: String,
    pub name: String,
}

impl CacheKey {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Key for a GET request: endpoint plus its canonical (sorted) query string.
    pub fn for_request(
        category: impl Into<String>,
        endpoint: &str,
        params: Option<&QueryParams>,
    ) -> Self {
        let name = match params.filter(|p| !p.is_empty()) {
            Some(p) => {
                let query: Vec<String> = p.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("{}?{}", endpoint, query.join("&"))
            }
            None => endpoint.to_string(),
        };
        Self::new(category, name)
    }

    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn storage_id(&self) -> String {
        format!("{}/{}", self.category, self.hash())
    }

    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self::new(format!("{}.{}", prefix, self.category), self.name.clone())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}
