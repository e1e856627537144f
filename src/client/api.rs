//! The client contract consumed by [`crate::batch::RequestBatcher`].

use crate::types::QueryParams;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Anything able to perform JIRA-shaped REST calls.
///
/// Implementations return the decoded JSON payload or an error for any
/// failure (HTTP status, network, timeout). They must be safe to share
/// across concurrently running requests.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get(&self, endpoint: &str, params: Option<&QueryParams>) -> Result<Value>;

    async fn post(&self, endpoint: &str, data: Option<&Value>) -> Result<Value>;

    async fn put(&self, endpoint: &str, data: Option<&Value>) -> Result<Value>;

    async fn delete(&self, endpoint: &str) -> Result<Value>;

    async fn patch(&self, endpoint: &str, data: Option<&Value>) -> Result<Value> {
        let _ = data;
        Err(Error::validation(format!(
            "PATCH is not supported by this client ({endpoint})"
        )))
    }
}
