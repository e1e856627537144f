use crate::resilience::rate_limiter::RateLimiter;
use crate::transport::HttpTransport;
use crate::types::{HttpMethod, QueryParams};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::api::ApiClient;
use super::builder::JiraClientBuilder;
use super::error_classification::remote_error;
use super::retry::RetryPolicy;

/// JIRA REST client.
///
/// Cheap to clone; clones share the connection pool and rate limiter.
#[derive(Clone)]
pub struct JiraClient {
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) retry: RetryPolicy,
    pub(crate) rate_limiter: Option<Arc<RateLimiter>>,
}

impl JiraClient {
    pub fn builder() -> JiraClientBuilder {
        JiraClientBuilder::new()
    }

    pub fn from_config(config: &crate::config::JiraConfig) -> Result<Self> {
        JiraClientBuilder::from_config(config).build()
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Perform one logical call, retrying transient failures per the [`RetryPolicy`].
    pub async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        query: Option<&QueryParams>,
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut attempt = 0u32;
        loop {
            match self.attempt_once(method, endpoint, query, body).await {
                Ok(v) => return Ok(v),
                Err(e) => match self.retry.next_delay(attempt, &e) {
                    Some(delay) => {
                        info!(
                            method = method.as_str(),
                            endpoint,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying jira request"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(
                            method = method.as_str(),
                            endpoint,
                            attempts = attempt + 1,
                            error = %e,
                            "jira request failed"
                        );
                        return Err(e);
                    }
                },
            }
        }
    }

    async fn attempt_once(
        &self,
        method: HttpMethod,
        endpoint: &str,
        query: Option<&QueryParams>,
        body: Option<&Value>,
    ) -> Result<Value> {
        if let Some(rl) = &self.rate_limiter {
            rl.acquire().await;
        }

        let resp = self.transport.send(method, endpoint, query, body).await?;

        if let Some(rl) = &self.rate_limiter {
            // Retry-After only means "back off" on 429 and 503.
            let retry_after = match resp.status {
                429 | 503 => resp.retry_after_secs.map(Duration::from_secs),
                _ => None,
            };
            rl.update_budget(resp.rate_limit_remaining, retry_after).await;
        }

        if !resp.is_success() {
            return Err(remote_error(&resp));
        }
        decode_body(&resp.body)
    }
}

/// JIRA answers many writes with `204 No Content`; those decode to `null`.
fn decode_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(Error::from)
}

#[async_trait]
impl ApiClient for JiraClient {
    async fn get(&self, endpoint: &str, params: Option<&QueryParams>) -> Result<Value> {
        self.request(HttpMethod::Get, endpoint, params, None).await
    }

    async fn post(&self, endpoint: &str, data: Option<&Value>) -> Result<Value> {
        self.request(HttpMethod::Post, endpoint, None, data).await
    }

    async fn put(&self, endpoint: &str, data: Option<&Value>) -> Result<Value> {
        self.request(HttpMethod::Put, endpoint, None, data).await
    }

    async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.request(HttpMethod::Delete, endpoint, None, None).await
    }

    async fn patch(&self, endpoint: &str, data: Option<&Value>) -> Result<Value> {
        self.request(HttpMethod::Patch, endpoint, None, data).await
    }
}
