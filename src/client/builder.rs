use crate::client::core::JiraClient;
use crate::client::retry::RetryPolicy;
use crate::config::JiraConfig;
use crate::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::transport::{Credentials, HttpTransport};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`JiraClient`].
///
/// Keep this surface area small and predictable.
pub struct JiraClientBuilder {
    base_url: Option<String>,
    credentials: Option<Credentials>,
    timeout: Duration,
    retry: RetryPolicy,
    rate_limit: Option<RateLimiterConfig>,
}

impl JiraClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            credentials: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            rate_limit: None,
        }
    }

    /// Seed every setting from a resolved [`JiraConfig`].
    pub fn from_config(config: &JiraConfig) -> Self {
        let mut b = Self::new()
            .base_url(config.base_url.clone())
            .timeout(config.timeout())
            .max_retries(config.max_retries);
        if let Ok(creds) = config.credentials() {
            b = b.credentials(creds);
        }
        if let Some(rps) = config.rate_limit_rps {
            b = b.rate_limit_rps(rps);
        }
        b
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn credentials(mut self, creds: Credentials) -> Self {
        self.credentials = Some(creds);
        self
    }

    /// JIRA Cloud: account email plus API token.
    pub fn basic_auth(self, email: impl Into<String>, api_token: impl Into<String>) -> Self {
        self.credentials(Credentials::Basic {
            email: email.into(),
            api_token: api_token.into(),
        })
    }

    /// JIRA Data Center personal access token.
    pub fn bearer_auth(self, token: impl Into<String>) -> Self {
        self.credentials(Credentials::Bearer {
            token: token.into(),
        })
    }

    /// Per-attempt HTTP timeout. A timeout surfaces as a retryable transport error.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.retry.max_retries = n;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Enable the token-bucket rate limiter. Invalid rates are ignored.
    ///
    /// Server-requested pauses are capped at the retry policy's `max_delay`.
    pub fn rate_limit_rps(mut self, rps: f64) -> Self {
        if let Some(cfg) = RateLimiterConfig::from_rps(rps) {
            self.rate_limit = Some(cfg);
        }
        self
    }

    pub fn build(self) -> Result<JiraClient> {
        let base_url = self.base_url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            Error::configuration_with_context(
                "base URL is required",
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("client_builder"),
            )
        })?;
        url::Url::parse(&base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {e}"),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(base_url.clone())
                    .with_source("client_builder"),
            )
        })?;
        let credentials = self.credentials.ok_or_else(|| {
            Error::configuration_with_context(
                "credentials are required",
                ErrorContext::new()
                    .with_field_path("credentials")
                    .with_source("client_builder"),
            )
        })?;

        let transport = HttpTransport::new(&base_url, credentials, self.timeout)?;
        let rate_limiter = self.rate_limit.map(|cfg| {
            Arc::new(RateLimiter::new(cfg.with_max_pause(self.retry.max_delay)))
        });

        Ok(JiraClient {
            transport: Arc::new(transport),
            retry: self.retry,
            rate_limiter,
        })
    }
}

impl Default for JiraClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
