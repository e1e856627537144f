use crate::types::{HttpMethod, QueryParams};
use crate::Result;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::HeaderMap;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use tracing::debug;

/// How requests authenticate against the JIRA instance.
#[derive(Clone)]
pub enum Credentials {
    /// JIRA Cloud: account email plus API token, sent as HTTP Basic.
    Basic { email: String, api_token: String },
    /// JIRA Data Center personal access token, sent as Bearer.
    Bearer { token: String },
}

impl Credentials {
    fn header_value(&self) -> String {
        match self {
            Credentials::Basic { email, api_token } => {
                let raw = format!("{}:{}", email, api_token);
                format!("Basic {}", general_purpose::STANDARD.encode(raw))
            }
            Credentials::Bearer { token } => format!("Bearer {}", token),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { email, .. } => f
                .debug_struct("Basic")
                .field("email", email)
                .field("api_token", &"***")
                .finish(),
            Credentials::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

/// Undecoded response. Status interpretation belongs to the client.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// `Retry-After` in seconds, when the server sent one.
    pub retry_after_secs: Option<u64>,
    /// `X-RateLimit-Remaining`, when present.
    pub rate_limit_remaining: Option<u64>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let timeout = env::var("JIRA_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(timeout);
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("jira-lib-rust/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(
                env::var("JIRA_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(16),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("JIRA_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        if let Ok(proxy_url) = env::var("JIRA_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an endpoint against the base URL. Absolute URLs pass through untouched.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    pub async fn send(
        &self,
        method: HttpMethod,
        endpoint: &str,
        query: Option<&QueryParams>,
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse> {
        let url = self.url_for(endpoint);
        let mut request = self
            .client
            .request(method.into(), &url)
            .header("Accept", "application/json")
            .header("Authorization", self.credentials.header_value());

        if let Some(params) = query {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = std::time::Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;

        debug!(
            method = method.as_str(),
            url = url.as_str(),
            http_status = status,
            duration_ms = start.elapsed().as_millis() as u64,
            "jira request completed"
        );

        Ok(RawResponse {
            status,
            body,
            retry_after_secs: header_u64(&headers, "retry-after"),
            rate_limit_remaining: header_u64(&headers, "x-ratelimit-remaining"),
        })
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
