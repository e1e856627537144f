//! Shared fixtures for HTTP-level tests.

#![allow(dead_code)]

use jira_lib_rust::client::RetryPolicy;
use jira_lib_rust::JiraClient;
use mockito::{Server, ServerGuard};
use serde_json::json;
use std::time::Duration;

pub const EMAIL: &str = "dev@example.com";
pub const TOKEN: &str = "secret";
/// base64("dev@example.com:secret")
pub const BASIC_HEADER: &str = "Basic ZGV2QGV4YW1wbGUuY29tOnNlY3JldA==";

pub async fn server() -> ServerGuard {
    Server::new_async().await
}

/// Client against the mock server with fast retries.
pub fn client(server: &ServerGuard) -> JiraClient {
    client_with_retries(server, 2)
}

pub fn client_with_retries(server: &ServerGuard, retries: u32) -> JiraClient {
    JiraClient::builder()
        .base_url(server.url())
        .basic_auth(EMAIL, TOKEN)
        .timeout(Duration::from_secs(5))
        .retry_policy(RetryPolicy::new(retries).with_min_delay(Duration::from_millis(10)))
        .build()
        .unwrap()
}

pub fn issue_body(key: &str, status: &str, summary: &str) -> String {
    json!({
        "id": "10001",
        "key": key,
        "fields": {
            "summary": summary,
            "status": { "name": status }
        }
    })
    .to_string()
}

pub fn not_found_body() -> String {
    json!({
        "errorMessages": ["Issue does not exist or you do not have permission to see it."],
        "errors": {}
    })
    .to_string()
}

/// Client with the rate limiter on and no retries; server pauses are capped at `max_delay`.
pub fn limited_client(server: &ServerGuard, rps: f64, max_delay: Duration) -> JiraClient {
    JiraClient::builder()
        .base_url(server.url())
        .basic_auth(EMAIL, TOKEN)
        .timeout(Duration::from_secs(5))
        .rate_limit_rps(rps)
        .retry_policy(RetryPolicy::none().with_max_delay(max_delay))
        .build()
        .unwrap()
}
