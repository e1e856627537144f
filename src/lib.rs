//! # jira-lib-rust
//!
//! JIRA REST toolkit built around a bounded-concurrency request batcher.
//!
//! ## Overview
//!
//! Bulk JIRA work (fetching dozens of issues, replaying a list of updates)
//! is dominated by round-trip latency. [`RequestBatcher`] queues REST calls
//! and runs them concurrently behind a semaphore, recording one success or
//! failure per call so a single bad request never sinks the batch.
//!
//! ## Key Features
//!
//! - **Batching**: [`batch::RequestBatcher`] with progress reporting and per-request failure capture
//! - **Client**: [`JiraClient`] with Basic (API token) or Bearer (PAT) auth, retries and backoff
//! - **Endpoints**: typed helpers for issues, comments, worklogs, sprints and filters via [`client::JiraApiExt`]
//! - **Caching**: metadata caching with TTLs and category eviction via the [`cache`] module
//! - **Rate limiting**: a token bucket that honours JIRA's `Retry-After` via [`resilience`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jira_lib_rust::{JiraClient, RequestBatcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> jira_lib_rust::Result<()> {
//!     let client = JiraClient::builder()
//!         .base_url("https://example.atlassian.net")
//!         .basic_auth("dev@example.com", "api-token")
//!         .build()?;
//!
//!     let mut batcher = RequestBatcher::new(Arc::new(client), 5)?;
//!     for key in ["PROJ-1", "PROJ-2", "PROJ-3"] {
//!         batcher.add("GET", format!("/rest/api/3/issue/{key}"), None, None);
//!     }
//!     let progress = |done: usize, total: usize| eprintln!("{done}/{total}");
//!     let result = batcher.execute(Some(&progress)).await;
//!     println!("{} ok, {} failed", result.success_count(), result.failure_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Request batching and bounded-concurrency execution |
//! | [`client`] | `ApiClient` contract, `JiraClient`, endpoint helpers, cached metadata |
//! | [`transport`] | reqwest transport and authentication |
//! | [`resilience`] | Rate limiting |
//! | [`cache`] | TTL cache with memory, file and null backends |
//! | [`adf`] | Plain text and Atlassian Document Format conversion |
//! | [`config`] | YAML, environment and keyring configuration |
//! | [`output`] | JSON and text rendering |
//! | [`types`] | Shared request primitives |

pub mod adf;
pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod output;
pub mod resilience;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use batch::{BatchResult, RequestBatcher, RequestId, RequestResult};
pub use client::{ApiClient, JiraApiExt, JiraClient, JiraClientBuilder};
pub use config::JiraConfig;
pub use types::{HttpMethod, QueryParams};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
