//! JIRA client.
//!
//! The public surface is small: [`ApiClient`] is the contract the batcher
//! consumes, [`JiraClient`] is the HTTP implementation, and [`JiraApiExt`]
//! layers typed endpoint helpers over any `ApiClient`.
//! Implementation details are split into submodules under `src/client/`.

mod api;
pub mod builder;
pub mod core;
pub mod endpoints;
mod error_classification;
pub mod metadata;
pub mod retry;

pub use api::ApiClient;
pub use builder::JiraClientBuilder;
pub use core::JiraClient;
pub use endpoints::{fetch_issues, validate_issue_key, IssueBatch, JiraApiExt};
pub use metadata::{MetadataCache, MetadataCategory};
pub use retry::RetryPolicy;
