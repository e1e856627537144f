//! # Resilience Primitives
//!
//! JIRA Cloud throttles aggressive clients with HTTP 429 and `Retry-After`.
//! The [`rate_limiter`] keeps a [`crate::client::JiraClient`] under a
//! configured request rate and pauses it whenever the server asks to back off.
//!
//! ```rust
//! use jira_lib_rust::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! # async fn demo() {
//! let limiter = RateLimiter::new(RateLimiterConfig::from_rps(5.0).unwrap());
//! limiter.acquire().await;
//! # }
//! ```
//!
//! Retries themselves live in [`crate::client::RetryPolicy`]; the batcher never retries.

pub mod rate_limiter;
