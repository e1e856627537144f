//! # Request batching
//!
//! Fan out many JIRA REST calls with bounded concurrency and collect one
//! result per call, successful or not.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestBatcher`] | Queues requests and executes them behind a semaphore |
//! | [`BatchRequest`] | One queued call |
//! | [`RequestResult`] | Success payload or captured error for one call |
//! | [`BatchResult`] | All results of one execution plus timing |
//! | [`RequestId`] | Opaque id returned by `add` |
//!
//! A failure (HTTP error, timeout, unsupported verb) is recorded on that
//! request's result and never cancels the rest of the batch. Retrying is the
//! client's concern; the batcher calls each request exactly once.

mod executor;
mod request;

pub use executor::{BatchResult, ProgressCallback, RequestBatcher, DEFAULT_MAX_CONCURRENT};
pub use request::{BatchRequest, RequestId, RequestResult};
