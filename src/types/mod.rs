//! Shared request primitives.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HttpMethod`] | Verbs dispatchable by [`crate::client::ApiClient`] |
//! | [`QueryParams`] | Ordered query-string mapping |

pub mod method;

pub use method::HttpMethod;

use std::collections::BTreeMap;

/// Query-string parameters. Ordered so that generated URLs and cache keys are stable.
pub type QueryParams = BTreeMap<String, String>;
