//! Request and result records.

use crate::types::QueryParams;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque identifier handed out by [`super::RequestBatcher::add`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One queued call. The verb is kept verbatim; it is only checked at dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub id: RequestId,
    pub method: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<QueryParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outcome of one request. Exactly one of `data` / `error` is meaningful.
#[derive(Debug, Clone, Serialize)]
pub struct RequestResult {
    pub request_id: RequestId,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub method: String,
    pub endpoint: String,
}

impl RequestResult {
    pub(crate) fn succeeded(req: &BatchRequest, data: Value) -> Self {
        Self {
            request_id: req.id.clone(),
            success: true,
            data: Some(data),
            error: None,
            method: req.method.clone(),
            endpoint: req.endpoint.clone(),
        }
    }

    pub(crate) fn failed(req: &BatchRequest, error: impl Into<String>) -> Self {
        Self {
            request_id: req.id.clone(),
            success: false,
            data: None,
            error: Some(error.into()),
            method: req.method.clone(),
            endpoint: req.endpoint.clone(),
        }
    }
}
