//! Error classification logic

use crate::transport::RawResponse;
use crate::Error;

/// Map an HTTP status to a stable error class name.
pub(crate) fn error_class_for_status(status: u16) -> &'static str {
    match status {
        400 => "invalid_request",
        401 => "authentication",
        403 => "permission_denied",
        404 => "not_found",
        409 => "conflict",
        413 => "request_too_large",
        429 => "rate_limited",
        500..=599 => "server_error",
        _ => "http_error",
    }
}

/// Statuses worth repeating: throttling and transient server failures.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Pull a readable message out of a JIRA error body.
///
/// JIRA reports failures as `{"errorMessages": [...], "errors": {field: msg}}`;
/// anything else is returned trimmed as-is.
pub(crate) fn remote_message(body: &str) -> String {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return body.trim().to_string(),
    };

    let mut parts: Vec<String> = json
        .get("errorMessages")
        .and_then(|v| v.as_array())
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    if let Some(errors) = json.get("errors").and_then(|v| v.as_object()) {
        for (field, msg) in errors {
            let msg = msg.as_str().map(str::to_string).unwrap_or_else(|| msg.to_string());
            parts.push(format!("{field}: {msg}"));
        }
    }

    if parts.is_empty() {
        body.trim().to_string()
    } else {
        parts.join("; ")
    }
}

pub(crate) fn remote_error(resp: &RawResponse) -> Error {
    Error::Remote {
        status: resp.status,
        class: error_class_for_status(resp.status).to_string(),
        message: remote_message(&resp.body),
        retryable: is_retryable_status(resp.status),
        retry_after_ms: resp.retry_after_secs.map(|s| s.saturating_mul(1000)),
    }
}
