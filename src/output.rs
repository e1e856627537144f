//! Rendering of JIRA payloads and batch results for the terminal.

use crate::adf::adf_to_text;
use crate::batch::{BatchResult, RequestResult};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const SUMMARY_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Text,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            other => Err(Error::validation(format!(
                "unknown output format '{other}' (expected json or text)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        })
    }
}

/// `KEY  [status]  summary`
pub fn issue_line(issue: &Value) -> String {
    let key = issue.get("key").and_then(Value::as_str).unwrap_or("-");
    let status = issue
        .pointer("/fields/status/name")
        .and_then(Value::as_str)
        .unwrap_or("-");
    let summary = issue
        .pointer("/fields/summary")
        .and_then(Value::as_str)
        .unwrap_or("");
    format!("{key}  [{status}]  {summary}")
}

fn is_issue(v: &Value) -> bool {
    v.get("key").is_some() && v.get("fields").is_some()
}

fn str_at<'a>(v: &'a Value, pointer: &str) -> &'a str {
    v.pointer(pointer).and_then(Value::as_str).unwrap_or("-")
}

pub fn render_value(value: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Text => render_text(value),
    }
}

fn render_text(value: &Value) -> Result<String> {
    if let Some(s) = value.as_str() {
        return Ok(s.to_string());
    }
    if value.is_null() {
        return Ok(String::new());
    }
    if is_issue(value) {
        let mut out = issue_line(value);
        if let Some(desc) = value.pointer("/fields/description").filter(|d| !d.is_null()) {
            out.push_str("\n\n");
            out.push_str(&adf_to_text(desc));
        }
        return Ok(out);
    }
    // search results
    if let Some(issues) = value.get("issues").and_then(Value::as_array) {
        let mut lines: Vec<String> = issues.iter().map(issue_line).collect();
        if let Some(total) = value.get("total").and_then(Value::as_u64) {
            lines.push(format!("{} of {} issues", issues.len(), total));
        }
        return Ok(lines.join("\n"));
    }
    if let Some(comments) = value.get("comments").and_then(Value::as_array) {
        let blocks: Vec<String> = comments
            .iter()
            .map(|c| {
                format!(
                    "{}  {}\n{}",
                    str_at(c, "/author/displayName"),
                    str_at(c, "/created"),
                    adf_to_text(c.get("body").unwrap_or(&Value::Null))
                )
            })
            .collect();
        return Ok(blocks.join("\n\n"));
    }
    if let Some(worklogs) = value.get("worklogs").and_then(Value::as_array) {
        let lines: Vec<String> = worklogs
            .iter()
            .map(|w| {
                format!(
                    "{}  {}  {}",
                    str_at(w, "/author/displayName"),
                    str_at(w, "/timeSpent"),
                    str_at(w, "/started")
                )
            })
            .collect();
        return Ok(lines.join("\n"));
    }
    if let Some(transitions) = value.get("transitions").and_then(Value::as_array) {
        let lines: Vec<String> = transitions
            .iter()
            .map(|t| format!("{}  {}", str_at(t, "/id"), str_at(t, "/name")))
            .collect();
        return Ok(lines.join("\n"));
    }
    // agile pages: boards and sprints
    if let Some(values) = value.get("values").and_then(Value::as_array) {
        return Ok(values.iter().map(entity_line).collect::<Vec<_>>().join("\n"));
    }
    if let Some(items) = value.as_array() {
        return Ok(items.iter().map(entity_line).collect::<Vec<_>>().join("\n"));
    }
    Ok(serde_json::to_string_pretty(value)?)
}

/// `id  [state]  name` for sprints, boards, filters and fields.
fn entity_line(v: &Value) -> String {
    if is_issue(v) {
        return issue_line(v);
    }
    let id = match v.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "-".to_string(),
    };
    let name = v
        .get("name")
        .or_else(|| v.get("displayName"))
        .and_then(Value::as_str)
        .unwrap_or("");
    match v
        .get("state")
        .or_else(|| v.get("type"))
        .and_then(Value::as_str)
    {
        Some(state) => format!("{id}  [{state}]  {name}"),
        None => format!("{id}  {name}"),
    }
}

fn summarize(result: &RequestResult) -> String {
    if let Some(err) = &result.error {
        return err.clone();
    }
    match &result.data {
        Some(v) if is_issue(v) => issue_line(v),
        Some(Value::Null) | None => String::new(),
        Some(v) => {
            let compact = v.to_string();
            if compact.chars().count() > SUMMARY_WIDTH {
                let cut: String = compact.chars().take(SUMMARY_WIDTH - 3).collect();
                format!("{cut}...")
            } else {
                compact
            }
        }
    }
}

/// JSON: an object keyed by request id (sorted). Text: one line per request and a footer.
pub fn render_batch(result: &BatchResult, format: OutputFormat) -> Result<String> {
    let sorted: BTreeMap<&str, &RequestResult> = result
        .results
        .iter()
        .map(|(id, r)| (id.as_str(), r))
        .collect();

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&sorted)?),
        OutputFormat::Text => {
            let mut lines: Vec<String> = sorted
                .values()
                .map(|r| {
                    let status = if r.success { "OK" } else { "FAIL" };
                    format!(
                        "{:<4}  {} {}  {}",
                        status,
                        r.method,
                        r.endpoint,
                        summarize(r)
                    )
                    .trim_end()
                    .to_string()
                })
                .collect();
            lines.push(format!(
                "{} succeeded, {} failed",
                result.success_count(),
                result.failure_count()
            ));
            Ok(lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchRequest, RequestId};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn issue(key: &str, status: &str, summary: &str) -> Value {
        json!({"key": key, "fields": {"status": {"name": status}, "summary": summary}})
    }

    fn request(id: &str, endpoint: &str) -> BatchRequest {
        BatchRequest {
            id: serde_json::from_value::<RequestId>(json!(id)).unwrap(),
            method: "GET".into(),
            endpoint: endpoint.into(),
            params: None,
            data: None,
        }
    }

    fn sample_batch() -> BatchResult {
        let ok = request("a", "/rest/api/3/issue/PROJ-1");
        let bad = request("b", "/rest/api/3/issue/PROJ-2");
        let mut results = HashMap::new();
        results.insert(
            ok.id.clone(),
            RequestResult::succeeded(&ok, issue("PROJ-1", "Done", "Ship it")),
        );
        results.insert(
            bad.id.clone(),
            RequestResult::failed(&bad, "Remote error: HTTP 404 (not_found): gone"),
        );
        BatchResult {
            results,
            execution_time: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn test_issue_line() {
        assert_eq!(
            issue_line(&issue("PROJ-9", "In Progress", "Fix login")),
            "PROJ-9  [In Progress]  Fix login"
        );
        assert_eq!(issue_line(&json!({})), "-  [-]  ");
    }

    #[test]
    fn test_render_batch_text() {
        let text = render_batch(&sample_batch(), OutputFormat::Text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "OK    GET /rest/api/3/issue/PROJ-1  PROJ-1  [Done]  Ship it",
                "FAIL  GET /rest/api/3/issue/PROJ-2  Remote error: HTTP 404 (not_found): gone",
                "1 succeeded, 1 failed",
            ]
        );
    }

    #[test]
    fn test_render_batch_json_is_sorted_by_id() {
        let text = render_batch(&sample_batch(), OutputFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["a"]["success"], true);
        assert_eq!(parsed["b"]["success"], false);
        assert_eq!(parsed["b"]["request_id"], "b");
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn test_render_search_results() {
        let page = json!({
            "total": 10,
            "issues": [issue("PROJ-1", "To Do", "one"), issue("PROJ-2", "Done", "two")]
        });
        assert_eq!(
            render_value(&page, OutputFormat::Text).unwrap(),
            "PROJ-1  [To Do]  one\nPROJ-2  [Done]  two\n2 of 10 issues"
        );
    }

    #[test]
    fn test_render_sprints_and_comments() {
        let sprints = json!({"values": [{"id": 5, "name": "Sprint 5", "state": "active"}]});
        assert_eq!(
            render_value(&sprints, OutputFormat::Text).unwrap(),
            "5  [active]  Sprint 5"
        );

        let comments = json!({"comments": [{
            "author": {"displayName": "Ada"},
            "created": "2024-01-01",
            "body": {"type": "doc", "version": 1, "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "LGTM"}]}
            ]}
        }]});
        assert_eq!(
            render_value(&comments, OutputFormat::Text).unwrap(),
            "Ada  2024-01-01\nLGTM"
        );
    }

    #[test]
    fn test_render_null_and_json() {
        assert_eq!(render_value(&Value::Null, OutputFormat::Text).unwrap(), "");
        assert_eq!(
            render_value(&json!({"a": 1}), OutputFormat::Json).unwrap(),
            "{\n  \"a\": 1\n}"
        );
    }
}
