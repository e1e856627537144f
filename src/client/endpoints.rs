//! Typed JIRA REST v3 and Agile 1.0 endpoint helpers.
//!
//! These are thin wrappers: they build the path, query and body, and hand the
//! raw JSON back. Any [`ApiClient`] gets them through [`JiraApiExt`].

use super::api::ApiClient;
use super::core::JiraClient;
use crate::adf::text_to_adf;
use crate::batch::{BatchResult, ProgressCallback, RequestBatcher, RequestId, RequestResult};
use crate::types::QueryParams;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

pub const API_PREFIX: &str = "/rest/api/3";
pub const AGILE_PREFIX: &str = "/rest/agile/1.0";

static ISSUE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*-[0-9]+$").expect("issue key pattern is valid"));

/// Accepts `PROJ-123` style keys and numeric issue ids.
pub fn validate_issue_key(key: &str) -> Result<()> {
    let numeric = !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit());
    let keyed = ISSUE_KEY.is_match(key);
    if numeric || keyed {
        return Ok(());
    }
    Err(Error::validation_with_context(
        format!("invalid issue key '{key}'"),
        ErrorContext::new()
            .with_field_path("issue_key")
            .with_details("expected PROJECT-123 or a numeric id"),
    ))
}

pub fn issue_path(key: &str) -> String {
    format!("{API_PREFIX}/issue/{key}")
}

fn fields_param(params: &mut QueryParams, fields: Option<&[&str]>) {
    if let Some(fields) = fields.filter(|f| !f.is_empty()) {
        params.insert("fields".into(), fields.join(","));
    }
}

fn non_empty(params: &QueryParams) -> Option<&QueryParams> {
    (!params.is_empty()).then_some(params)
}

#[async_trait]
pub trait JiraApiExt: ApiClient {
    async fn get_issue(&self, key: &str, fields: Option<&[&str]>) -> Result<Value> {
        validate_issue_key(key)?;
        let mut params = QueryParams::new();
        fields_param(&mut params, fields);
        self.get(&issue_path(key), non_empty(&params)).await
    }

    /// `fields` is the JIRA `fields` object, e.g. `{"project": {"key": "PROJ"}, "summary": "..."}`.
    async fn create_issue(&self, fields: Value) -> Result<Value> {
        let body = json!({ "fields": fields });
        self.post(&format!("{API_PREFIX}/issue"), Some(&body)).await
    }

    async fn update_issue(&self, key: &str, fields: Value) -> Result<Value> {
        validate_issue_key(key)?;
        let body = json!({ "fields": fields });
        self.put(&issue_path(key), Some(&body)).await
    }

    async fn delete_issue(&self, key: &str) -> Result<Value> {
        validate_issue_key(key)?;
        self.delete(&issue_path(key)).await
    }

    async fn search_issues(
        &self,
        jql: &str,
        start_at: u32,
        max_results: u32,
        fields: Option<&[&str]>,
    ) -> Result<Value> {
        let mut params = QueryParams::new();
        params.insert("jql".into(), jql.to_string());
        params.insert("startAt".into(), start_at.to_string());
        params.insert("maxResults".into(), max_results.to_string());
        fields_param(&mut params, fields);
        self.get(&format!("{API_PREFIX}/search"), Some(&params)).await
    }

    async fn get_transitions(&self, key: &str) -> Result<Value> {
        validate_issue_key(key)?;
        self.get(&format!("{}/transitions", issue_path(key)), None)
            .await
    }

    async fn transition_issue(&self, key: &str, transition_id: &str) -> Result<Value> {
        validate_issue_key(key)?;
        let body = json!({ "transition": { "id": transition_id } });
        self.post(&format!("{}/transitions", issue_path(key)), Some(&body))
            .await
    }

    /// Assign to an Atlassian account id. `None` unassigns.
    async fn assign_issue(&self, key: &str, account_id: Option<&str>) -> Result<Value> {
        validate_issue_key(key)?;
        let body = json!({ "accountId": account_id });
        self.put(&format!("{}/assignee", issue_path(key)), Some(&body))
            .await
    }

    async fn get_comments(&self, key: &str) -> Result<Value> {
        validate_issue_key(key)?;
        self.get(&format!("{}/comment", issue_path(key)), None).await
    }

    /// Plain text is converted to ADF before sending.
    async fn add_comment(&self, key: &str, text: &str) -> Result<Value> {
        validate_issue_key(key)?;
        let body = json!({ "body": text_to_adf(text) });
        self.post(&format!("{}/comment", issue_path(key)), Some(&body))
            .await
    }

    async fn get_worklogs(&self, key: &str) -> Result<Value> {
        validate_issue_key(key)?;
        self.get(&format!("{}/worklog", issue_path(key)), None).await
    }

    /// `time_spent` uses JIRA duration syntax such as `1h 30m`.
    async fn add_worklog(
        &self,
        key: &str,
        time_spent: &str,
        comment: Option<&str>,
    ) -> Result<Value> {
        validate_issue_key(key)?;
        if time_spent.trim().is_empty() {
            return Err(Error::validation_with_context(
                "time spent must not be empty",
                ErrorContext::new().with_field_path("time_spent"),
            ));
        }
        let mut body = json!({ "timeSpent": time_spent });
        if let Some(text) = comment {
            body["comment"] = text_to_adf(text);
        }
        self.post(&format!("{}/worklog", issue_path(key)), Some(&body))
            .await
    }

    async fn get_board(&self, board_id: u64) -> Result<Value> {
        self.get(&format!("{AGILE_PREFIX}/board/{board_id}"), None)
            .await
    }

    /// `state` filters by `future`, `active` or `closed` (comma-separated allowed).
    async fn get_board_sprints(&self, board_id: u64, state: Option<&str>) -> Result<Value> {
        let mut params = QueryParams::new();
        if let Some(state) = state {
            params.insert("state".into(), state.to_string());
        }
        self.get(
            &format!("{AGILE_PREFIX}/board/{board_id}/sprint"),
            non_empty(&params),
        )
        .await
    }

    async fn get_sprint(&self, sprint_id: u64) -> Result<Value> {
        self.get(&format!("{AGILE_PREFIX}/sprint/{sprint_id}"), None)
            .await
    }

    async fn get_sprint_issues(&self, sprint_id: u64) -> Result<Value> {
        self.get(&format!("{AGILE_PREFIX}/sprint/{sprint_id}/issue"), None)
            .await
    }

    async fn move_issues_to_sprint(&self, sprint_id: u64, keys: &[&str]) -> Result<Value> {
        if keys.is_empty() {
            return Err(Error::validation_with_context(
                "no issues to move",
                ErrorContext::new().with_field_path("issues"),
            ));
        }
        for key in keys {
            validate_issue_key(key)?;
        }
        let body = json!({ "issues": keys });
        self.post(
            &format!("{AGILE_PREFIX}/sprint/{sprint_id}/issue"),
            Some(&body),
        )
        .await
    }

    async fn get_filter(&self, filter_id: u64) -> Result<Value> {
        self.get(&format!("{API_PREFIX}/filter/{filter_id}"), None)
            .await
    }

    async fn get_favourite_filters(&self) -> Result<Value> {
        self.get(&format!("{API_PREFIX}/filter/favourite"), None)
            .await
    }

    async fn myself(&self) -> Result<Value> {
        self.get(&format!("{API_PREFIX}/myself"), None).await
    }
}

impl<T: ApiClient + ?Sized> JiraApiExt for T {}

/// Results of a bulk issue fetch, with the key each request was made for.
#[derive(Debug, Clone)]
pub struct IssueBatch {
    pub result: BatchResult,
    /// Input order is preserved.
    pub keys: Vec<(String, RequestId)>,
}

impl IssueBatch {
    pub fn issue(&self, key: &str) -> Option<&RequestResult> {
        self.keys
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, id)| self.result.get(id))
    }

    /// Results paired with their keys, in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RequestResult)> {
        self.keys
            .iter()
            .filter_map(|(k, id)| self.result.get(id).map(|r| (k.as_str(), r)))
    }
}

/// Fetch many issues concurrently through a [`RequestBatcher`].
///
/// Every key is validated before any request is sent.
pub async fn fetch_issues(
    client: Arc<dyn ApiClient>,
    keys: &[String],
    fields: Option<&[&str]>,
    max_concurrent: usize,
    progress: Option<&ProgressCallback<'_>>,
) -> Result<IssueBatch> {
    for key in keys {
        validate_issue_key(key)?;
    }
    let mut params = QueryParams::new();
    fields_param(&mut params, fields);
    let params = if params.is_empty() { None } else { Some(params) };

    let mut batcher = RequestBatcher::new(client, max_concurrent)?;
    let ids = keys
        .iter()
        .map(|key| {
            let id = batcher.add("GET", issue_path(key), params.clone(), None);
            (key.clone(), id)
        })
        .collect();
    let result = batcher.execute(progress).await;
    Ok(IssueBatch { result, keys: ids })
}

impl JiraClient {
    /// Bulk [`get_issue`](JiraApiExt::get_issue) with bounded concurrency.
    pub async fn get_issues(
        &self,
        keys: &[String],
        max_concurrent: usize,
        progress: Option<&ProgressCallback<'_>>,
    ) -> Result<IssueBatch> {
        fetch_issues(
            Arc::new(self.clone()),
            keys,
            None,
            max_concurrent,
            progress,
        )
        .await
    }
}
