//! JiraClient against a mock HTTP server.

mod common;

use common::{
    client, client_with_retries, issue_body, limited_client, not_found_body, BASIC_HEADER,
};
use jira_lib_rust::{ApiClient, Error, JiraApiExt, JiraClient};
use mockito::Matcher;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_get_issue_sends_basic_auth() {
    let mut server = common::server().await;
    let mock = server
        .mock("GET", "/rest/api/3/issue/PROJ-1")
        .match_header("authorization", BASIC_HEADER)
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(issue_body("PROJ-1", "To Do", "First"))
        .create_async()
        .await;

    let issue = client(&server).get_issue("PROJ-1", None).await.unwrap();
    assert_eq!(issue["key"], "PROJ-1");
    assert_eq!(issue["fields"]["summary"], "First");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_bearer_token_for_personal_access_tokens() {
    let mut server = common::server().await;
    let mock = server
        .mock("GET", "/rest/api/3/myself")
        .match_header("authorization", "Bearer pat-123")
        .with_status(200)
        .with_body(r#"{"accountId":"abc"}"#)
        .create_async()
        .await;

    let client = JiraClient::builder()
        .base_url(server.url())
        .bearer_auth("pat-123")
        .build()
        .unwrap();
    assert_eq!(client.myself().await.unwrap()["accountId"], "abc");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_not_found_is_classified_and_not_retried() {
    let mut server = common::server().await;
    let mock = server
        .mock("GET", "/rest/api/3/issue/PROJ-404")
        .with_status(404)
        .with_body(not_found_body())
        .expect(1)
        .create_async()
        .await;

    let err = client(&server).get_issue("PROJ-404", None).await.unwrap_err();
    match &err {
        Error::Remote {
            status,
            class,
            message,
            retryable,
            ..
        } => {
            assert_eq!(*status, 404);
            assert_eq!(class, "not_found");
            assert!(message.starts_with("Issue does not exist"));
            assert!(!retryable);
        }
        other => panic!("unexpected error: {other}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let mut server = common::server().await;
    let unavailable = server
        .mock("GET", "/rest/api/3/issue/PROJ-2")
        .with_status(503)
        .with_body("upstream unavailable")
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/rest/api/3/issue/PROJ-2")
        .with_status(200)
        .with_body(issue_body("PROJ-2", "Done", "Second"))
        .expect(1)
        .create_async()
        .await;

    let issue = client(&server).get_issue("PROJ-2", None).await.unwrap();
    assert_eq!(issue["key"], "PROJ-2");
    unavailable.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_max_retries() {
    let mut server = common::server().await;
    let mock = server
        .mock("GET", "/rest/api/3/myself")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(r#"{"errorMessages":["Rate limit exceeded"]}"#)
        .expect(2)
        .create_async()
        .await;

    let err = client_with_retries(&server, 1).myself().await.unwrap_err();
    assert_eq!(err.status(), Some(429));
    assert!(err.is_retryable());
    assert_eq!(err.retry_after_ms(), Some(0));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_no_content_decodes_to_null() {
    let mut server = common::server().await;
    let mock = server
        .mock("POST", "/rest/api/3/issue/PROJ-3/transitions")
        .match_body(Matcher::Json(json!({"transition": {"id": "31"}})))
        .with_status(204)
        .create_async()
        .await;

    let v = client(&server).transition_issue("PROJ-3", "31").await.unwrap();
    assert_eq!(v, Value::Null);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_search_encodes_query() {
    let mut server = common::server().await;
    let mock = server
        .mock("GET", "/rest/api/3/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("jql".into(), "project = PROJ AND status = \"In Progress\"".into()),
            Matcher::UrlEncoded("startAt".into(), "0".into()),
            Matcher::UrlEncoded("maxResults".into(), "10".into()),
            Matcher::UrlEncoded("fields".into(), "summary,status".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"total":0,"issues":[]}"#)
        .create_async()
        .await;

    let page = client(&server)
        .search_issues(
            "project = PROJ AND status = \"In Progress\"",
            0,
            10,
            Some(&["summary", "status"]),
        )
        .await
        .unwrap();
    assert_eq!(page["total"], 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_comment_body_is_adf() {
    let mut server = common::server().await;
    let mock = server
        .mock("POST", "/rest/api/3/issue/PROJ-4/comment")
        .match_body(Matcher::PartialJson(json!({
            "body": {
                "type": "doc",
                "version": 1,
                "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Looks good"}]}]
            }
        })))
        .with_status(201)
        .with_body(r#"{"id":"100"}"#)
        .create_async()
        .await;

    let created = client(&server).add_comment("PROJ-4", "Looks good").await.unwrap();
    assert_eq!(created["id"], "100");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_patch_is_sent_over_http() {
    let mut server = common::server().await;
    let mock = server
        .mock("PATCH", "/rest/api/3/custom")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let v = client(&server)
        .patch("/rest/api/3/custom", Some(&json!({"a": 1})))
        .await
        .unwrap();
    assert_eq!(v, json!({}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // port 9 (discard) is closed on test machines
    let client = JiraClient::builder()
        .base_url("http://127.0.0.1:9")
        .bearer_auth("t")
        .retry_policy(jira_lib_rust::client::RetryPolicy::none())
        .build()
        .unwrap();
    let err = client.myself().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_rate_limit_pause_is_capped_by_retry_delay() {
    let mut server = common::server().await;
    let limited = server
        .mock("GET", "/rest/api/3/myself")
        .with_status(429)
        .with_header("retry-after", "3600")
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/rest/api/3/issue/PROJ-5")
        .with_status(200)
        .with_body(issue_body("PROJ-5", "Open", "Fifth"))
        .create_async()
        .await;

    let client = limited_client(&server, 100.0, Duration::from_millis(50));
    let err = client.myself().await.unwrap_err();
    assert_eq!(err.status(), Some(429));

    let start = Instant::now();
    let issue = client.get_issue("PROJ-5", None).await.unwrap();
    assert_eq!(issue["key"], "PROJ-5");
    assert!(start.elapsed() < Duration::from_secs(2));
    limited.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_oversized_retry_after_does_not_panic() {
    let mut server = common::server().await;
    let limited = server
        .mock("GET", "/rest/api/3/myself")
        .with_status(429)
        .with_header("retry-after", "18446744073709551615")
        .create_async()
        .await;
    let missing = server
        .mock("GET", "/rest/api/3/issue/PROJ-6")
        .with_status(404)
        .with_header("retry-after", "18446744073709551615")
        .with_body(not_found_body())
        .create_async()
        .await;

    let client = limited_client(&server, 50.0, Duration::from_millis(50));
    let err = client.myself().await.unwrap_err();
    assert_eq!(err.status(), Some(429));
    assert_eq!(err.retry_after_ms(), Some(u64::MAX));

    let err = client.get_issue("PROJ-6", None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    limited.assert_async().await;
    missing.assert_async().await;
}

#[tokio::test]
async fn test_retry_after_on_client_error_does_not_pause() {
    let mut server = common::server().await;
    let missing = server
        .mock("GET", "/rest/api/3/issue/PROJ-7")
        .with_status(404)
        .with_header("retry-after", "3600")
        .with_body(not_found_body())
        .create_async()
        .await;
    let me = server
        .mock("GET", "/rest/api/3/myself")
        .with_status(200)
        .with_body(r#"{"accountId":"abc"}"#)
        .create_async()
        .await;

    // default 30s cap would still stall the next call if 404 paused the limiter
    let client = limited_client(&server, 100.0, Duration::from_secs(30));
    assert!(client.get_issue("PROJ-7", None).await.is_err());

    let start = Instant::now();
    assert_eq!(client.myself().await.unwrap()["accountId"], "abc");
    assert!(start.elapsed() < Duration::from_secs(2));
    missing.assert_async().await;
    me.assert_async().await;
}

#[tokio::test]
async fn test_exhausted_budget_pauses_next_call() {
    let mut server = common::server().await;
    let me = server
        .mock("GET", "/rest/api/3/myself")
        .with_status(200)
        .with_header("x-ratelimit-remaining", "0")
        .with_body(r#"{"accountId":"abc"}"#)
        .expect(2)
        .create_async()
        .await;

    let client = limited_client(&server, 100.0, Duration::from_secs(30));
    client.myself().await.unwrap();

    let start = Instant::now();
    client.myself().await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(900));
    me.assert_async().await;
}
