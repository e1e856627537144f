//! RequestBatcher driving a real JiraClient against a mock server.

mod common;

use common::{client, issue_body, limited_client, not_found_body};
use jira_lib_rust::cache::{CacheConfig, CacheManager, FileCache};
use jira_lib_rust::client::{MetadataCache, MetadataCategory};
use jira_lib_rust::RequestBatcher;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_mixed_batch_over_http() {
    let mut server = common::server().await;
    let mut mocks = Vec::new();
    for key in ["PROJ-1", "PROJ-2"] {
        mocks.push(
            server
                .mock("GET", format!("/rest/api/3/issue/{key}").as_str())
                .with_status(200)
                .with_body(issue_body(key, "Open", key))
                .create_async()
                .await,
        );
    }
    mocks.push(
        server
            .mock("GET", "/rest/api/3/issue/PROJ-3")
            .with_status(404)
            .with_body(not_found_body())
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("PUT", "/rest/api/3/issue/PROJ-1")
            .match_body(mockito::Matcher::Json(json!({"fields": {"summary": "renamed"}})))
            .with_status(204)
            .create_async()
            .await,
    );

    let mut batcher = RequestBatcher::new(Arc::new(client(&server)), 2).unwrap();
    let one = batcher.add("GET", "/rest/api/3/issue/PROJ-1", None, None);
    let two = batcher.add("GET", "/rest/api/3/issue/PROJ-2", None, None);
    let missing = batcher.add("GET", "/rest/api/3/issue/PROJ-3", None, None);
    let rename = batcher.add(
        "PUT",
        "/rest/api/3/issue/PROJ-1",
        None,
        Some(json!({"fields": {"summary": "renamed"}})),
    );

    let ticks = AtomicUsize::new(0);
    let progress = |done: usize, total: usize| {
        assert_eq!(total, 4);
        ticks.fetch_add(1, Ordering::SeqCst);
        assert!(done <= total);
    };
    let result = batcher.execute(Some(&progress)).await;

    assert_eq!(result.len(), 4);
    assert_eq!(ticks.load(Ordering::SeqCst), 4);
    assert_eq!(result.get(&one).unwrap().data.as_ref().unwrap()["key"], "PROJ-1");
    assert_eq!(result.get(&two).unwrap().data.as_ref().unwrap()["key"], "PROJ-2");
    assert!(result.get(&rename).unwrap().success);
    assert_eq!(result.get(&rename).unwrap().data, Some(serde_json::Value::Null));

    let missing = result.get(&missing).unwrap();
    assert!(!missing.success);
    assert!(missing.error.as_deref().unwrap().contains("HTTP 404"));
    assert_eq!(result.success_count(), 3);

    for m in mocks {
        m.assert_async().await;
    }
}

#[tokio::test]
async fn test_get_issues_pairs_keys_with_results() {
    let mut server = common::server().await;
    let _a = server
        .mock("GET", "/rest/api/3/issue/ABC-1")
        .with_status(200)
        .with_body(issue_body("ABC-1", "Done", "Alpha"))
        .create_async()
        .await;
    let _b = server
        .mock("GET", "/rest/api/3/issue/ABC-2")
        .with_status(404)
        .with_body(not_found_body())
        .create_async()
        .await;

    let keys = vec!["ABC-1".to_string(), "ABC-2".to_string()];
    let batch = client(&server).get_issues(&keys, 4, None).await.unwrap();

    assert!(batch.issue("ABC-1").unwrap().success);
    assert!(!batch.issue("ABC-2").unwrap().success);
    assert!(!batch.result.all_succeeded());
}

#[tokio::test]
async fn test_field_metadata_persists_in_file_cache() {
    let mut server = common::server().await;
    let fields = server
        .mock("GET", "/rest/api/3/field")
        .with_status(200)
        .with_body(r#"[{"id":"customfield_10016","name":"Story Points"}]"#)
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(client(&server));
    let open = || {
        Arc::new(CacheManager::new(
            CacheConfig::new(),
            Box::new(FileCache::new(dir.path())),
        ))
    };

    // first process: miss, then hit
    let meta = MetadataCache::new(api.clone(), open());
    meta.fields().await.unwrap();
    assert_eq!(
        meta.field_id("Story Points").await.unwrap().as_deref(),
        Some("customfield_10016")
    );

    // second process over the same directory: still cached
    let meta = MetadataCache::new(api.clone(), open());
    meta.fields().await.unwrap();

    // refresh forces exactly one more fetch
    meta.refresh(MetadataCategory::Fields).await.unwrap();
    meta.fields().await.unwrap();

    fields.assert_async().await;
}

#[tokio::test]
async fn test_oversized_retry_after_stays_inside_batch() {
    let mut server = common::server().await;
    let ok = server
        .mock("GET", "/rest/api/3/issue/PROJ-1")
        .with_status(200)
        .with_body(issue_body("PROJ-1", "Open", "fine"))
        .create_async()
        .await;
    let bad = server
        .mock("GET", "/rest/api/3/issue/PROJ-2")
        .with_status(429)
        .with_header("retry-after", "18446744073709551615")
        .create_async()
        .await;

    let client = limited_client(&server, 50.0, Duration::from_millis(50));
    let mut batcher = RequestBatcher::new(Arc::new(client), 2).unwrap();
    let fine = batcher.add("GET", "/rest/api/3/issue/PROJ-1", None, None);
    let limited = batcher.add("GET", "/rest/api/3/issue/PROJ-2", None, None);

    let result = batcher.execute(None).await;
    assert_eq!(result.len(), 2);
    assert!(result.get(&fine).unwrap().success);
    let limited = result.get(&limited).unwrap();
    assert!(!limited.success);
    assert!(limited.error.as_deref().unwrap().contains("HTTP 429"));
    ok.assert_async().await;
    bad.assert_async().await;
}
