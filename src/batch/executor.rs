//! Batch executor.

use super::request::{BatchRequest, RequestId, RequestResult};
use crate::client::ApiClient;
use crate::types::{HttpMethod, QueryParams};
use crate::{Error, ErrorContext, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info};

pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Called as `(completed, total)` after each request finishes.
pub type ProgressCallback<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Results of one [`RequestBatcher::execute`], keyed by request id.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub results: HashMap<RequestId, RequestResult>,
    pub execution_time: Duration,
}

impl BatchResult {
    pub fn get(&self, id: &RequestId) -> Option<&RequestResult> {
        self.results.get(id)
    }
    pub fn len(&self) -> usize {
        self.results.len()
    }
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
    pub fn success_count(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }
    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
    pub fn all_succeeded(&self) -> bool {
        self.results.values().all(|r| r.success)
    }
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.results.len() as f64
        }
    }
    pub fn successes(&self) -> impl Iterator<Item = &RequestResult> {
        self.results.values().filter(|r| r.success)
    }
    pub fn failures(&self) -> impl Iterator<Item = &RequestResult> {
        self.results.values().filter(|r| !r.success)
    }
}

/// Queues REST calls and runs them with at most `max_concurrent` in flight.
///
/// Every request gets exactly one [`RequestResult`]; a failing request never
/// aborts its siblings. All request futures are polled from the task that
/// calls [`execute`](Self::execute), so nothing is spawned and the progress
/// callback always sees a monotonically increasing count.
///
/// ```rust,no_run
/// # use jira_lib_rust::batch::RequestBatcher;
/// # use jira_lib_rust::client::JiraClient;
/// # use std::sync::Arc;
/// # async fn demo(client: JiraClient) -> jira_lib_rust::Result<()> {
/// let mut batcher = RequestBatcher::new(Arc::new(client), 5)?;
/// let id = batcher.add("GET", "/rest/api/3/issue/PROJ-1", None, None);
/// let result = batcher.execute(None).await;
/// assert!(result.get(&id).is_some());
/// # Ok(())
/// # }
/// ```
pub struct RequestBatcher {
    client: Arc<dyn ApiClient>,
    max_concurrent: usize,
    requests: Vec<BatchRequest>,
}

impl RequestBatcher {
    pub fn new(client: Arc<dyn ApiClient>, max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(Error::validation_with_context(
                "max_concurrent must be at least 1",
                ErrorContext::new()
                    .with_field_path("max_concurrent")
                    .with_details("0")
                    .with_source("request_batcher"),
            ));
        }
        Ok(Self {
            client,
            max_concurrent,
            requests: Vec::new(),
        })
    }

    pub fn with_default_concurrency(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            requests: Vec::new(),
        }
    }

    /// Queue a request. No I/O and no validation; an unknown verb fails at execution.
    pub fn add(
        &mut self,
        method: impl Into<String>,
        endpoint: impl Into<String>,
        params: Option<QueryParams>,
        data: Option<Value>,
    ) -> RequestId {
        let id = RequestId::generate();
        self.requests.push(BatchRequest {
            id: id.clone(),
            method: method.into(),
            endpoint: endpoint.into(),
            params,
            data,
        });
        id
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn requests(&self) -> &[BatchRequest] {
        &self.requests
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub async fn execute(&self, progress: Option<&ProgressCallback<'_>>) -> BatchResult {
        let start = Instant::now();
        let total = self.requests.len();
        if total == 0 {
            return BatchResult::default();
        }

        let gate = Semaphore::new(self.max_concurrent);
        let mut pending: FuturesUnordered<_> = self
            .requests
            .iter()
            .map(|req| self.run_one(req, &gate))
            .collect();

        let mut results = HashMap::with_capacity(total);
        let mut completed = 0;
        while let Some(result) = pending.next().await {
            completed += 1;
            if let Some(cb) = progress {
                cb(completed, total);
            }
            results.insert(result.request_id.clone(), result);
        }

        let batch = BatchResult {
            results,
            execution_time: start.elapsed(),
        };
        info!(
            total,
            succeeded = batch.success_count(),
            failed = batch.failure_count(),
            elapsed_ms = batch.execution_time.as_millis() as u64,
            "batch finished"
        );
        batch
    }

    /// Blocking variant of [`execute`](Self::execute) on a private current-thread runtime.
    ///
    /// Panics if called from within a tokio runtime, like any nested `block_on`.
    pub fn execute_sync(&self, progress: Option<&ProgressCallback<'_>>) -> Result<BatchResult> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(rt.block_on(self.execute(progress)))
    }

    async fn run_one(&self, req: &BatchRequest, gate: &Semaphore) -> RequestResult {
        // The gate is never closed.
        let _permit = match gate.acquire().await {
            Ok(p) => p,
            Err(e) => return RequestResult::failed(req, e.to_string()),
        };
        match dispatch(self.client.as_ref(), req).await {
            Ok(data) => RequestResult::succeeded(req, data),
            Err(e) => {
                debug!(method = %req.method, endpoint = %req.endpoint, error = %e, "batch request failed");
                RequestResult::failed(req, e.to_string())
            }
        }
    }
}

async fn dispatch(client: &dyn ApiClient, req: &BatchRequest) -> Result<Value> {
    let method: HttpMethod = req.method.parse()?;
    let data = req.data.as_ref();
    match method {
        HttpMethod::Get => client.get(&req.endpoint, req.params.as_ref()).await,
        HttpMethod::Post => client.post(&req.endpoint, data).await,
        HttpMethod::Put => client.put(&req.endpoint, data).await,
        HttpMethod::Delete => client.delete(&req.endpoint).await,
        HttpMethod::Patch => client.patch(&req.endpoint, data).await,
    }
}
