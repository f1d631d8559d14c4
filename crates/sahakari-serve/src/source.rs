//! Content service access.
//!
//! [`ContentSource`] is the seam between loaders/handlers and the hosted CMS.
//! [`SanityClient`] is the production implementation over HTTP; tests swap in
//! an in-memory fake.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::SanityConfig;

/// Per-request timeout for content service calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest upstream error body kept for logs.
const MAX_ERROR_BODY: usize = 512;

/// Errors talking to the content service.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("content service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Writes need an API token.
    #[error("write token not configured")]
    MissingToken,

    #[error("mutation returned no document id")]
    MissingId,
}

/// A GROQ query with its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentQuery {
    pub groq: &'static str,
    pub params: BTreeMap<String, Value>,
}

impl ContentQuery {
    pub fn new(groq: &'static str) -> Self {
        Self {
            groq,
            params: BTreeMap::new(),
        }
    }

    /// Bind `$name` to `value`.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Read and create access to CMS documents.
#[async_trait]
pub trait ContentSource: Send + Sync + 'static {
    /// Run a query and return its `result` value (`null` when nothing matched).
    async fn query(&self, query: &ContentQuery) -> Result<Value, ContentError>;

    /// Create a document and return its id.
    async fn create(&self, document: Value) -> Result<String, ContentError>;
}

/// HTTP client for the Sanity content API.
#[derive(Debug, Clone)]
pub struct SanityClient {
    http: reqwest::Client,
    query_url: String,
    mutate_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Deserialize)]
struct MutateResult {
    id: Option<String>,
}

impl SanityClient {
    pub fn new(config: &SanityConfig) -> Result<Self, ContentError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("sahakari-serve/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Reads may go through the CDN; writes always hit the live API.
        let read_host = if config.use_cdn { "apicdn" } else { "api" };
        let query_url = format!(
            "https://{}.{read_host}.sanity.io/v{}/data/query/{}",
            config.project_id, config.api_version, config.dataset
        );
        let mutate_url = format!(
            "https://{}.api.sanity.io/v{}/data/mutate/{}",
            config.project_id, config.api_version, config.dataset
        );

        Ok(Self {
            http,
            query_url,
            mutate_url,
            token: config.token.clone(),
        })
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    pub fn mutate_url(&self) -> &str {
        &self.mutate_url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ContentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Err(ContentError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Query-string pairs for a query: `query` plus one `$name` per parameter,
/// each value JSON-encoded.
fn query_pairs(query: &ContentQuery) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(query.params.len() + 1);
    pairs.push(("query".to_string(), query.groq.to_string()));
    for (name, value) in &query.params {
        pairs.push((format!("${name}"), value.to_string()));
    }
    pairs
}

#[async_trait]
impl ContentSource for SanityClient {
    async fn query(&self, query: &ContentQuery) -> Result<Value, ContentError> {
        let mut request = self.http.get(&self.query_url).query(&query_pairs(query));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = Self::check(request.send().await?).await?;
        let body: QueryResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(body.result)
    }

    async fn create(&self, document: Value) -> Result<String, ContentError> {
        let token = self.token.as_deref().ok_or(ContentError::MissingToken)?;
        let response = self
            .http
            .post(&self.mutate_url)
            .query(&[("returnIds", "true")])
            .bearer_auth(token)
            .json(&json!({ "mutations": [{ "create": document }] }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: MutateResponse = serde_json::from_slice(&response.bytes().await?)?;
        body.results
            .into_iter()
            .find_map(|r| r.id)
            .ok_or(ContentError::MissingId)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory content source for tests.

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio::sync::Barrier;

    use super::*;

    /// Answers queries from a map keyed by GROQ text and records writes.
    #[derive(Default)]
    pub struct FakeSource {
        responses: Mutex<HashMap<&'static str, Value>>,
        failing: Mutex<Vec<&'static str>>,
        fail_writes: AtomicBool,
        barrier: Mutex<Option<Arc<Barrier>>>,
        delay: Mutex<Option<Duration>>,
        queries: AtomicUsize,
        pub created: Mutex<Vec<Value>>,
        pub last_params: Mutex<Option<BTreeMap<String, Value>>>,
    }

    impl FakeSource {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn respond(&self, groq: &'static str, value: Value) {
            self.failing.lock().retain(|g| *g != groq);
            self.responses.lock().insert(groq, value);
        }

        pub fn fail(&self, groq: &'static str) {
            self.failing.lock().push(groq);
        }

        pub fn fail_writes(&self) {
            self.fail_writes.store(true, Ordering::SeqCst);
        }

        /// Make every query wait on a shared barrier before answering.
        pub fn gate(&self, barrier: Arc<Barrier>) {
            *self.barrier.lock() = Some(barrier);
        }

        pub fn delay(&self, by: Duration) {
            *self.delay.lock() = Some(by);
        }

        pub fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for FakeSource {
        async fn query(&self, query: &ContentQuery) -> Result<Value, ContentError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            *self.last_params.lock() = Some(query.params.clone());

            let barrier = self.barrier.lock().clone();
            if let Some(barrier) = barrier {
                barrier.wait().await;
            }
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.failing.lock().contains(&query.groq) {
                return Err(ContentError::Status {
                    status: 500,
                    body: "upstream exploded".to_string(),
                });
            }
            Ok(self
                .responses
                .lock()
                .get(query.groq)
                .cloned()
                .unwrap_or(Value::Null))
        }

        async fn create(&self, document: Value) -> Result<String, ContentError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ContentError::MissingToken);
            }
            let id = document["_id"].as_str().unwrap_or("generated").to_string();
            self.created.lock().push(document);
            Ok(id)
        }
    }
}
