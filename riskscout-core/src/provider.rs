//! Search provider contract.
//!
//! Adapters implement [`SearchProvider`] and may fail freely. The
//! orchestrator only ever talks to a [`GuardedProvider`], which puts the
//! adapter behind its own breaker and a timeout and always answers with a
//! [`SearchResponse`].

use crate::breaker::Breaker;
use crate::config::ScoutConfig;
use crate::error::{BreakerError, SearchError};
use crate::types::{SearchRequest, SearchResponse, Source, Topic};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// A single external search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable provider name, used for breaker ids and labeling.
    fn name(&self) -> &str;

    /// Adapt the query to this provider. Defaults to the query unchanged.
    fn shape_query(&self, query: &str, _topic: Topic) -> String {
        query.to_string()
    }

    /// Run the search. Results should carry `request.topic`.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError>;
}

/// A provider behind its dedicated breaker, with a per-call timeout and a
/// degraded fallback response.
pub struct GuardedProvider {
    inner: Arc<dyn SearchProvider>,
    breaker: Arc<Breaker>,
    timeout: Duration,
}

impl GuardedProvider {
    pub fn new(inner: Arc<dyn SearchProvider>, breaker: Arc<Breaker>, timeout: Duration) -> Self {
        Self {
            inner,
            breaker,
            timeout,
        }
    }

    /// Wrap `inner` with a fresh breaker named `search:<provider>`.
    pub fn from_config(inner: Arc<dyn SearchProvider>, config: &ScoutConfig) -> Self {
        let breaker = Breaker::from_settings(
            format!("search:{}", inner.name()),
            &config.breaker.search,
        );
        Self::new(
            inner,
            Arc::new(breaker),
            Duration::from_secs(config.search.timeout_secs),
        )
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn breaker(&self) -> &Breaker {
        &self.breaker
    }

    /// Search without ever failing: errors, timeouts, and open circuits
    /// become a failed response carrying a descriptive message.
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        let name = self.inner.name().to_string();
        let mut shaped = request.clone();
        shaped.query = self.inner.shape_query(&request.query, request.topic);

        debug!(provider = %name, topic = %request.topic, query = %shaped.query, "Searching");

        let inner = Arc::clone(&self.inner);
        let timeout = self.timeout;
        let max_results = request.max_results;
        let call_name = name.clone();
        let call = move || async move {
            match tokio::time::timeout(timeout, inner.search(&shaped)).await {
                Ok(Ok(mut results)) => {
                    results.truncate(max_results);
                    Ok(SearchResponse::from_results(call_name, results))
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(SearchError::Timeout {
                    provider: call_name,
                    timeout_secs: timeout.as_secs(),
                }),
            }
        };

        self.breaker
            .with_fallback(call, |err: BreakerError<SearchError>| {
                let err: SearchError = err.into();
                warn!(provider = %name, error = %err, "Search degraded to fallback");
                SearchResponse::failed(name.as_str(), err.to_string())
            })
            .await
    }
}

/// Every guarded provider a research run may use, each with its own breaker.
#[derive(Clone)]
pub struct ProviderSet {
    pub primary: Arc<GuardedProvider>,
    pub academic: Option<Arc<GuardedProvider>>,
    pub supplementary: Option<Arc<GuardedProvider>>,
}

impl ProviderSet {
    pub fn new(primary: GuardedProvider) -> Self {
        Self {
            primary: Arc::new(primary),
            academic: None,
            supplementary: None,
        }
    }

    pub fn with_academic(mut self, provider: GuardedProvider) -> Self {
        self.academic = Some(Arc::new(provider));
        self
    }

    pub fn with_supplementary(mut self, provider: GuardedProvider) -> Self {
        self.supplementary = Some(Arc::new(provider));
        self
    }

    /// Names of the configured providers, primary first.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(&self.primary)
            .chain(self.academic.iter())
            .chain(self.supplementary.iter())
            .map(|p| p.name())
            .collect()
    }
}

/// A scripted provider for tests and offline runs.
///
/// Queued outcomes are consumed in order; once exhausted, `default` is
/// returned for every call.
pub struct MockSearchProvider {
    name: String,
    queue: Mutex<VecDeque<Result<Vec<Source>, SearchError>>>,
    default: Result<Vec<Source>, SearchError>,
    delay: Duration,
    calls: Mutex<Vec<SearchRequest>>,
}

impl MockSearchProvider {
    /// A provider that always returns `results`.
    pub fn returning(name: impl Into<String>, results: Vec<Source>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            default: Ok(results),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always fails with a request error.
    pub fn failing(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            default: Err(SearchError::Request {
                provider: name.clone(),
                message: "connection refused".to_string(),
            }),
            ..Self::returning(name, Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn queue(&self, outcome: Result<Vec<Source>, SearchError>) {
        self.queue.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Source>, SearchError> {
        self.calls.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.queue.lock().unwrap().pop_front();
        let outcome = next.unwrap_or_else(|| self.default.clone());
        outcome.map(|sources| {
            sources
                .into_iter()
                .map(|mut s| {
                    s.topic = request.topic;
                    s
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchStatus;

    fn sources(n: usize) -> Vec<Source> {
        (0..n)
            .map(|i| {
                Source::new(
                    format!("Title {i}"),
                    format!("https://example.com/{i}"),
                    Topic::General,
                    "content",
                )
            })
            .collect()
    }

    fn guarded(provider: Arc<dyn SearchProvider>, threshold: usize, timeout: Duration) -> GuardedProvider {
        GuardedProvider::new(
            provider,
            Arc::new(Breaker::new("search:test", threshold, Duration::from_secs(30))),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_guarded_search_truncates_and_labels() {
        let provider = Arc::new(MockSearchProvider::returning("mock", sources(5)));
        let guarded = guarded(provider, 3, Duration::from_secs(5));

        let response = guarded
            .search(&SearchRequest::new("acme", Topic::News, 3))
            .await;
        assert!(response.success());
        assert_eq!(response.results.len(), 3);
        assert!(response.results.iter().all(|s| s.topic == Topic::News));
    }

    #[tokio::test]
    async fn test_guarded_search_never_raises() {
        let provider = Arc::new(MockSearchProvider::failing("mock"));
        let guarded = guarded(provider, 3, Duration::from_secs(5));

        let response = guarded
            .search(&SearchRequest::new("acme", Topic::News, 3))
            .await;
        assert_eq!(response.status, SearchStatus::Failed);
        assert!(response.results.is_empty());
        assert!(
            response
                .error_message
                .as_deref()
                .unwrap()
                .contains("connection refused")
        );
    }

    #[tokio::test]
    async fn test_guarded_search_empty_is_not_failure() {
        let provider = Arc::new(MockSearchProvider::returning("mock", Vec::new()));
        let guarded = guarded(provider, 1, Duration::from_secs(5));

        let response = guarded
            .search(&SearchRequest::new("acme", Topic::News, 3))
            .await;
        assert_eq!(response.status, SearchStatus::Empty);
        assert!(!response.success());
        assert!(!response.is_failure());
        // Empty answers do not trip the breaker.
        let again = guarded
            .search(&SearchRequest::new("acme", Topic::News, 3))
            .await;
        assert_eq!(again.status, SearchStatus::Empty);
    }

    #[test]
    fn test_provider_set_names() {
        let set = ProviderSet::new(guarded(
            Arc::new(MockSearchProvider::returning("web", Vec::new())),
            3,
            Duration::from_secs(5),
        ))
        .with_supplementary(guarded(
            Arc::new(MockSearchProvider::returning("wikipedia", Vec::new())),
            3,
            Duration::from_secs(5),
        ));
        assert_eq!(set.names(), vec!["web", "wikipedia"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let provider = Arc::new(
            MockSearchProvider::returning("slow", sources(1)).with_delay(Duration::from_secs(60)),
        );
        let guarded = guarded(provider.clone(), 1, Duration::from_secs(2));

        let response = guarded
            .search(&SearchRequest::new("acme", Topic::News, 3))
            .await;
        assert!(response.is_failure());
        assert!(response.error_message.unwrap().contains("timed out"));

        // The circuit is now open: no further calls reach the provider.
        let response = guarded
            .search(&SearchRequest::new("acme", Topic::News, 3))
            .await;
        assert!(response.is_failure());
        assert_eq!(provider.call_count(), 1);
    }
}
