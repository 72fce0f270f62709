//! Query dispatcher.
//!
//! The [`Dispatcher`] fans one query out to every registered adapter that
//! applies to its kind, under a bounded number of in-flight invocations.
//! Each invocation consults the result cache, waits for the per-service
//! rate limiter before every attempt, and lets the [`RetryPolicy`] decide
//! whether a failed attempt is repeated.
//!
//! Adapter failures never abort a batch: the caller always receives one
//! record per selected adapter, in registration order. Only malformed input
//! is reported as an error.

use crate::cache::{Fingerprint, ResultCache};
use crate::error::{DispatchError, Result};
use crate::filter::AdapterFilter;
use crate::rate_limit::RateLimiter;
use crate::report::{build_report, Report};
use crate::retry::{RetryDecision, RetryPolicy};
use futures::stream::{FuturesUnordered, StreamExt};
use lookout_core::{
    CacheConfig, Category, Classification, ConfigError, FailureKind, LookoutConfig,
    PatternClassifier, QueryClassifier, QueryKind, ResultRecord, ServiceAdapter,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// One search call.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    kind: Option<QueryKind>,
    filter: AdapterFilter,
    deadline: Option<Duration>,
}

impl SearchRequest {
    /// Search for `query`, classifying it automatically.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kind: None,
            filter: AdapterFilter::All,
            deadline: None,
        }
    }

    /// Declare the query kind, bypassing classification.
    #[must_use]
    pub fn with_kind(mut self, kind: QueryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Only run adapters in these categories. An empty list means all.
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.filter = AdapterFilter::Categories(categories);
        self
    }

    /// Select adapters with an explicit filter.
    #[must_use]
    pub fn with_filter(mut self, filter: AdapterFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Stop waiting for adapters after `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The raw query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Builder for [`Dispatcher`].
///
/// Adapters registered here are frozen by [`DispatcherBuilder::build`].
pub struct DispatcherBuilder {
    adapters: Vec<Arc<dyn ServiceAdapter>>,
    probes: Vec<Arc<dyn ServiceAdapter>>,
    classifier: Arc<dyn QueryClassifier>,
    limiter: Option<Arc<RateLimiter>>,
    cache: Option<Arc<ResultCache>>,
    retry: RetryPolicy,
    max_in_flight: usize,
    call_timeout: Duration,
    deadline: Option<Duration>,
    ttls: CacheConfig,
}

impl DispatcherBuilder {
    /// Start from default settings.
    #[must_use]
    pub fn new() -> Self {
        let defaults = LookoutConfig::default();
        Self {
            adapters: Vec::new(),
            probes: Vec::new(),
            classifier: Arc::new(PatternClassifier::new()),
            limiter: None,
            cache: None,
            retry: RetryPolicy::from_config(&defaults.retry),
            max_in_flight: defaults.dispatch.max_in_flight,
            call_timeout: defaults.dispatch.call_timeout(),
            deadline: defaults.dispatch.deadline(),
            ttls: defaults.cache,
        }
    }

    /// Start from loaded configuration.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid.
    pub fn from_config(config: &LookoutConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            limiter: Some(Arc::new(RateLimiter::from_config(&config.rate_limit)?)),
            cache: Some(Arc::new(ResultCache::from_config(&config.cache))),
            retry: RetryPolicy::from_config(&config.retry),
            max_in_flight: config.dispatch.max_in_flight,
            call_timeout: config.dispatch.call_timeout(),
            deadline: config.dispatch.deadline(),
            ttls: config.cache.clone(),
            ..Self::new()
        })
    }

    /// Register a search adapter.
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn ServiceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Register a bulk-verification probe.
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn ServiceAdapter>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Register several bulk-verification probes.
    #[must_use]
    pub fn probes<I>(mut self, probes: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ServiceAdapter>>,
    {
        self.probes.extend(probes);
        self
    }

    /// Replace the query classifier.
    #[must_use]
    pub fn classifier(mut self, classifier: Arc<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Use a shared rate limiter.
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Use a shared result cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the maximum number of adapter invocations in flight.
    #[must_use]
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Set the per-invocation timeout (covers every retry).
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the deadline applied when a request carries none.
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the cache TTLs per query kind.
    #[must_use]
    pub fn cache_ttls(mut self, ttls: CacheConfig) -> Self {
        self.ttls = ttls;
        self
    }

    /// Freeze the registrations.
    ///
    /// # Errors
    /// Returns error if a service is registered twice in the same role or if
    /// the concurrency ceiling is zero.
    pub fn build(self) -> Result<Dispatcher> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dispatch.max_in_flight".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        ensure_unique(&self.adapters)?;
        ensure_unique(&self.probes)?;

        let limiter = self.limiter.unwrap_or_default();
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ResultCache::from_config(&self.ttls)));

        tracing::debug!(
            adapters = self.adapters.len(),
            probes = self.probes.len(),
            max_in_flight = self.max_in_flight,
            "dispatcher built"
        );

        Ok(Dispatcher {
            adapters: self.adapters,
            probes: self.probes,
            classifier: self.classifier,
            default_deadline: self.deadline,
            runner: Arc::new(Runner {
                limiter,
                cache,
                retry: self.retry,
                call_timeout: self.call_timeout,
                ttls: self.ttls,
                permits: Semaphore::new(self.max_in_flight),
            }),
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_unique(adapters: &[Arc<dyn ServiceAdapter>]) -> Result<()> {
    let mut seen = HashSet::new();
    for adapter in adapters {
        if !seen.insert(adapter.service_id().clone()) {
            return Err(DispatchError::DuplicateService {
                service_id: adapter.service_id().to_string(),
            });
        }
    }
    Ok(())
}

/// Fans queries out to registered adapters.
pub struct Dispatcher {
    adapters: Vec<Arc<dyn ServiceAdapter>>,
    pub(crate) probes: Vec<Arc<dyn ServiceAdapter>>,
    classifier: Arc<dyn QueryClassifier>,
    pub(crate) default_deadline: Option<Duration>,
    runner: Arc<Runner>,
}

impl Dispatcher {
    /// Start building a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Run a query against every applicable adapter.
    ///
    /// Returns one record per selected adapter, in registration order.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidQuery`] if the query is empty, or if
    /// no kind was declared and the query is ambiguous or unrecognized. No
    /// adapter runs in that case.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<ResultRecord>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(invalid_query(&request.query, "query is empty"));
        }

        let kind = match request.kind {
            Some(kind) => kind,
            None => self.classify(query)?,
        };

        let selected: Vec<_> = self
            .adapters
            .iter()
            .filter(|&adapter| adapter.applies(kind) && request.filter.matches(&**adapter))
            .cloned()
            .collect();

        let search_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "search",
            %search_id,
            kind = kind.as_str(),
            adapters = selected.len()
        );

        let deadline = request.deadline.or(self.default_deadline);
        let records = self
            .run_batch(&selected, query, kind, deadline)
            .instrument(span.clone())
            .await;

        span.in_scope(|| {
            tracing::info!(
                succeeded = records.iter().filter(|r| r.is_success()).count(),
                failed = records.iter().filter(|r| !r.is_success()).count(),
                "search complete"
            );
        });

        Ok(records)
    }

    /// Aggregate records into a report.
    #[must_use]
    pub fn build_report(&self, records: &[ResultRecord]) -> Report {
        build_report(records)
    }

    /// The shared result cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.runner.cache
    }

    /// The shared rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.runner.limiter
    }

    /// Number of registered search adapters.
    #[must_use]
    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    fn classify(&self, query: &str) -> Result<QueryKind> {
        match self.classifier.classify(query) {
            Classification::Known(kind) => Ok(kind),
            Classification::Ambiguous(kinds) => {
                let kinds: Vec<&str> = kinds.iter().map(QueryKind::as_str).collect();
                Err(invalid_query(
                    query,
                    &format!(
                        "query is ambiguous between {}; declare its kind",
                        kinds.join(", ")
                    ),
                ))
            }
            Classification::Unrecognized => {
                Err(invalid_query(query, "query does not match any known kind"))
            }
        }
    }

    /// Run `query` through `adapters` concurrently.
    ///
    /// Records come back in the order of `adapters`. Adapters still running
    /// when `deadline` elapses are cancelled and reported as
    /// [`FailureKind::Deadline`] failures.
    pub(crate) async fn run_batch(
        &self,
        adapters: &[Arc<dyn ServiceAdapter>],
        query: &str,
        kind: QueryKind,
        deadline: Option<Duration>,
    ) -> Vec<ResultRecord> {
        let started = Instant::now();
        let deadline_at = deadline.map(|d| started + d);

        let mut slots: Vec<Option<ResultRecord>> = vec![None; adapters.len()];
        let mut aborts = Vec::with_capacity(adapters.len());
        let mut pending = FuturesUnordered::new();

        for (index, adapter) in adapters.iter().enumerate() {
            let runner = Arc::clone(&self.runner);
            let adapter = Arc::clone(adapter);
            let owned_query = query.to_string();
            let span = tracing::debug_span!("invoke", service = %adapter.service_id());

            let handle = tokio::spawn(
                async move { runner.invoke(adapter, owned_query, kind).await }.instrument(span),
            );
            aborts.push(handle.abort_handle());
            pending.push(async move { (index, handle.await) });
        }

        loop {
            let next = match deadline_at {
                Some(at) => {
                    let polled = tokio::time::timeout_at(at, pending.next()).await;
                    if let Ok(next) = polled {
                        next
                    } else {
                        tracing::warn!(
                            pending = pending.len(),
                            "deadline elapsed, cancelling remaining adapters"
                        );
                        break;
                    }
                }
                None => pending.next().await,
            };

            let Some((index, joined)) = next else {
                break;
            };

            let record = joined.unwrap_or_else(|e| {
                let service = adapters[index].service_id();
                tracing::error!(service = %service, error = %e, "adapter task failed");
                ResultRecord::failed(
                    service.clone(),
                    query,
                    kind,
                    FailureKind::Adapter,
                    format!("adapter task failed: {e}"),
                )
                .with_elapsed(started.elapsed())
            });
            slots[index] = Some(record);
        }

        for (index, abort) in aborts.iter().enumerate() {
            if slots[index].is_none() {
                abort.abort();
            }
        }

        slots
            .into_iter()
            .zip(adapters)
            .map(|(slot, adapter)| {
                slot.unwrap_or_else(|| {
                    ResultRecord::failed(
                        adapter.service_id().clone(),
                        query,
                        kind,
                        FailureKind::Deadline,
                        format!(
                            "cancelled at deadline after {}ms",
                            started.elapsed().as_millis()
                        ),
                    )
                    .with_elapsed(started.elapsed())
                })
            })
            .collect()
    }
}

fn invalid_query(query: &str, reason: &str) -> DispatchError {
    DispatchError::InvalidQuery {
        query: query.to_string(),
        reason: reason.to_string(),
    }
}

/// State shared by every invocation task of one dispatcher.
struct Runner {
    limiter: Arc<RateLimiter>,
    cache: Arc<ResultCache>,
    retry: RetryPolicy,
    call_timeout: Duration,
    ttls: CacheConfig,
    permits: Semaphore,
}

impl Runner {
    /// One adapter invocation: cache, permit, timed retry loop, cache fill.
    ///
    /// Concurrent invocations for the same fingerprint share one run of the
    /// adapter. Whatever record answers, it is attributed to this caller's
    /// query.
    async fn invoke(
        &self,
        adapter: Arc<dyn ServiceAdapter>,
        query: String,
        kind: QueryKind,
    ) -> ResultRecord {
        let key = Fingerprint::new(adapter.service_id(), &query, kind);
        let ttl = self.ttls.ttl_for(kind);

        let record = self
            .cache
            .get_or_insert_with(key, ttl, || self.run(adapter.as_ref(), &query, kind))
            .await;
        record.with_query(query)
    }

    async fn run(
        &self,
        adapter: &dyn ServiceAdapter,
        query: &str,
        kind: QueryKind,
    ) -> ResultRecord {
        let service = adapter.service_id();

        let Ok(_permit) = self.permits.acquire().await else {
            return ResultRecord::failed(
                service.clone(),
                query,
                kind,
                FailureKind::Adapter,
                "dispatcher is shutting down",
            );
        };

        let started = Instant::now();
        let attempts = self.attempt_loop(adapter, query, kind);
        match tokio::time::timeout(self.call_timeout, attempts).await {
            Ok(record) => record,
            Err(_) => {
                tracing::warn!(
                    service = %service,
                    timeout_ms = self.call_timeout.as_millis(),
                    "adapter timed out"
                );
                ResultRecord::failed(
                    service.clone(),
                    query,
                    kind,
                    FailureKind::Timeout,
                    format!("no response within {}ms", self.call_timeout.as_millis()),
                )
                .with_elapsed(started.elapsed())
            }
        }
    }

    async fn attempt_loop(
        &self,
        adapter: &dyn ServiceAdapter,
        query: &str,
        kind: QueryKind,
    ) -> ResultRecord {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            self.limiter.acquire(adapter.service_id()).await;
            let record = adapter.execute(query, kind).await;

            match self.retry.decide(attempt, &record) {
                RetryDecision::GiveUp => {
                    if let Some(failure) = record.failure() {
                        tracing::debug!(
                            service = %adapter.service_id(),
                            attempt,
                            %failure,
                            "adapter failed"
                        );
                    }
                    return self.retry.conclude(record, attempt, started.elapsed());
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        service = %adapter.service_id(),
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = record.error().unwrap_or_default(),
                        "retrying adapter"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lookout_core::{Payload, ServiceId};

    struct EchoAdapter {
        id: ServiceId,
        kinds: Vec<QueryKind>,
    }

    #[async_trait]
    impl ServiceAdapter for EchoAdapter {
        fn service_id(&self) -> &ServiceId {
            &self.id
        }

        fn category(&self) -> Category {
            Category::Social
        }

        fn applies(&self, kind: QueryKind) -> bool {
            self.kinds.contains(&kind)
        }

        async fn execute(&self, query: &str, kind: QueryKind) -> ResultRecord {
            ResultRecord::success(self.id.clone(), query, kind, Payload::new())
        }
    }

    fn echo(id: &str, kinds: &[QueryKind]) -> Arc<dyn ServiceAdapter> {
        Arc::new(EchoAdapter {
            id: ServiceId::new(id).expect("valid test service ID"),
            kinds: kinds.to_vec(),
        })
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::builder()
            .adapter(echo("github", &[QueryKind::Username]))
            .adapter(echo("mail-check", &[QueryKind::Email]))
            .rate_limiter(Arc::new(RateLimiter::new(Duration::ZERO)))
            .build()
            .expect("build dispatcher")
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let result = Dispatcher::builder()
            .adapter(echo("github", &[QueryKind::Username]))
            .adapter(echo("github", &[QueryKind::Email]))
            .build();

        assert!(matches!(
            result,
            Err(DispatchError::DuplicateService { ref service_id }) if service_id == "github"
        ));
    }

    #[test]
    fn test_build_rejects_zero_ceiling() {
        let result = Dispatcher::builder().max_in_flight(0).build();
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_query_is_invalid() {
        let result = dispatcher()
            .search(SearchRequest::new("   ").with_kind(QueryKind::Username))
            .await;
        assert!(matches!(result, Err(DispatchError::InvalidQuery { .. })));
    }

    #[tokio::test]
    async fn test_unrecognized_query_is_invalid() {
        let result = dispatcher().search(SearchRequest::new("not a query!")).await;
        assert!(matches!(result, Err(DispatchError::InvalidQuery { .. })));
    }

    #[tokio::test]
    async fn test_ambiguous_query_needs_declared_kind() {
        let dispatcher = dispatcher();

        let err = dispatcher
            .search(SearchRequest::new("example.com"))
            .await
            .expect_err("ambiguous query should be rejected");
        assert!(err.to_string().contains("ambiguous"));

        let records = dispatcher
            .search(SearchRequest::new("example.com").with_kind(QueryKind::Username))
            .await
            .expect("declared kind should be accepted");
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_search_selects_by_kind() {
        let records = dispatcher()
            .search(SearchRequest::new("someone@example.com"))
            .await
            .expect("search");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service().as_str(), "mail-check");
        assert_eq!(records[0].query_kind(), QueryKind::Email);
    }

    #[tokio::test]
    async fn test_query_is_trimmed_before_dispatch() {
        let records = dispatcher()
            .search(SearchRequest::new("  octocat  "))
            .await
            .expect("search");

        assert_eq!(records[0].query(), "octocat");
    }

    #[tokio::test]
    async fn test_category_filter_excludes_adapters() {
        let records = dispatcher()
            .search(SearchRequest::new("octocat").with_categories(vec![Category::Image]))
            .await
            .expect("search");

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_second_search_is_served_from_cache() {
        let dispatcher = dispatcher();
        dispatcher
            .search(SearchRequest::new("octocat"))
            .await
            .expect("first search");
        dispatcher
            .search(SearchRequest::new("OctoCat"))
            .await
            .expect("second search");

        let stats = dispatcher.cache().stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }
}
