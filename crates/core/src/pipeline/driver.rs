//! Pipeline driver - claims one work unit and carries it end to end.
//!
//! One `run_once` call drives the state machine
//! select → fetch → generate → enrich → validate → publish for at most one
//! work unit. Stage-local failures transition the unit to `Failed` with a
//! stored reason and never crash the control task; persistence failures
//! propagate to the caller because a store that cannot be written to
//! invalidates the crash-recovery guarantee.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use draftpress_common::{
    parallel_map, BreakerError, CircuitBreaker, CircuitBreakerConfig, RetryCondition, RetryConfig,
    RetryExecutor, TtlCache,
};
use draftpress_domain::{Article, PipelineError, Product, Result, RunOutcome, WorkUnit};
use tracing::{debug, info, instrument, warn};

use super::artifact;
use super::ports::{
    ArticleGenerator, ArticlePublisher, ImageSource, MetricsSink, NotificationSink, ProductSource,
    WorkUnitStore,
};
use super::validation;

/// Name of the breaker guarding the generation dependency.
const GENERATOR_BREAKER: &str = "generator";

/// Tuning knobs for one driver instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long fetched product lists stay valid.
    pub cache_ttl: Duration,
    /// Retry budget and backoff for the generation stage.
    pub retry: RetryConfig,
    /// Breaker thresholds for the generation dependency.
    pub breaker: CircuitBreakerConfig,
    /// Worker bound for per-product enrichment lookups.
    pub enrichment_workers: usize,
    /// Age past which an `Assigned` unit is presumed abandoned.
    pub stale_after: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::new(5, Duration::from_secs(120)),
            enrichment_workers: 2,
            stale_after: Duration::from_secs(30 * 60),
        }
    }
}

impl PipelineConfig {
    /// Validate the configuration before constructing a driver.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl.is_zero() {
            return Err(PipelineError::Config("cache_ttl must be greater than zero".to_string()));
        }
        if self.enrichment_workers == 0 {
            return Err(PipelineError::Config(
                "enrichment_workers must be greater than zero".to_string(),
            ));
        }
        self.retry.validate().map_err(|err| PipelineError::Config(err.to_string()))?;
        self.breaker.validate().map_err(|err| PipelineError::Config(err.to_string()))?;
        Ok(())
    }
}

/// External collaborators the driver orchestrates. Grouped so construction
/// sites stay readable; every field is a port, never a concrete adapter.
pub struct PipelineDeps {
    pub work_units: Arc<dyn WorkUnitStore>,
    pub products: Arc<dyn ProductSource>,
    pub generator: Arc<dyn ArticleGenerator>,
    pub images: Arc<dyn ImageSource>,
    pub publisher: Arc<dyn ArticlePublisher>,
    pub metrics: Arc<dyn MetricsSink>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Orchestrates one pipeline run at a time over the ports in
/// [`PipelineDeps`], composing the retry executor, circuit breaker, TTL
/// cache, and bounded concurrency primitives.
pub struct PipelineDriver {
    deps: PipelineDeps,
    config: PipelineConfig,
    product_cache: TtlCache<String, Vec<Product>>,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
}

impl PipelineDriver {
    /// Create a driver after validating `config`.
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let product_cache = TtlCache::new(config.cache_ttl);
        let breaker = CircuitBreaker::new(GENERATOR_BREAKER, config.breaker.clone())
            .map_err(|err| PipelineError::Config(err.to_string()))?;
        // An open circuit means the dependency is known-bad; retrying the
        // rejection would only burn the backoff schedule, so stop there and
        // let the degraded path take over.
        let condition = RetryCondition::Custom(Arc::new(|err| {
            !err.downcast_ref::<BreakerError<PipelineError>>()
                .is_some_and(|breaker_err| breaker_err.is_open())
        }));
        let retry = RetryExecutor::with_condition(config.retry.clone(), condition);
        Ok(Self { deps, config, product_cache, breaker, retry })
    }

    /// Insert topics into the work pool. Duplicates are absorbed by the
    /// store; returns how many topics were submitted.
    pub async fn seed_topics(&self, topics: &[String]) -> Result<usize> {
        for topic in topics {
            self.deps.work_units.add(topic).await?;
        }
        info!(count = topics.len(), "seeded work pool");
        Ok(topics.len())
    }

    /// Startup crash recovery: return units abandoned mid-run to `Pending`.
    pub async fn recover(&self) -> Result<usize> {
        let reset = self.deps.work_units.reset_stale(self.config.stale_after).await?;
        if reset > 0 {
            info!(reset, "returned stale work units to pending");
        }
        Ok(reset)
    }

    /// Process at most one work unit end to end.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RunOutcome> {
        let Some(unit) = self.deps.work_units.claim_next().await? else {
            debug!("no pending work units");
            return Ok(RunOutcome::NoWork);
        };
        info!(unit_id = unit.id, topic = %unit.topic, "claimed work unit");

        let products = match self.fetch_products(&unit.topic).await {
            Ok(products) => products,
            Err(err) => {
                return self.fail_unit(&unit, format!("product fetch failed: {err}")).await;
            }
        };
        if products.is_empty() {
            let reason = format!("no products available for topic '{}'", unit.topic);
            return self.fail_unit(&unit, reason).await;
        }

        let (body, degraded, tokens_used) = self.generate_body(&unit.topic, &products).await?;
        let body = self.enrich(body, &products).await;

        let article = Article {
            filename: artifact::artifact_filename(&unit.topic),
            body: artifact::assemble(&unit.topic, &body, Utc::now().date_naive()),
            degraded,
            tokens_used,
        };

        for violation in validation::validate_article(&article.body) {
            warn!(unit_id = unit.id, %violation, "artifact validation warning");
        }

        match self.deps.publisher.publish(&article.filename, &article.body).await {
            Ok(commit_id) => {
                self.deps.work_units.mark_completed(unit.id).await?;
                self.deps.metrics.record_published(article.tokens_used).await?;
                info!(
                    unit_id = unit.id,
                    filename = %article.filename,
                    %commit_id,
                    degraded = article.degraded,
                    "published artifact"
                );

                let message = format!("published {} (commit {commit_id})", article.filename);
                if !self.deps.notifier.notify(&message).await {
                    debug!("notification was not delivered");
                }

                Ok(RunOutcome::Completed { degraded: article.degraded, filename: article.filename })
            }
            Err(err) => {
                if err.is_operational() {
                    self.deps.notifier.notify(&format!("pipeline failure: {err}")).await;
                }
                self.fail_unit(&unit, format!("publish failed: {err}")).await
            }
        }
    }

    /// Cache-through product lookup. Empty results are not cached so a
    /// later run can observe newly available data.
    async fn fetch_products(&self, topic: &str) -> Result<Vec<Product>> {
        let key = topic.to_string();
        if let Some(products) = self.product_cache.get(&key) {
            debug!(topic, "product cache hit");
            return Ok(products);
        }

        let products = self.deps.products.fetch(topic).await?;
        if !products.is_empty() {
            self.product_cache.insert(key, products.clone());
        }
        Ok(products)
    }

    /// Generation behind retry + breaker. Exhaustion falls back to a
    /// degraded placeholder body so the run still publishes (best effort);
    /// the failure is visible in metrics.
    async fn generate_body(
        &self,
        topic: &str,
        products: &[Product],
    ) -> Result<(String, bool, u64)> {
        let prompt = artifact::build_prompt(topic, products);

        let outcome = self
            .retry
            .execute("generate_article", || {
                self.breaker.call(|| self.deps.generator.generate(&prompt))
            })
            .await;

        match outcome {
            Ok(text) => Ok((text.body, false, text.tokens_used)),
            Err(err) => {
                warn!(topic, error = %err, "generation exhausted, using placeholder");
                self.deps.metrics.record_generation_failure().await?;
                Ok((artifact::placeholder_article(topic, products), true, 0))
            }
        }
    }

    /// Per-product image lookups through the bounded executor. A failed
    /// lookup substitutes the fallback URL and never blocks its siblings.
    async fn enrich(&self, body: String, products: &[Product]) -> String {
        let names: Vec<String> = products.iter().map(|p| p.name.clone()).collect();
        let images = Arc::clone(&self.deps.images);

        let results =
            parallel_map(names.clone(), self.config.enrichment_workers, move |name| {
                let images = Arc::clone(&images);
                async move { images.image_url(&name).await }
            })
            .await;

        let urls: Vec<String> = results
            .into_iter()
            .zip(&names)
            .map(|(result, name)| match result {
                Ok(url) => url,
                Err(err) => {
                    warn!(product = %name, error = %err, "image lookup failed, using fallback");
                    artifact::FALLBACK_IMAGE_URL.to_string()
                }
            })
            .collect();

        artifact::apply_enrichment(&body, products, &urls)
    }

    async fn fail_unit(&self, unit: &WorkUnit, reason: String) -> Result<RunOutcome> {
        warn!(unit_id = unit.id, topic = %unit.topic, %reason, "pipeline run failed");
        self.deps.work_units.mark_failed(unit.id, &reason).await?;
        self.deps.metrics.record_error().await?;
        Ok(RunOutcome::Failed { reason })
    }
}
