//! Port interfaces for every external collaborator of the pipeline.
//!
//! The driver only ever talks to these traits; concrete adapters live in the
//! infra crate, test doubles next to the tests that use them.

use std::time::Duration;

use async_trait::async_trait;
use draftpress_domain::{GeneratedText, JobOutcome, Product, QueuedJob, Result, WorkUnit};

/// Text-generation dependency. Treated as slow, rate-limited, and flaky;
/// the driver wraps every call in retry + circuit breaker.
#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedText>;
}

/// Product-data dependency. An empty list is a valid, non-exceptional
/// outcome meaning no data exists for the topic.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch(&self, topic: &str) -> Result<Vec<Product>>;
}

/// Per-product image lookup, invoked once per item inside the bounded
/// concurrency executor.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn image_url(&self, product_name: &str) -> Result<String>;
}

/// Artifact publisher. Assumed effectively atomic: either the content lands
/// durably and a commit id is returned, or an error is raised.
#[async_trait]
pub trait ArticlePublisher: Send + Sync {
    async fn publish(&self, filename: &str, content: &str) -> Result<String>;
}

/// Persistent pool of work units (topics waiting to become articles).
#[async_trait]
pub trait WorkUnitStore: Send + Sync {
    /// Insert a new pending topic. Duplicate topics return the existing id.
    async fn add(&self, topic: &str) -> Result<i64>;

    /// Atomically claim the oldest pending unit, transitioning it to
    /// `Assigned`. Returns `None` when nothing is pending.
    async fn claim_next(&self) -> Result<Option<WorkUnit>>;

    async fn mark_completed(&self, id: i64) -> Result<()>;

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()>;

    /// Crash recovery: return units stuck in `Assigned` longer than
    /// `timeout` to `Pending`. Returns the number of units reset.
    async fn reset_stale(&self, timeout: Duration) -> Result<usize>;

    async fn get(&self, id: i64) -> Result<Option<WorkUnit>>;
}

/// Durable FIFO queue for deferred background work.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a new pending job; returns its id.
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<i64>;

    /// Atomically claim the oldest pending job, transitioning it to
    /// `InProgress` with a start timestamp. `None` when nothing is pending.
    async fn dequeue(&self) -> Result<Option<QueuedJob>>;

    /// Transition an `InProgress` job to its terminal state. Completing a
    /// job that is not `InProgress` is an error, never a silent overwrite.
    async fn complete(&self, job_id: i64, outcome: JobOutcome) -> Result<()>;

    /// Crash recovery: return jobs stuck `InProgress` longer than `timeout`
    /// to `Pending`. Returns the number of jobs reset.
    async fn reset_stale_jobs(&self, timeout: Duration) -> Result<usize>;

    async fn pending_count(&self) -> Result<u64>;
}

/// Daily operational counters.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record_published(&self, tokens_used: u64) -> Result<()>;

    async fn record_generation_failure(&self) -> Result<()>;

    async fn record_error(&self) -> Result<()>;
}

/// Fire-and-forget operator notification. Implementations swallow their own
/// failures and report delivery as a plain bool; the pipeline never blocks
/// or fails on this path.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &str) -> bool;
}
