//! Bounded-concurrency fan-out/fan-in over independent operations.
//!
//! [`parallel_map`] runs one async operation per input item with at most
//! `max_workers` in flight, and returns per-item results in input order
//! regardless of completion order. A failing (or panicking) item is captured
//! in its own slot and never aborts its siblings — partial success is the
//! normal case here, not an exception path.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

/// Per-item failure captured by [`parallel_map`].
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// The operation returned an error.
    #[error("task failed")]
    Failed {
        #[source]
        source: E,
    },

    /// The operation panicked; the panic is isolated to this slot.
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Run `operation` over `items` with bounded concurrency.
///
/// The result vector has the same length and order as `items`. At most
/// `max_workers` operations run concurrently (a value of 0 is treated as 1).
/// Terminates once every item has been attempted, even when some fail.
pub async fn parallel_map<I, T, E, F, Fut>(
    items: Vec<I>,
    max_workers: usize,
    operation: F,
) -> Vec<Result<T, TaskError<E>>>
where
    I: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));

    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let semaphore = Arc::clone(&semaphore);
            let operation = operation.clone();
            tokio::spawn(async move {
                // The semaphore is never closed, so acquisition only fails
                // during runtime shutdown; run unthrottled in that case.
                let _permit = semaphore.acquire_owned().await.ok();
                operation(item).await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        let slot = match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TaskError::Failed { source: err }),
            Err(join_err) => {
                warn!(index, error = %join_err, "parallel task panicked");
                Err(TaskError::Panicked(join_err.to_string()))
            }
        };
        results.push(slot);
    }
    results
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn preserves_input_order() {
        let results = parallel_map(vec![1u64, 2, 3, 4], 2, |n| async move {
            // Later items finish first; order must still match the input.
            tokio::time::sleep(Duration::from_millis(40 / n)).await;
            Ok::<_, std::io::Error>(n * n)
        })
        .await;

        let values: Vec<_> = results.into_iter().map(|r| r.ok()).collect();
        assert_eq!(values, vec![Some(1), Some(4), Some(9), Some(16)]);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_siblings() {
        let results = parallel_map(vec![1u32, 2, 3, 4], 2, |n| async move {
            if n == 2 {
                Err(std::io::Error::other("item 2 failed"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(TaskError::Failed { .. })));
        assert!(results[2].is_ok());
        assert!(results[3].is_ok());
    }

    #[tokio::test]
    async fn panic_is_isolated_to_its_slot() {
        let results = parallel_map(vec![1u32, 2, 3], 3, |n| async move {
            assert!(n != 2, "induced panic");
            Ok::<_, std::io::Error>(n)
        })
        .await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(TaskError::Panicked(_))));
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn respects_worker_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_clone = Arc::clone(&in_flight);
        let peak_clone = Arc::clone(&peak);
        let results = parallel_map(vec![(); 8], 2, move |()| {
            let in_flight = Arc::clone(&in_flight_clone);
            let peak = Arc::clone(&peak_clone);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(())
            }
        })
        .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2, "worker bound exceeded");
    }

    #[tokio::test]
    async fn more_items_than_workers_terminates() {
        let results = parallel_map((0..64u32).collect(), 3, |n| async move {
            Ok::<_, std::io::Error>(n)
        })
        .await;
        assert_eq!(results.len(), 64);
        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn zero_workers_treated_as_one() {
        let results =
            parallel_map(vec![1u32, 2], 0, |n| async move { Ok::<_, std::io::Error>(n) }).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let results: Vec<Result<u32, TaskError<std::io::Error>>> =
            parallel_map(Vec::new(), 4, |n: u32| async move { Ok(n) }).await;
        assert!(results.is_empty());
    }
}
