//! Bounded parallel fan-out over independent async lookups.

use futures::stream::{self, StreamExt};
use std::future::Future;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Run `f` over every item with at most `concurrency` futures in flight.
///
/// Results come back in completion order, not input order.
pub async fn parallel_map<I, T, F, Fut, R>(items: I, concurrency: usize, f: F) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(f)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_parallel_map_collects_all_results() {
        let mut results = parallel_map(1..=20, 4, |n| async move { n * 2 }).await;
        results.sort();
        assert_eq!(results, (1..=20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_parallel_map_respects_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        parallel_map(0..12, 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_parallel_map_zero_concurrency_still_runs() {
        let results = parallel_map(vec!["a"], 0, |s| async move { s.len() }).await;
        assert_eq!(results, vec![1]);
    }
}
