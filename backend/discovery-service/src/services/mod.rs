pub mod engagement;
pub mod gate;
pub mod hotspot;
pub mod search;
pub mod social;

pub use engagement::EngagementAggregator;
pub use gate::AuthGate;
pub use hotspot::HotspotAnalyzer;
pub use search::SearchRanker;
pub use social::SocialRecommender;

use crate::error::StorageError;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Run one storage lookup per item with at most `concurrency` in flight.
///
/// Results come back in completion order, so callers sort afterwards. The
/// first error aborts the whole batch.
pub(crate) async fn fetch_concurrently<I, T, F, Fut>(
    items: I,
    concurrency: usize,
    lookup: F,
) -> Result<Vec<T>, StorageError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    stream::iter(items)
        .map(lookup)
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_concurrently_collects_all() {
        let mut doubled = fetch_concurrently(1..=5, 2, |n| async move { Ok(n * 2) })
            .await
            .unwrap();
        doubled.sort();
        assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
    }

    #[tokio::test]
    async fn test_fetch_concurrently_stops_on_error() {
        let result: Result<Vec<i32>, _> = fetch_concurrently(1..=5, 0, |n| async move {
            if n == 3 {
                Err(StorageError::Unavailable("boom".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
