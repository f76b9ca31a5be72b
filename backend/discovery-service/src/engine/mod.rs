//! Public entry points of the discovery engine.
//!
//! Each operation authorizes the caller (when it needs one), validates its
//! arguments, runs one component against a fresh read of the store and
//! returns either a page or the [`Listing::Invalid`] sentinel. Storage
//! failures are returned as errors and abort the call.

use crate::config::{Config, EngineConfig};
use crate::error::{DiscoveryError, Result, StorageError};
use crate::models::{AuthInfo, Listing, Mid, Principal};
use crate::services::{
    search, AuthGate, EngagementAggregator, HotspotAnalyzer, SearchRanker, SocialRecommender,
};
use crate::storage::{DiscoveryStore, PgDiscoveryStore};
use crate::utils::PageRequest;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DiscoveryEngine<S> {
    gate: AuthGate<S>,
    search: SearchRanker<S>,
    engagement: EngagementAggregator<S>,
    social: SocialRecommender<S>,
    hotspot: HotspotAnalyzer<S>,
}

impl<S: DiscoveryStore> DiscoveryEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    pub fn with_shared_store(store: Arc<S>, config: EngineConfig) -> Self {
        let concurrency = config.scoring_concurrency.max(1);
        info!(
            scoring_concurrency = concurrency,
            next_video_limit = config.next_video_limit,
            "Discovery engine initialized"
        );

        Self {
            gate: AuthGate::new(Arc::clone(&store)),
            search: SearchRanker::new(Arc::clone(&store), concurrency),
            engagement: EngagementAggregator::new(Arc::clone(&store), concurrency),
            social: SocialRecommender::new(
                Arc::clone(&store),
                concurrency,
                config.next_video_limit,
            ),
            hotspot: HotspotAnalyzer::new(store),
        }
    }

    /// `Some(principal)` for a valid token, `None` for an invalid one.
    pub async fn authorize(
        &self,
        auth: &AuthInfo,
    ) -> std::result::Result<Option<Principal>, StorageError> {
        match self.gate.authorize(auth).await {
            Ok(principal) => Ok(Some(principal)),
            Err(DiscoveryError::Rejected(_)) => Ok(None),
            Err(DiscoveryError::Storage(err)) => Err(err),
        }
    }

    pub async fn search_videos(
        &self,
        auth: &AuthInfo,
        keywords: &str,
        page_size: i32,
        page_num: i32,
    ) -> std::result::Result<Listing<String>, StorageError> {
        let result = async {
            let caller = self.gate.authorize(auth).await?;
            let keywords = search::parse_keywords(keywords)?;
            let page = PageRequest::new(page_size, page_num)?;
            self.search.search(&caller, &keywords, page).await
        }
        .await;
        settle("search_videos", result)
    }

    /// Engagement-weighted feed; needs no caller.
    pub async fn general_recommendations(
        &self,
        page_size: i32,
        page_num: i32,
    ) -> std::result::Result<Listing<String>, StorageError> {
        let result = async {
            let page = PageRequest::new(page_size, page_num)?;
            self.engagement.recommend(page).await
        }
        .await;
        settle("general_recommendations", result)
    }

    pub async fn recommend_friends(
        &self,
        auth: &AuthInfo,
        page_size: i32,
        page_num: i32,
    ) -> std::result::Result<Listing<Mid>, StorageError> {
        let result = async {
            let caller = self.gate.authorize(auth).await?;
            let page = PageRequest::new(page_size, page_num)?;
            self.social.recommend_friends(&caller, page).await
        }
        .await;
        settle("recommend_friends", result)
    }

    pub async fn recommend_videos_for_user(
        &self,
        auth: &AuthInfo,
        page_size: i32,
        page_num: i32,
    ) -> std::result::Result<Listing<String>, StorageError> {
        let result = async {
            let caller = self.gate.authorize(auth).await?;
            let page = PageRequest::new(page_size, page_num)?;
            self.social.recommend_videos(&caller, page).await
        }
        .await;
        settle("recommend_videos_for_user", result)
    }

    /// Videos most often co-watched with `bv`. Unknown `bv` is invalid.
    pub async fn recommend_next_video(
        &self,
        bv: &str,
    ) -> std::result::Result<Listing<String>, StorageError> {
        let result = self.social.recommend_next(bv).await;
        settle("recommend_next_video", result)
    }

    /// Chunk indices tied for the most danmus; empty when there is nothing
    /// to report.
    pub async fn hotspots(&self, bv: &str) -> std::result::Result<BTreeSet<u32>, StorageError> {
        flatten_storage(self.hotspot.hotspots(bv).await, BTreeSet::new)
    }

    pub async fn average_view_rate(
        &self,
        bv: &str,
    ) -> std::result::Result<Option<f64>, StorageError> {
        flatten_storage(self.hotspot.average_view_rate(bv).await, || None)
    }
}

impl DiscoveryEngine<PgDiscoveryStore> {
    /// Open the Postgres pool described by `config` and build an engine on it.
    pub async fn connect(config: &Config) -> std::result::Result<Self, StorageError> {
        let store = PgDiscoveryStore::connect(&config.database).await?;
        Ok(Self::new(store, config.engine.clone()))
    }
}

fn settle<T>(
    operation: &'static str,
    result: Result<Vec<T>>,
) -> std::result::Result<Listing<T>, StorageError> {
    match &result {
        Ok(items) => debug!(operation, returned = items.len(), "Discovery call completed"),
        Err(DiscoveryError::Rejected(rejection)) => {
            debug!(operation, reason = %rejection, "Discovery call rejected")
        }
        Err(DiscoveryError::Storage(err)) => {
            warn!(operation, error = %err, "Discovery call failed in storage")
        }
    }
    Listing::settle(result)
}

fn flatten_storage<T>(
    result: Result<T>,
    on_rejected: impl FnOnce() -> T,
) -> std::result::Result<T, StorageError> {
    match result {
        Ok(value) => Ok(value),
        Err(DiscoveryError::Rejected(_)) => Ok(on_rejected()),
        Err(DiscoveryError::Storage(err)) => {
            warn!(error = %err, "Discovery call failed in storage");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;
    use crate::storage::{InMemoryStore, MockDiscoveryStore};
    use crate::test_support::{public_video, user};

    fn failing_store() -> MockDiscoveryStore {
        let mut store = MockDiscoveryStore::new();
        store
            .expect_find_users_by_credential()
            .returning(|_| Ok(vec![user(1, "alice", 1)]));
        store
            .expect_list_candidate_videos()
            .returning(|_, _| Err(StorageError::Unavailable("primary down".to_string())));
        store
            .expect_find_video()
            .returning(|_| Err(StorageError::Unavailable("primary down".to_string())));
        store
    }

    #[tokio::test]
    async fn test_storage_errors_propagate_unmodified() {
        let engine = DiscoveryEngine::new(failing_store(), EngineConfig::default());

        let search = engine
            .search_videos(&AuthInfo::with_mid(1), "rust", 10, 1)
            .await;
        assert!(matches!(search, Err(StorageError::Unavailable(ref m)) if m == "primary down"));

        assert!(engine.general_recommendations(10, 1).await.is_err());
        assert!(engine.hotspots("BV1").await.is_err());
        assert!(engine.average_view_rate("BV1").await.is_err());
    }

    fn failing_graph_store() -> MockDiscoveryStore {
        let mut store = MockDiscoveryStore::new();
        store
            .expect_find_users_by_credential()
            .returning(|_| Ok(vec![user(1, "alice", 1)]));
        store
            .expect_find_video()
            .returning(|bv| Ok(Some(public_video(bv, 2, "t", 60.0))));
        store
            .expect_list_follow_edges()
            .returning(|_, _| Err(StorageError::Unavailable("graph down".to_string())));
        store
            .expect_list_viewed_videos()
            .returning(|_| Err(StorageError::Unavailable("graph down".to_string())));
        store
            .expect_list_view_events()
            .returning(|_| Err(StorageError::Unavailable("graph down".to_string())));
        store
    }

    #[tokio::test]
    async fn test_social_storage_errors_abort_the_call() {
        let engine = DiscoveryEngine::new(failing_graph_store(), EngineConfig::default());
        let alice = AuthInfo::with_mid(1);

        let friends = engine.recommend_friends(&alice, 10, 1).await;
        assert!(matches!(friends, Err(StorageError::Unavailable(ref m)) if m == "graph down"));

        let videos = engine.recommend_videos_for_user(&alice, 10, 1).await;
        assert!(matches!(videos, Err(StorageError::Unavailable(ref m)) if m == "graph down"));

        let next = engine.recommend_next_video("BV1").await;
        assert!(matches!(next, Err(StorageError::Unavailable(ref m)) if m == "graph down"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_storage_scans() {
        let mut store = MockDiscoveryStore::new();
        store
            .expect_find_users_by_credential()
            .returning(|_| Ok(vec![user(1, "alice", 1)]));
        store.expect_list_candidate_videos().never();

        let engine = DiscoveryEngine::new(store, EngineConfig::default());
        let listing = engine
            .search_videos(&AuthInfo::with_mid(1), "rust", 0, 1)
            .await
            .unwrap();

        assert!(matches!(
            listing,
            Listing::Invalid(Rejection::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_maps_rejection_to_none() {
        let mut store = InMemoryStore::new();
        store.insert_user(user(1, "alice", 1));
        let engine = DiscoveryEngine::new(store, EngineConfig::default());

        assert_eq!(
            engine.authorize(&AuthInfo::with_mid(1)).await.unwrap().map(|p| p.mid),
            Some(1)
        );
        assert!(engine.authorize(&AuthInfo::with_mid(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_video_unknown_is_invalid() {
        let mut store = InMemoryStore::new();
        store.insert_video(public_video("BV1", 1, "t", 60.0));
        let engine = DiscoveryEngine::new(store, EngineConfig::default());

        let listing = engine.recommend_next_video("BVmissing").await.unwrap();
        assert_eq!(
            listing,
            Listing::Invalid(Rejection::NotFound("BVmissing".to_string()))
        );
        assert_eq!(
            engine.recommend_next_video("BV1").await.unwrap(),
            Listing::Page(Vec::new())
        );
    }
}
