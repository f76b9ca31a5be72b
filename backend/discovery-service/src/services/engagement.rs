use super::fetch_concurrently;
use crate::error::{Result, StorageResult};
use crate::models::{EngagementKind, Video};
use crate::storage::DiscoveryStore;
use crate::utils::PageRequest;
use std::sync::Arc;
use tracing::debug;

/// Per-video engagement counters behind the general feed score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngagementStats {
    pub views: u64,
    pub likes: u64,
    pub coins: u64,
    pub favorites: u64,
    pub danmus: u64,
    /// Views whose watched duration equals the full video duration.
    pub completions: u64,
}

impl EngagementStats {
    /// `(likes + coins + favorites + danmus + completions) / views`, or `None`
    /// for an unwatched video.
    ///
    /// The numerator is summed as an integer and divided once, so equal
    /// ratios always produce the same `f64`.
    pub fn score(&self) -> Option<f64> {
        if self.views == 0 {
            return None;
        }
        let interactions = self
            .likes
            .saturating_add(self.coins)
            .saturating_add(self.favorites)
            .saturating_add(self.danmus)
            .saturating_add(self.completions);
        Some(interactions as f64 / self.views as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredVideo {
    pub bv: String,
    pub score: f64,
}

/// General recommendations: engagement-per-view over every watched video.
pub struct EngagementAggregator<S> {
    store: Arc<S>,
    concurrency: usize,
}

impl<S: DiscoveryStore> EngagementAggregator<S> {
    pub fn new(store: Arc<S>, concurrency: usize) -> Self {
        Self { store, concurrency }
    }

    pub async fn collect_stats(&self, video: &Video) -> StorageResult<EngagementStats> {
        let views = self.store.list_view_events(&video.bv).await?;
        if views.is_empty() {
            return Ok(EngagementStats::default());
        }

        let completions = views
            .iter()
            .filter(|view| view.watched_duration == video.duration)
            .count() as u64;

        Ok(EngagementStats {
            views: views.len() as u64,
            likes: self.store.count_engagement(EngagementKind::Like, &video.bv).await?,
            coins: self.store.count_engagement(EngagementKind::Coin, &video.bv).await?,
            favorites: self
                .store
                .count_engagement(EngagementKind::Favorite, &video.bv)
                .await?,
            danmus: self.store.count_danmu(&video.bv).await?,
            completions,
        })
    }

    /// Every video with at least one view, score desc then `bv` asc.
    pub async fn rank(&self) -> Result<Vec<ScoredVideo>> {
        let videos = self.store.list_candidate_videos(None, true).await?;
        let total = videos.len();

        let scored = fetch_concurrently(videos, self.concurrency, |video| async move {
            let stats = self.collect_stats(&video).await?;
            Ok(stats.score().map(|score| ScoredVideo {
                bv: video.bv,
                score,
            }))
        })
        .await?;

        let mut ranked: Vec<ScoredVideo> = scored.into_iter().flatten().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.bv.cmp(&b.bv)));

        debug!(videos = total, watched = ranked.len(), "General recommendations scored");
        Ok(ranked)
    }

    pub async fn recommend(&self, page: PageRequest) -> Result<Vec<String>> {
        let ranked = self.rank().await?;
        Ok(page.slice(ranked).into_iter().map(|video| video.bv).collect())
    }
}
