//! Keyword relevance search.
//!
//! Relevance of a video is the sum, over every keyword and each of title,
//! description and owner name, of the keyword's non-overlapping
//! case-insensitive occurrence count in that field. Each keyword scans a
//! field independently, so two keywords may share characters but one keyword
//! never counts the same character twice.
//!
//! Ordering: relevance desc, total views desc, `bv` asc.

use super::{fetch_concurrently, gate};
use crate::error::{DiscoveryError, Result};
use crate::models::{Principal, Video};
use crate::storage::DiscoveryStore;
use crate::utils::{count_occurrences, PageRequest};
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub bv: String,
    pub relevance: usize,
    pub views: u64,
}

impl SearchHit {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .relevance
            .cmp(&self.relevance)
            .then_with(|| other.views.cmp(&self.views))
            .then_with(|| self.bv.cmp(&other.bv))
    }
}

/// Split on whitespace; an all-blank query is an invalid argument.
pub fn parse_keywords(keywords: &str) -> Result<Vec<String>> {
    let parsed: Vec<String> = keywords.split_whitespace().map(str::to_lowercase).collect();
    if parsed.is_empty() {
        return Err(DiscoveryError::invalid_argument("keywords must not be empty"));
    }
    Ok(parsed)
}

pub fn relevance(video: &Video, keywords: &[String]) -> usize {
    let fields = [
        video.title.as_str(),
        video.description.as_str(),
        video.owner_name.as_str(),
    ];
    keywords
        .iter()
        .map(|keyword| {
            fields
                .iter()
                .map(|field| count_occurrences(field, keyword))
                .sum::<usize>()
        })
        .sum()
}

pub struct SearchRanker<S> {
    store: Arc<S>,
    concurrency: usize,
}

impl<S: DiscoveryStore> SearchRanker<S> {
    pub fn new(store: Arc<S>, concurrency: usize) -> Self {
        Self { store, concurrency }
    }

    /// Full ordered hit list for an already authorized caller.
    pub async fn rank(&self, viewer: &Principal, keywords: &[String]) -> Result<Vec<SearchHit>> {
        let now = Utc::now();
        let candidates = self
            .store
            .list_candidate_videos(Some(viewer.mid), viewer.is_superuser())
            .await?;
        let candidate_count = candidates.len();

        let matched: Vec<(String, usize)> = candidates
            .into_iter()
            .filter(|video| gate::is_visible(video, viewer, now))
            .filter_map(|video| {
                let score = relevance(&video, keywords);
                (score > 0).then_some((video.bv, score))
            })
            .collect();

        let store = self.store.as_ref();
        let mut hits = fetch_concurrently(matched, self.concurrency, |(bv, relevance)| async move {
            let views = store.count_views(&bv).await?;
            Ok(SearchHit {
                bv,
                relevance,
                views,
            })
        })
        .await?;

        hits.sort_by(SearchHit::rank_cmp);

        debug!(
            mid = viewer.mid,
            candidates = candidate_count,
            hits = hits.len(),
            "Keyword search ranked"
        );
        Ok(hits)
    }

    pub async fn search(
        &self,
        viewer: &Principal,
        keywords: &[String],
        page: PageRequest,
    ) -> Result<Vec<String>> {
        let hits = self.rank(viewer, keywords).await?;
        Ok(page.slice(hits).into_iter().map(|hit| hit.bv).collect())
    }
}
