//! Danmu hotspots and view-rate analytics.
//!
//! Offsets map to `floor(offset / 10)`, except that a danmu at exactly the
//! video's duration joins the last chunk and offsets outside `[0, duration]`
//! are ignored.

use crate::error::Result;
use crate::models::{DanmuMark, Video};
use crate::storage::DiscoveryStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Width of one hotspot bucket, in seconds.
pub const CHUNK_SECONDS: f64 = 10.0;

/// Number of chunks covering `duration`.
pub fn chunk_count(duration: f64) -> u32 {
    if duration <= 0.0 || !duration.is_finite() {
        return 0;
    }
    (duration / CHUNK_SECONDS).ceil() as u32
}

/// Chunk index of a danmu, or `None` when its offset lies outside the video.
/// The final instant of the video belongs to the last chunk.
pub fn chunk_of(time_offset: f64, duration: f64) -> Option<u32> {
    let chunks = chunk_count(duration);
    if chunks == 0 || !(0.0..=duration).contains(&time_offset) {
        return None;
    }
    let index = (time_offset / CHUNK_SECONDS).floor() as u32;
    Some(index.min(chunks - 1))
}

/// Every chunk tied for the highest danmu count.
pub fn hottest_chunks(video: &Video, marks: &[DanmuMark]) -> BTreeSet<u32> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for mark in marks {
        if let Some(chunk) = chunk_of(mark.time_offset, video.duration) {
            *counts.entry(chunk).or_default() += 1;
        }
    }

    let Some(max) = counts.values().copied().max() else {
        return BTreeSet::new();
    };
    counts
        .into_iter()
        .filter(|&(_, count)| count == max)
        .map(|(chunk, _)| chunk)
        .collect()
}

/// Per-video timeline analytics: hotspot chunks and average view rate.
pub struct HotspotAnalyzer<S> {
    store: Arc<S>,
}

impl<S: DiscoveryStore> HotspotAnalyzer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Empty for an unknown video or one without danmus.
    pub async fn hotspots(&self, bv: &str) -> Result<BTreeSet<u32>> {
        let Some(video) = self.store.find_video(bv).await? else {
            debug!(bv, "Hotspot requested for unknown video");
            return Ok(BTreeSet::new());
        };

        let marks = self.store.list_danmu_events(bv).await?;
        if marks.is_empty() {
            return Ok(BTreeSet::new());
        }

        let chunks = hottest_chunks(&video, &marks);
        debug!(bv, danmus = marks.len(), hotspots = chunks.len(), "Hotspots computed");
        Ok(chunks)
    }

    /// Mean watched duration over the video's duration.
    ///
    /// `None` for an unknown video, a video nobody watched, or a zero
    /// duration.
    pub async fn average_view_rate(&self, bv: &str) -> Result<Option<f64>> {
        let Some(video) = self.store.find_video(bv).await? else {
            return Ok(None);
        };
        if video.duration <= 0.0 {
            return Ok(None);
        }

        let views = self.store.list_view_events(bv).await?;
        if views.is_empty() {
            return Ok(None);
        }

        let total: f64 = views.iter().map(|view| view.watched_duration).sum();
        Ok(Some(total / views.len() as f64 / video.duration))
    }
}
