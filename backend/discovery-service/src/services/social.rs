//! Social-graph recommenders.
//!
//! Follow edges are pulled through the store into adjacency sets and the
//! graph work (common followings, mutual friends, co-viewers) happens in
//! memory so every ordering rule stays explicit.

use super::{fetch_concurrently, gate};
use crate::error::{Rejection, Result};
use crate::models::{FollowDirection, Mid, Principal};
use crate::storage::DiscoveryStore;
use crate::utils::PageRequest;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendCandidate {
    pub mid: Mid,
    /// Accounts followed by both the caller and this user.
    pub common_followings: usize,
    pub level: i32,
}

impl FriendCandidate {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .common_followings
            .cmp(&self.common_followings)
            .then_with(|| other.level.cmp(&self.level))
            .then_with(|| self.mid.cmp(&other.mid))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub bv: String,
    /// Distinct mutual friends who watched it.
    pub friend_views: usize,
    pub owner_level: i32,
    pub public_time: Option<DateTime<Utc>>,
}

impl VideoCandidate {
    /// A missing public time sorts after every real one.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .friend_views
            .cmp(&self.friend_views)
            .then_with(|| other.owner_level.cmp(&self.owner_level))
            .then_with(|| other.public_time.cmp(&self.public_time))
            .then_with(|| self.bv.cmp(&other.bv))
    }
}

/// Users `mid` follows who follow `mid` back.
pub fn mutual_friends(following: &HashSet<Mid>, followers: &HashSet<Mid>) -> HashSet<Mid> {
    following.intersection(followers).copied().collect()
}

pub struct SocialRecommender<S> {
    store: Arc<S>,
    concurrency: usize,
    next_video_limit: usize,
}

impl<S: DiscoveryStore> SocialRecommender<S> {
    pub fn new(store: Arc<S>, concurrency: usize, next_video_limit: usize) -> Self {
        Self {
            store,
            concurrency,
            next_video_limit,
        }
    }

    async fn adjacency(&self, mid: Mid, direction: FollowDirection) -> Result<HashSet<Mid>> {
        Ok(self
            .store
            .list_follow_edges(mid, direction)
            .await?
            .into_iter()
            .filter(|&other| other != mid)
            .collect())
    }

    /// Users sharing at least one following with the caller.
    ///
    /// Overlap is gathered by walking the followers of each account the
    /// caller follows, which visits exactly the users with a non-zero
    /// intersection.
    pub async fn rank_friends(&self, caller: &Principal) -> Result<Vec<FriendCandidate>> {
        let following = self.adjacency(caller.mid, FollowDirection::Outgoing).await?;
        if following.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.store.as_ref();
        let follower_lists = fetch_concurrently(following.iter().copied(), self.concurrency, |f| {
            store.list_follow_edges(f, FollowDirection::Incoming)
        })
        .await?;

        let mut overlap: HashMap<Mid, usize> = HashMap::new();
        for followers in follower_lists {
            let distinct: HashSet<Mid> = followers.into_iter().collect();
            for v in distinct {
                if v != caller.mid {
                    *overlap.entry(v).or_default() += 1;
                }
            }
        }

        let profiles = fetch_concurrently(overlap, self.concurrency, |(mid, common)| async move {
            let user = store.find_user(mid).await?;
            Ok(user.map(|user| FriendCandidate {
                mid,
                common_followings: common,
                level: user.level,
            }))
        })
        .await?;

        // Edges to users that no longer exist are dropped.
        let mut candidates: Vec<FriendCandidate> = profiles.into_iter().flatten().collect();
        candidates.sort_by(FriendCandidate::rank_cmp);

        debug!(
            mid = caller.mid,
            following = following.len(),
            candidates = candidates.len(),
            "Friend candidates ranked"
        );
        Ok(candidates)
    }

    pub async fn recommend_friends(
        &self,
        caller: &Principal,
        page: PageRequest,
    ) -> Result<Vec<Mid>> {
        let ranked = self.rank_friends(caller).await?;
        Ok(page.slice(ranked).into_iter().map(|c| c.mid).collect())
    }

    /// Videos watched by the caller's mutual friends and not by the caller.
    ///
    /// Candidates the caller could not see in search (unreviewed or not yet
    /// public, and not their own) are dropped as well.
    pub async fn rank_videos(&self, caller: &Principal) -> Result<Vec<VideoCandidate>> {
        let following = self.adjacency(caller.mid, FollowDirection::Outgoing).await?;
        let followers = self.adjacency(caller.mid, FollowDirection::Incoming).await?;
        let friends = mutual_friends(&following, &followers);
        if friends.is_empty() {
            debug!(mid = caller.mid, "No mutual friends, nothing to recommend");
            return Ok(Vec::new());
        }

        let seen: HashSet<String> = self
            .store
            .list_viewed_videos(caller.mid)
            .await?
            .into_iter()
            .collect();

        let store = self.store.as_ref();
        let watched = fetch_concurrently(friends.iter().copied(), self.concurrency, |friend| {
            store.list_viewed_videos(friend)
        })
        .await?;

        let mut friend_views: BTreeMap<String, usize> = BTreeMap::new();
        for videos in watched {
            let distinct: HashSet<String> = videos.into_iter().collect();
            for bv in distinct {
                if !seen.contains(&bv) {
                    *friend_views.entry(bv).or_default() += 1;
                }
            }
        }

        let now = Utc::now();
        let videos = fetch_concurrently(friend_views, self.concurrency, |(bv, count)| async move {
            let video = store.find_video(&bv).await?;
            Ok(video.map(|video| (video, count)))
        })
        .await?;
        let videos: Vec<_> = videos
            .into_iter()
            .flatten()
            .filter(|(video, _)| gate::is_visible(video, caller, now))
            .collect();

        let owners: HashSet<Mid> = videos.iter().map(|(video, _)| video.owner_mid).collect();
        let owner_levels: HashMap<Mid, i32> =
            fetch_concurrently(owners, self.concurrency, |owner| async move {
                let level = store.find_user(owner).await?.map_or(0, |user| user.level);
                Ok((owner, level))
            })
            .await?
            .into_iter()
            .collect();

        let mut candidates: Vec<VideoCandidate> = videos
            .into_iter()
            .map(|(video, count)| VideoCandidate {
                owner_level: owner_levels.get(&video.owner_mid).copied().unwrap_or(0),
                public_time: video.public_time,
                friend_views: count,
                bv: video.bv,
            })
            .collect();
        candidates.sort_by(VideoCandidate::rank_cmp);

        debug!(
            mid = caller.mid,
            friends = friends.len(),
            candidates = candidates.len(),
            "Friend video candidates ranked"
        );
        Ok(candidates)
    }

    pub async fn recommend_videos(
        &self,
        caller: &Principal,
        page: PageRequest,
    ) -> Result<Vec<String>> {
        let ranked = self.rank_videos(caller).await?;
        Ok(page.slice(ranked).into_iter().map(|c| c.bv).collect())
    }

    /// Up to `next_video_limit` other videos ranked by how many viewers of
    /// `bv` also watched them, ties by `bv` asc.
    pub async fn recommend_next(&self, bv: &str) -> Result<Vec<String>> {
        if self.store.find_video(bv).await?.is_none() {
            return Err(Rejection::NotFound(bv.to_string()).into());
        }

        let viewers: HashSet<Mid> = self
            .store
            .list_view_events(bv)
            .await?
            .into_iter()
            .map(|view| view.user_mid)
            .collect();

        let store = self.store.as_ref();
        let histories = fetch_concurrently(viewers, self.concurrency, |viewer| {
            store.list_viewed_videos(viewer)
        })
        .await?;

        let mut shared: HashMap<String, usize> = HashMap::new();
        for history in histories {
            let distinct: HashSet<String> = history.into_iter().collect();
            for other in distinct {
                if other != bv {
                    *shared.entry(other).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = shared.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.next_video_limit);

        Ok(ranked.into_iter().map(|(other, _)| other).collect())
    }
}
