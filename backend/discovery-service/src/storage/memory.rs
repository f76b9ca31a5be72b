use super::DiscoveryStore;
use crate::error::StorageResult;
use crate::models::{
    Credential, DanmuMark, EngagementKind, FollowDirection, Mid, User, Video, ViewRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Owned snapshot of every relation the engine reads.
///
/// Built once with the `insert_*`/`record_*` helpers and then shared
/// read-only. Relations keep the same shape guarantees as the database: one
/// view per (bv, user), set semantics for follows and engagement edges.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    users: BTreeMap<Mid, User>,
    videos: BTreeMap<String, Video>,
    following: BTreeMap<Mid, BTreeSet<Mid>>,
    followers: BTreeMap<Mid, BTreeSet<Mid>>,
    views: BTreeMap<String, BTreeMap<Mid, f64>>,
    engagement: HashMap<EngagementKind, BTreeMap<String, BTreeSet<Mid>>>,
    danmus: BTreeMap<String, Vec<DanmuMark>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&mut self, user: User) -> &mut Self {
        self.users.insert(user.mid, user);
        self
    }

    pub fn insert_video(&mut self, video: Video) -> &mut Self {
        self.videos.insert(video.bv.clone(), video);
        self
    }

    /// Self-follows are dropped.
    pub fn follow(&mut self, follower: Mid, following: Mid) -> &mut Self {
        if follower != following {
            self.following.entry(follower).or_default().insert(following);
            self.followers.entry(following).or_default().insert(follower);
        }
        self
    }

    /// Replaces any earlier watch by the same user.
    pub fn record_view(&mut self, bv: &str, user_mid: Mid, watched_duration: f64) -> &mut Self {
        self.views
            .entry(bv.to_string())
            .or_default()
            .insert(user_mid, watched_duration);
        self
    }

    pub fn record_engagement(&mut self, kind: EngagementKind, bv: &str, user_mid: Mid) -> &mut Self {
        self.engagement
            .entry(kind)
            .or_default()
            .entry(bv.to_string())
            .or_default()
            .insert(user_mid);
        self
    }

    pub fn record_danmu(&mut self, bv: &str, user_mid: Mid, time_offset: f64) -> &mut Self {
        self.danmus
            .entry(bv.to_string())
            .or_default()
            .push(DanmuMark {
                user_mid,
                time_offset,
            });
        self
    }
}

fn matches_credential(user: &User, credential: &Credential) -> bool {
    match credential {
        Credential::Mid(mid) => user.mid == *mid,
        Credential::Qq(qq) => user.qq.as_deref() == Some(qq.as_str()),
        Credential::Wechat(wechat) => user.wechat.as_deref() == Some(wechat.as_str()),
    }
}

#[async_trait]
impl DiscoveryStore for InMemoryStore {
    async fn find_users_by_credential(&self, credential: Credential) -> StorageResult<Vec<User>> {
        Ok(self
            .users
            .values()
            .filter(|user| matches_credential(user, &credential))
            .cloned()
            .collect())
    }

    async fn find_user(&self, mid: Mid) -> StorageResult<Option<User>> {
        Ok(self.users.get(&mid).cloned())
    }

    async fn find_video(&self, bv: &str) -> StorageResult<Option<Video>> {
        Ok(self.videos.get(bv).cloned())
    }

    async fn list_candidate_videos(
        &self,
        viewer_mid: Option<Mid>,
        include_unpublished: bool,
    ) -> StorageResult<Vec<Video>> {
        let now = Utc::now();
        Ok(self
            .videos
            .values()
            .filter(|video| {
                include_unpublished
                    || viewer_mid == Some(video.owner_mid)
                    || video.is_public_at(now)
            })
            .cloned()
            .collect())
    }

    async fn list_follow_edges(
        &self,
        mid: Mid,
        direction: FollowDirection,
    ) -> StorageResult<Vec<Mid>> {
        let edges = match direction {
            FollowDirection::Outgoing => self.following.get(&mid),
            FollowDirection::Incoming => self.followers.get(&mid),
        };
        Ok(edges
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn list_view_events(&self, bv: &str) -> StorageResult<Vec<ViewRecord>> {
        Ok(self
            .views
            .get(bv)
            .map(|viewers| {
                viewers
                    .iter()
                    .map(|(&user_mid, &watched_duration)| ViewRecord {
                        user_mid,
                        watched_duration,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_viewed_videos(&self, user_mid: Mid) -> StorageResult<Vec<String>> {
        Ok(self
            .views
            .iter()
            .filter(|(_, viewers)| viewers.contains_key(&user_mid))
            .map(|(bv, _)| bv.clone())
            .collect())
    }

    async fn count_engagement(&self, kind: EngagementKind, bv: &str) -> StorageResult<u64> {
        Ok(self
            .engagement
            .get(&kind)
            .and_then(|by_video| by_video.get(bv))
            .map_or(0, |users| users.len() as u64))
    }

    async fn list_danmu_events(&self, bv: &str) -> StorageResult<Vec<DanmuMark>> {
        Ok(self.danmus.get(bv).cloned().unwrap_or_default())
    }
}
