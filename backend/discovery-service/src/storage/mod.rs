//! Read-only storage contract consumed by the engine.
//!
//! Each call is expected to see a point-in-time consistent view; nothing is
//! promised across calls. Implementations own their timeouts and report them
//! as [`StorageError`](crate::error::StorageError).

mod memory;
mod postgres;

use crate::error::StorageResult;
use crate::models::{
    Credential, DanmuMark, EngagementKind, FollowDirection, Mid, User, Video, ViewRecord,
};
use async_trait::async_trait;

pub use memory::InMemoryStore;
pub use postgres::PgDiscoveryStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    /// Users whose stored identifier equals the credential. More than one row
    /// means the credential is ambiguous.
    async fn find_users_by_credential(&self, credential: Credential) -> StorageResult<Vec<User>>;

    async fn find_user(&self, mid: Mid) -> StorageResult<Option<User>>;

    async fn find_video(&self, bv: &str) -> StorageResult<Option<Video>>;

    /// Videos the viewer may see: public ones plus the viewer's own, or every
    /// video when `include_unpublished` is set.
    async fn list_candidate_videos(
        &self,
        viewer_mid: Option<Mid>,
        include_unpublished: bool,
    ) -> StorageResult<Vec<Video>>;

    async fn list_follow_edges(
        &self,
        mid: Mid,
        direction: FollowDirection,
    ) -> StorageResult<Vec<Mid>>;

    async fn list_view_events(&self, bv: &str) -> StorageResult<Vec<ViewRecord>>;

    async fn list_viewed_videos(&self, user_mid: Mid) -> StorageResult<Vec<String>>;

    async fn count_views(&self, bv: &str) -> StorageResult<u64> {
        Ok(self.list_view_events(bv).await?.len() as u64)
    }

    async fn count_engagement(&self, kind: EngagementKind, bv: &str) -> StorageResult<u64>;

    async fn list_danmu_events(&self, bv: &str) -> StorageResult<Vec<DanmuMark>>;

    async fn count_danmu(&self, bv: &str) -> StorageResult<u64> {
        Ok(self.list_danmu_events(bv).await?.len() as u64)
    }
}
