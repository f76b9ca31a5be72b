use super::DiscoveryStore;
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::models::{
    Credential, DanmuMark, EngagementKind, FollowDirection, Identity, Mid, User, Video, ViewRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

const VIDEO_COLUMNS: &str = r#"
    bv, title, COALESCE(description, '') AS description, owner_mid, owner_name,
    commit_time, review_time, public_time, duration::FLOAT8 AS duration, reviewer_mid
"#;

const USER_COLUMNS: &str = "mid, name, level::INT4 AS level, identity, qq, wechat";

const DANMU_EVENTS_SQL: &str = "SELECT user_mid, time::FLOAT8 FROM danmu WHERE bv = $1";

#[derive(sqlx::FromRow)]
struct UserRow {
    mid: i64,
    name: String,
    level: i32,
    identity: String,
    qq: Option<String>,
    wechat: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            mid: row.mid,
            name: row.name,
            level: row.level,
            identity: Identity::from_db(&row.identity),
            qq: row.qq,
            wechat: row.wechat,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    bv: String,
    title: String,
    description: String,
    owner_mid: i64,
    owner_name: String,
    commit_time: DateTime<Utc>,
    review_time: Option<DateTime<Utc>>,
    public_time: Option<DateTime<Utc>>,
    duration: f64,
    reviewer_mid: Option<i64>,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            bv: row.bv,
            title: row.title,
            description: row.description,
            owner_mid: row.owner_mid,
            owner_name: row.owner_name,
            commit_time: row.commit_time,
            review_time: row.review_time,
            public_time: row.public_time,
            duration: row.duration,
            reviewer_mid: row.reviewer_mid,
        }
    }
}

fn engagement_table(kind: EngagementKind) -> &'static str {
    match kind {
        EngagementKind::Like => "thumbs_up",
        EngagementKind::Coin => "coin",
        EngagementKind::Favorite => "favorite",
    }
}

fn to_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// PostgreSQL-backed store over the video platform schema (read only).
///
/// Timestamps are expected as `TIMESTAMPTZ`. Every statement runs under
/// `query_timeout`.
#[derive(Clone)]
pub struct PgDiscoveryStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgDiscoveryStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        debug!(
            "Creating database pool: max={}, min={}, acquire_timeout={:?}",
            config.max_connections, config.min_connections, config.acquire_timeout
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        let store = Self::new(pool, config.query_timeout);
        store.health_check().await?;
        info!("Discovery store connected");
        Ok(store)
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        self.timed(sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }

    async fn timed<T, F>(&self, query: F) -> StorageResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result.map_err(|e| {
                warn!(error = %e, "Discovery store query failed");
                StorageError::Database(e)
            }),
            Err(_) => {
                warn!(timeout = ?self.query_timeout, "Discovery store query timed out");
                Err(StorageError::Timeout(self.query_timeout))
            }
        }
    }
}

#[async_trait]
impl DiscoveryStore for PgDiscoveryStore {
    async fn find_users_by_credential(&self, credential: Credential) -> StorageResult<Vec<User>> {
        let rows = match credential {
            Credential::Mid(mid) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE mid = $1");
                self.timed(
                    sqlx::query_as::<_, UserRow>(&sql)
                        .bind(mid)
                        .fetch_all(&self.pool),
                )
                .await?
            }
            Credential::Qq(qq) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE qq = $1");
                self.timed(
                    sqlx::query_as::<_, UserRow>(&sql)
                        .bind(qq)
                        .fetch_all(&self.pool),
                )
                .await?
            }
            Credential::Wechat(wechat) => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE wechat = $1");
                self.timed(
                    sqlx::query_as::<_, UserRow>(&sql)
                        .bind(wechat)
                        .fetch_all(&self.pool),
                )
                .await?
            }
        };
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_user(&self, mid: Mid) -> StorageResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE mid = $1");
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(mid)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_video(&self, bv: &str) -> StorageResult<Option<Video>> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM video WHERE bv = $1");
        let row = self
            .timed(
                sqlx::query_as::<_, VideoRow>(&sql)
                    .bind(bv)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Video::from))
    }

    async fn list_candidate_videos(
        &self,
        viewer_mid: Option<Mid>,
        include_unpublished: bool,
    ) -> StorageResult<Vec<Video>> {
        let sql = format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM video
            WHERE $1
               OR owner_mid = $2
               OR (review_time IS NOT NULL AND public_time IS NOT NULL AND public_time <= NOW())
            "#
        );
        let rows = self
            .timed(
                sqlx::query_as::<_, VideoRow>(&sql)
                    .bind(include_unpublished)
                    .bind(viewer_mid)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(Video::from).collect())
    }

    async fn list_follow_edges(
        &self,
        mid: Mid,
        direction: FollowDirection,
    ) -> StorageResult<Vec<Mid>> {
        let sql = match direction {
            FollowDirection::Outgoing => {
                "SELECT following_mid FROM follow WHERE follower_mid = $1 AND following_mid <> $1"
            }
            FollowDirection::Incoming => {
                "SELECT follower_mid FROM follow WHERE following_mid = $1 AND follower_mid <> $1"
            }
        };
        self.timed(
            sqlx::query_scalar::<_, i64>(sql)
                .bind(mid)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn list_view_events(&self, bv: &str) -> StorageResult<Vec<ViewRecord>> {
        let rows = self
            .timed(
                sqlx::query_as::<_, (i64, f64)>(
                    r#"
                    SELECT user_mid, last_watch_time_duration::FLOAT8
                    FROM view
                    WHERE video_bv = $1
                    "#,
                )
                .bind(bv)
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|(user_mid, watched_duration)| ViewRecord {
                user_mid,
                watched_duration,
            })
            .collect())
    }

    async fn list_viewed_videos(&self, user_mid: Mid) -> StorageResult<Vec<String>> {
        self.timed(
            sqlx::query_scalar::<_, String>(
                "SELECT DISTINCT video_bv FROM view WHERE user_mid = $1",
            )
            .bind(user_mid)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn count_views(&self, bv: &str) -> StorageResult<u64> {
        let count = self
            .timed(
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM view WHERE video_bv = $1")
                    .bind(bv)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(to_count(count))
    }

    async fn count_engagement(&self, kind: EngagementKind, bv: &str) -> StorageResult<u64> {
        let sql = format!(
            "SELECT COUNT(DISTINCT user_mid) FROM {} WHERE video_bv = $1",
            engagement_table(kind)
        );
        let count = self
            .timed(
                sqlx::query_scalar::<_, i64>(&sql)
                    .bind(bv)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(to_count(count))
    }

    async fn list_danmu_events(&self, bv: &str) -> StorageResult<Vec<DanmuMark>> {
        let rows = self
            .timed(
                sqlx::query_as::<_, (i64, f64)>(DANMU_EVENTS_SQL)
                    .bind(bv)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|(user_mid, time_offset)| DanmuMark {
                user_mid,
                time_offset,
            })
            .collect())
    }

    async fn count_danmu(&self, bv: &str) -> StorageResult<u64> {
        let count = self
            .timed(
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM danmu WHERE bv = $1")
                    .bind(bv)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(to_count(count))
    }
}
