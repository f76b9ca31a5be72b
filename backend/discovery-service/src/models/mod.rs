use crate::error::{DiscoveryError, Rejection, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric user identity.
pub type Mid = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    User,
    Superuser,
}

impl Identity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Identity::User => "user",
            Identity::Superuser => "superuser",
        }
    }

    /// Anything other than `superuser` is treated as a regular account.
    pub fn from_db(value: &str) -> Self {
        if value.eq_ignore_ascii_case("superuser") {
            Identity::Superuser
        } else {
            Identity::User
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub mid: Mid,
    pub name: String,
    pub level: i32,
    pub identity: Identity,
    pub qq: Option<String>,
    pub wechat: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub bv: String,
    pub title: String,
    pub description: String,
    pub owner_mid: Mid,
    pub owner_name: String,
    pub commit_time: DateTime<Utc>,
    pub review_time: Option<DateTime<Utc>>,
    pub public_time: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: f64,
    pub reviewer_mid: Option<Mid>,
}

impl Video {
    pub fn is_reviewed(&self) -> bool {
        self.review_time.is_some()
    }

    /// Reviewed and past its public time.
    pub fn is_public_at(&self, now: DateTime<Utc>) -> bool {
        self.is_reviewed() && self.public_time.is_some_and(|t| t <= now)
    }
}

/// Most recent watch of a video by one user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub user_mid: Mid,
    pub watched_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DanmuMark {
    pub user_mid: Mid,
    pub time_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Like,
    Coin,
    Favorite,
}

impl EngagementKind {
    pub const ALL: [EngagementKind; 3] = [
        EngagementKind::Like,
        EngagementKind::Coin,
        EngagementKind::Favorite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Coin => "coin",
            EngagementKind::Favorite => "favorite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowDirection {
    /// Accounts the user follows.
    Outgoing,
    /// Accounts following the user.
    Incoming,
}

/// Caller credentials. Every field that is present must point at the same user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub mid: Option<Mid>,
    pub qq: Option<String>,
    pub wechat: Option<String>,
}

impl AuthInfo {
    pub fn with_mid(mid: Mid) -> Self {
        Self {
            mid: Some(mid),
            ..Self::default()
        }
    }

    /// Provided identifiers, skipping blank social ids.
    pub fn credentials(&self) -> Vec<Credential> {
        let mut credentials = Vec::with_capacity(3);
        if let Some(mid) = self.mid {
            credentials.push(Credential::Mid(mid));
        }
        if let Some(qq) = self.qq.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            credentials.push(Credential::Qq(qq.to_string()));
        }
        if let Some(wechat) = self.wechat.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            credentials.push(Credential::Wechat(wechat.to_string()));
        }
        credentials
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credential {
    Mid(Mid),
    Qq(String),
    Wechat(String),
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Mid(_) => "mid",
            Credential::Qq(_) => "qq",
            Credential::Wechat(_) => "wechat",
        }
    }
}

/// An authorized caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub mid: Mid,
    pub identity: Identity,
}

impl Principal {
    pub fn is_superuser(&self) -> bool {
        self.identity == Identity::Superuser
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            mid: user.mid,
            identity: user.identity,
        }
    }
}

/// Result of a ranking operation: either the "invalid" sentinel or a page,
/// which may legitimately be empty.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<T> {
    Invalid(Rejection),
    Page(Vec<T>),
}

impl<T> Listing<T> {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Listing::Invalid(_))
    }

    pub fn items(&self) -> Option<&[T]> {
        match self {
            Listing::Page(items) => Some(items),
            Listing::Invalid(_) => None,
        }
    }

    pub fn into_items(self) -> Option<Vec<T>> {
        match self {
            Listing::Page(items) => Some(items),
            Listing::Invalid(_) => None,
        }
    }

    /// Folds a component result into the sentinel form; storage failures
    /// stay errors.
    pub fn settle(result: Result<Vec<T>, DiscoveryError>) -> Result<Self, StorageError> {
        match result {
            Ok(items) => Ok(Listing::Page(items)),
            Err(DiscoveryError::Rejected(rejection)) => Ok(Listing::Invalid(rejection)),
            Err(DiscoveryError::Storage(err)) => Err(err),
        }
    }
}
