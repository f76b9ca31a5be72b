use crate::models::{Identity, Mid, User, Video};
use chrono::{Duration, Utc};

pub fn user(mid: Mid, name: &str, level: i32) -> User {
    User {
        mid,
        name: name.to_string(),
        level,
        identity: Identity::User,
        qq: None,
        wechat: None,
    }
}

pub fn superuser(mid: Mid, name: &str) -> User {
    User {
        identity: Identity::Superuser,
        ..user(mid, name, 6)
    }
}

/// Reviewed a day ago and public since an hour ago.
pub fn public_video(bv: &str, owner_mid: Mid, title: &str, duration: f64) -> Video {
    let now = Utc::now();
    Video {
        bv: bv.to_string(),
        title: title.to_string(),
        description: String::new(),
        owner_mid,
        owner_name: format!("owner-{owner_mid}"),
        commit_time: now - Duration::days(2),
        review_time: Some(now - Duration::days(1)),
        public_time: Some(now - Duration::hours(1)),
        duration,
        reviewer_mid: Some(0),
    }
}

pub fn unreviewed_video(bv: &str, owner_mid: Mid, title: &str, duration: f64) -> Video {
    Video {
        review_time: None,
        reviewer_mid: None,
        ..public_video(bv, owner_mid, title, duration)
    }
}
