use chrono::{Duration, Utc};
use discovery_service::config::EngineConfig;
use discovery_service::models::{EngagementKind, Identity, Mid, User, Video};
use discovery_service::{AuthInfo, DiscoveryEngine, InMemoryStore, Listing, Rejection};
use std::collections::BTreeSet;

fn user(mid: Mid, name: &str, level: i32, identity: Identity) -> User {
    User {
        mid,
        name: name.to_string(),
        level,
        identity,
        qq: None,
        wechat: None,
    }
}

fn video(bv: &str, owner_mid: Mid, title: &str, duration: f64, public: bool) -> Video {
    let now = Utc::now();
    Video {
        bv: bv.to_string(),
        title: title.to_string(),
        description: String::new(),
        owner_mid,
        owner_name: format!("uploader {owner_mid}"),
        commit_time: now - Duration::days(3),
        review_time: public.then(|| now - Duration::days(2)),
        public_time: Some(now - Duration::days(1)),
        duration,
        reviewer_mid: public.then_some(9),
    }
}

/// Small community:
///
/// - 1 and 2, 1 and 3 follow each other (mutual friends of 1: {2, 3})
/// - 4 follows 2 and 3, 9 follows 2
/// - 2 watched BVa and BVb, 3 watched BVa and BVc, 1 watched BVb
/// - BVhidden is unreviewed, owned by 4, watched by 2
fn community() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    let mut alice = user(1, "alice", 3, Identity::User);
    alice.qq = Some("qq-alice".to_string());

    store
        .insert_user(alice)
        .insert_user(user(2, "bob", 5, Identity::User))
        .insert_user(user(3, "carol", 2, Identity::User))
        .insert_user(user(4, "dave", 1, Identity::User))
        .insert_user(user(9, "root", 6, Identity::Superuser))
        .follow(1, 2)
        .follow(2, 1)
        .follow(1, 3)
        .follow(3, 1)
        .follow(4, 2)
        .follow(4, 3)
        .follow(9, 2);

    store
        .insert_video(video("BVa", 2, "Rust async in practice", 100.0, true))
        .insert_video(video("BVb", 3, "Learning Rust", 60.0, true))
        .insert_video(video("BVc", 4, "Rust and rust belts", 30.0, true))
        .insert_video(video("BVd", 2, "Cooking with rust-free pans", 45.0, true))
        .insert_video(video("BVe", 3, "Why rust", 20.0, true))
        .insert_video(video("BVhidden", 4, "Secret rust draft", 60.0, false))
        .insert_video(video("BVquiet", 2, "Nobody watches this", 60.0, true));

    store
        .record_view("BVa", 2, 100.0)
        .record_view("BVb", 2, 30.0)
        .record_view("BVa", 3, 50.0)
        .record_view("BVc", 3, 30.0)
        .record_view("BVb", 1, 60.0)
        .record_view("BVhidden", 2, 60.0)
        .record_view("BVd", 4, 10.0)
        .record_view("BVe", 4, 5.0)
        .record_engagement(EngagementKind::Like, "BVa", 2)
        .record_engagement(EngagementKind::Coin, "BVa", 3)
        .record_engagement(EngagementKind::Favorite, "BVc", 3)
        .record_danmu("BVa", 2, 4.0)
        .record_danmu("BVa", 3, 8.0)
        .record_danmu("BVa", 2, 55.0)
        .record_danmu("BVa", 3, 59.0)
        .record_danmu("BVa", 4, 71.0)
        .record_danmu("BVa", 4, 250.0);

    store
}

fn engine() -> DiscoveryEngine<InMemoryStore> {
    DiscoveryEngine::new(community(), EngineConfig::default())
}

fn page<T>(listing: Listing<T>) -> Vec<T> {
    match listing {
        Listing::Page(items) => items,
        Listing::Invalid(rejection) => panic!("expected a page, got {rejection:?}"),
    }
}

#[tokio::test]
async fn test_search_pages_concatenate_to_full_ranking() {
    let engine = engine();
    let alice = AuthInfo::with_mid(1);

    let full = page(engine.search_videos(&alice, "rust", 100, 1).await.unwrap());
    assert_eq!(full.len(), 5);
    assert!(!full.contains(&"BVhidden".to_string()));
    assert!(!full.contains(&"BVquiet".to_string()));
    // "Rust and rust belts" scores 2, everything else 1.
    assert_eq!(full[0], "BVc");

    let mut stitched = Vec::new();
    for num in 1..=3 {
        stitched.extend(page(engine.search_videos(&alice, "rust", 2, num).await.unwrap()));
    }
    assert_eq!(stitched, full);

    let beyond = engine.search_videos(&alice, "rust", 2, 4).await.unwrap();
    assert_eq!(beyond, Listing::Page(Vec::new()));
}

#[tokio::test]
async fn test_search_visibility_follows_caller() {
    let engine = engine();

    let owner = page(engine.search_videos(&AuthInfo::with_mid(4), "draft", 10, 1).await.unwrap());
    assert_eq!(owner, vec!["BVhidden"]);

    let admin = page(engine.search_videos(&AuthInfo::with_mid(9), "draft", 10, 1).await.unwrap());
    assert_eq!(admin, vec!["BVhidden"]);

    let stranger = page(engine.search_videos(&AuthInfo::with_mid(1), "draft", 10, 1).await.unwrap());
    assert!(stranger.is_empty());
}

#[tokio::test]
async fn test_invalid_requests_return_sentinel() {
    let engine = engine();
    let nobody = AuthInfo::with_mid(404);
    let mismatched = AuthInfo {
        mid: Some(2),
        qq: Some("qq-alice".to_string()),
        wechat: None,
    };
    let anonymous = AuthInfo::default();
    let alice = AuthInfo::with_mid(1);

    for auth in [&nobody, &mismatched, &anonymous] {
        assert_eq!(
            engine.search_videos(auth, "rust", 10, 1).await.unwrap(),
            Listing::Invalid(Rejection::AuthInvalid)
        );
        assert_eq!(
            engine.recommend_friends(auth, 10, 1).await.unwrap(),
            Listing::Invalid(Rejection::AuthInvalid)
        );
        assert_eq!(
            engine.recommend_videos_for_user(auth, 10, 1).await.unwrap(),
            Listing::Invalid(Rejection::AuthInvalid)
        );
    }

    assert!(engine.search_videos(&alice, "   ", 10, 1).await.unwrap().is_invalid());
    for (size, num) in [(0, 1), (10, 0), (-1, 1), (10, -3)] {
        assert!(engine.search_videos(&alice, "rust", size, num).await.unwrap().is_invalid());
        assert!(engine.general_recommendations(size, num).await.unwrap().is_invalid());
        assert!(engine.recommend_friends(&alice, size, num).await.unwrap().is_invalid());
        assert!(engine
            .recommend_videos_for_user(&alice, size, num)
            .await
            .unwrap()
            .is_invalid());
    }
}

#[tokio::test]
async fn test_qq_alone_authorizes() {
    let engine = engine();
    let by_qq = AuthInfo {
        qq: Some("qq-alice".to_string()),
        ..AuthInfo::default()
    };

    let principal = engine.authorize(&by_qq).await.unwrap().unwrap();
    assert_eq!(principal.mid, 1);
}

#[tokio::test]
async fn test_general_recommendations_skip_unwatched_videos() {
    let engine = engine();
    let ranked = page(engine.general_recommendations(100, 1).await.unwrap());

    assert!(!ranked.contains(&"BVquiet".to_string()));
    // Unpublished videos still count once they have views.
    assert!(ranked.contains(&"BVhidden".to_string()));
    // BVa: (1 like + 1 coin + 6 danmus + 1 completion) / 2 views = 4.5
    assert_eq!(ranked[0], "BVa");
    assert_eq!(ranked.len(), 6);

    let first = page(engine.general_recommendations(4, 1).await.unwrap());
    let second = page(engine.general_recommendations(4, 2).await.unwrap());
    assert_eq!([first, second].concat(), ranked);
}

#[tokio::test]
async fn test_friend_recommendations_share_a_following() {
    let engine = engine();
    let friends = page(engine.recommend_friends(&AuthInfo::with_mid(1), 10, 1).await.unwrap());

    // 4 shares {2, 3}, 9 shares {2}; the caller is never recommended.
    assert_eq!(friends, vec![4, 9]);

    let lonely = page(engine.recommend_friends(&AuthInfo::with_mid(2), 10, 1).await.unwrap());
    assert!(!lonely.contains(&2));
    assert!(lonely.iter().all(|mid| [3, 4, 9].contains(mid)));
}

#[tokio::test]
async fn test_video_recommendations_come_from_mutual_friends() {
    let engine = engine();
    let videos = page(
        engine
            .recommend_videos_for_user(&AuthInfo::with_mid(1), 10, 1)
            .await
            .unwrap(),
    );

    // BVa watched by both friends; BVb already seen; BVhidden not visible.
    assert_eq!(videos, vec!["BVa", "BVc"]);

    // 4 follows people who never follow back.
    let none = engine
        .recommend_videos_for_user(&AuthInfo::with_mid(4), 10, 1)
        .await
        .unwrap();
    assert_eq!(none, Listing::Page(Vec::new()));
}

#[tokio::test]
async fn test_next_video_uses_co_viewers() {
    let engine = engine();

    let next = page(engine.recommend_next_video("BVa").await.unwrap());
    // Viewers of BVa (2, 3) also watched BVb, BVc and BVhidden once each.
    assert_eq!(next, vec!["BVb", "BVc", "BVhidden"]);

    assert_eq!(
        engine.recommend_next_video("BVnope").await.unwrap(),
        Listing::Invalid(Rejection::NotFound("BVnope".to_string()))
    );
}

#[tokio::test]
async fn test_hotspots_and_view_rate() {
    let engine = engine();

    // Chunks 0 and 5 hold two danmus each; 71s is chunk 7 and 250s is outside.
    let expected: BTreeSet<u32> = [0, 5].into_iter().collect();
    assert_eq!(engine.hotspots("BVa").await.unwrap(), expected);
    assert!(engine.hotspots("BVquiet").await.unwrap().is_empty());
    assert!(engine.hotspots("BVnope").await.unwrap().is_empty());

    assert_eq!(engine.average_view_rate("BVa").await.unwrap(), Some(0.75));
    assert_eq!(engine.average_view_rate("BVquiet").await.unwrap(), None);
}
