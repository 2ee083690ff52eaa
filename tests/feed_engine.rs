//! End-to-end feed scenarios against a file-backed database

use std::sync::{Arc, Mutex};
use std::thread;

use memory_wall::collaborators::{
    MemberRole, MemberStatus, NotificationDispatch, PublicUrlResolver, StaticDirectory,
};
use memory_wall::db::{challenges, likes, FeedDb};
use memory_wall::services::{ChallengeInput, ChallengeQuery, CreatePostInput, PagingLimits};
use memory_wall::{Collaborators, FeedError, Services};
use tempfile::TempDir;
use uuid::Uuid;

const MEDIA_URL: &str = "https://cdn.example.com/media";

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, Uuid, String, String)>>,
    fail: bool,
}

impl NotificationDispatch for RecordingNotifier {
    fn notify_new_post(
        &self,
        group_id: Uuid,
        excluded_user_id: Uuid,
        post_id: &str,
        author_name: &str,
    ) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("push gateway down");
        }
        self.sent.lock().unwrap().push((
            group_id,
            excluded_user_id,
            post_id.to_string(),
            author_name.to_string(),
        ));
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    services: Services,
    directory: Arc<StaticDirectory>,
    notifier: Arc<RecordingNotifier>,
    db: Arc<FeedDb>,
    group: Uuid,
    admin: Uuid,
    alice: Uuid,
    alice_member: Uuid,
}

fn fixture_with(notifier: RecordingNotifier) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(FeedDb::open(&dir.path().join("feed.db"), 4, 10).unwrap());

    let directory = Arc::new(StaticDirectory::new());
    let group = Uuid::new_v4();
    let admin = directory.add_user("Grace");
    directory.add_member(admin, group, Some("Host"), MemberRole::Admin, MemberStatus::Accepted);
    let alice = directory.add_user("Alice");
    let alice_member =
        directory.add_member(alice, group, Some("Ali"), MemberRole::Member, MemberStatus::Accepted);

    let notifier = Arc::new(notifier);
    let collaborators = Collaborators::from_directory(
        directory.clone(),
        Arc::new(PublicUrlResolver::new(MEDIA_URL)),
        notifier.clone(),
    );
    let services = Services::new(db.clone(), collaborators, PagingLimits::default());

    Fixture {
        _dir: dir,
        services,
        directory,
        notifier,
        db,
        group,
        admin,
        alice,
        alice_member,
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingNotifier::default())
}

fn post_input(text: &str, media: &[&str]) -> CreatePostInput {
    CreatePostInput {
        content_text: Some(text.to_string()),
        visibility: "PUBLIC".to_string(),
        media_refs: media.iter().map(|m| m.to_string()).collect(),
        event_id: None,
    }
}

fn challenge_input(tag: &str, title: &str) -> ChallengeInput {
    ChallengeInput {
        tag: Some(tag.to_string()),
        title: Some(title.to_string()),
        ..ChallengeInput::default()
    }
}

#[test]
fn test_wedding_feed_scenario() {
    let f = fixture();
    let challenge = f
        .services
        .challenges
        .create(f.admin, f.group, challenge_input("FirstDance", "Best first dance"))
        .unwrap();
    assert_eq!(challenge.tag, "#firstdance");
    assert!(challenge.active);

    let post = f
        .services
        .posts
        .create(
            f.alice,
            f.group,
            post_input(
                "Our #FirstDance at last! #firstdance",
                &[
                    &format!("{}/{}/dance.mp4", MEDIA_URL, f.group),
                    "cake.jpg",
                ],
            ),
        )
        .unwrap();

    assert_eq!(post.author_member_id, f.alice_member.to_string());
    assert_eq!(post.author_display_name.as_deref(), Some("Ali"));
    assert_eq!(post.author_name.as_deref(), Some("Alice"));
    assert_eq!(post.media_count, 2);
    assert_eq!(post.media[0].media_type, "VIDEO");
    assert_eq!(post.media[0].object_key, "dance.mp4");
    assert_eq!(post.media[0].url, format!("{}/{}/dance.mp4", MEDIA_URL, f.group));
    assert_eq!(post.media[1].mime_type, "image/jpeg");
    assert_eq!(post.like_count, 0);
    assert!(!post.is_liked_by_user);

    // Recurring tag still yields one participation
    let listed = f
        .services
        .challenges
        .list(
            f.alice,
            f.group,
            ChallengeQuery {
                include_counts: true,
                ..ChallengeQuery::default()
            },
        )
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].counts.map(|c| c.posts), Some(1));

    let like = f.services.posts.toggle_like(f.admin, &post.id).unwrap();
    assert!(like.liked);
    assert_eq!(like.like_count, 1);

    let comment = f
        .services
        .posts
        .add_comment(f.admin, &post.id, "  So lovely ")
        .unwrap();
    assert_eq!(comment.content_text, "So lovely");
    assert_eq!(comment.author_name.as_deref(), Some("Grace"));

    let feed = f
        .services
        .feed
        .list_group_feed(f.admin, f.group, None, None)
        .unwrap();
    assert_eq!(feed.total_elements, 1);
    assert_eq!(feed.total_pages, 1);
    let item = &feed.items[0];
    assert_eq!(item.like_count, 1);
    assert_eq!(item.comment_count, 1);
    assert!(item.is_liked_by_user);

    let sent = f.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![(f.group, f.alice, post.id.clone(), "Alice".to_string())]);
}

#[test]
fn test_first_dance_like_is_per_viewer() {
    let f = fixture();
    let challenge = f
        .services
        .challenges
        .create(f.admin, f.group, challenge_input("#firstdance", "First dance"))
        .unwrap();
    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("Hi #firstdance", &[]))
        .unwrap();
    assert_eq!((post.media_count, post.like_count, post.comment_count), (0, 0, 0));

    f.db.with_conn(|conn| {
        let recorded = challenges::participations_for_post(conn, &post.id)?;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].challenge_id, challenge.id);
        assert_eq!(recorded[0].member_id.as_deref(), Some(post.author_member_id.as_str()));
        Ok(())
    })
    .unwrap();

    let like = f.services.posts.toggle_like(f.admin, &post.id).unwrap();
    assert_eq!(like.like_count, 1);
    assert!(f.services.feed.get_post(f.admin, &post.id).unwrap().is_liked_by_user);
    assert!(!f.services.feed.get_post(f.alice, &post.id).unwrap().is_liked_by_user);
}

#[test]
fn test_non_member_is_rejected_everywhere() {
    let f = fixture();
    let stranger = f.directory.add_user("Mallory");
    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("hello", &[]))
        .unwrap();

    assert!(matches!(
        f.services.feed.list_group_feed(stranger, f.group, None, None),
        Err(FeedError::NotMember(_))
    ));
    assert!(matches!(
        f.services.posts.toggle_like(stranger, &post.id),
        Err(FeedError::NotMember(_))
    ));
    assert!(matches!(
        f.services.posts.create(stranger, f.group, post_input("hi", &[])),
        Err(FeedError::NotMember(_))
    ));

    let pending = f.directory.add_user("Pat");
    f.directory
        .add_member(pending, f.group, None, MemberRole::Member, MemberStatus::Pending);
    assert!(matches!(
        f.services.feed.get_post(pending, &post.id),
        Err(FeedError::NotMember(_))
    ));
}

#[test]
fn test_concurrent_likes_keep_counter_equal_to_rows() {
    let f = fixture();
    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("like me", &[]))
        .unwrap();

    let users: Vec<Uuid> = (0..8)
        .map(|i| {
            let user = f.directory.add_user(&format!("guest{}", i));
            f.directory
                .add_member(user, f.group, None, MemberRole::Member, MemberStatus::Accepted);
            user
        })
        .collect();

    let posts = f.services.posts.clone();
    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let posts = posts.clone();
            let post_id = post.id.clone();
            thread::spawn(move || posts.toggle_like(user, &post_id))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().unwrap().liked);
    }

    let rows = f
        .db
        .with_conn(|conn| likes::count_likes(conn, &post.id))
        .unwrap();
    let view = f.services.feed.get_post(f.alice, &post.id).unwrap();
    assert_eq!(rows, 8);
    assert_eq!(view.like_count as i64, rows);
}

#[test]
fn test_toggle_twice_restores_state() {
    let f = fixture();
    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("toggle", &[]))
        .unwrap();

    let first = f.services.posts.toggle_like(f.alice, &post.id).unwrap();
    let second = f.services.posts.toggle_like(f.alice, &post.id).unwrap();
    assert_eq!((first.liked, first.like_count), (true, 1));
    assert_eq!((second.liked, second.like_count), (false, 0));

    let view = f.services.feed.get_post(f.alice, &post.id).unwrap();
    assert!(!view.is_liked_by_user);
    assert_eq!(view.like_count, 0);
}

#[test]
fn test_deleted_post_is_unreachable() {
    let f = fixture();
    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("soon gone", &[]))
        .unwrap();
    let comment = f
        .services
        .posts
        .add_comment(f.admin, &post.id, "nice")
        .unwrap();

    // Only the author or an admin may delete
    let bob = f.directory.add_user("Bob");
    f.directory
        .add_member(bob, f.group, None, MemberRole::Member, MemberStatus::Accepted);
    assert!(matches!(
        f.services.posts.delete(bob, &post.id),
        Err(FeedError::Forbidden(_))
    ));

    f.services.posts.delete(f.alice, &post.id).unwrap();

    assert!(matches!(
        f.services.posts.toggle_like(f.alice, &post.id),
        Err(FeedError::NotFound(_))
    ));
    assert!(matches!(
        f.services.posts.add_comment(f.alice, &post.id, "late"),
        Err(FeedError::NotFound(_))
    ));
    assert!(matches!(
        f.services.posts.delete_comment(f.admin, &comment.id),
        Err(FeedError::NotFound(_))
    ));
    assert!(matches!(
        f.services.feed.get_post(f.alice, &post.id),
        Err(FeedError::NotFound(_))
    ));
    assert!(matches!(
        f.services.posts.delete(f.alice, &post.id),
        Err(FeedError::NotFound(_))
    ));

    let feed = f
        .services
        .feed
        .list_group_feed(f.alice, f.group, None, None)
        .unwrap();
    assert!(feed.items.is_empty());
    assert_eq!(feed.total_pages, 0);
}

#[test]
fn test_comment_delete_keeps_counter_in_step() {
    let f = fixture();
    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("comments", &[]))
        .unwrap();
    let first = f.services.posts.add_comment(f.admin, &post.id, "one").unwrap();
    f.services.posts.add_comment(f.alice, &post.id, "two").unwrap();

    assert!(matches!(
        f.services.posts.delete_comment(f.alice, &first.id),
        Err(FeedError::Forbidden(_))
    ));
    f.services.posts.delete_comment(f.admin, &first.id).unwrap();
    assert!(matches!(
        f.services.posts.delete_comment(f.admin, &first.id),
        Err(FeedError::NotFound(_))
    ));

    let comments = f
        .services
        .feed
        .list_post_comments(f.alice, &post.id, None, None)
        .unwrap();
    assert_eq!(comments.total_elements, 1);
    assert_eq!(comments.items[0].content_text, "two");
    assert_eq!(
        f.services.feed.get_post(f.alice, &post.id).unwrap().comment_count,
        1
    );
}

#[test]
fn test_page_assembly_matches_single_assembly() {
    let f = fixture();
    for i in 0..5 {
        let user = if i % 2 == 0 { f.alice } else { f.admin };
        let media = format!("photo{}.png", i);
        let post = f
            .services
            .posts
            .create(user, f.group, post_input(&format!("post {}", i), &[&media, "clip.mov"]))
            .unwrap();
        if i % 3 == 0 {
            f.services.posts.toggle_like(f.alice, &post.id).unwrap();
        }
    }

    let page = f
        .services
        .feed
        .list_group_feed(f.alice, f.group, Some(0), Some(10))
        .unwrap();
    assert_eq!(page.items.len(), 5);
    for item in &page.items {
        let single = f.services.feed.get_post(f.alice, &item.id).unwrap();
        assert_eq!(&single, item);
    }

    // Newest first
    assert_eq!(page.items[0].content_text.as_deref(), Some("post 4"));
    assert_eq!(page.items[4].content_text.as_deref(), Some("post 0"));
}

#[test]
fn test_paging_windows_and_limits() {
    let f = fixture();
    for i in 0..5 {
        f.services
            .posts
            .create(f.alice, f.group, post_input(&format!("p{}", i), &[]))
            .unwrap();
    }

    let page = f
        .services
        .feed
        .list_group_feed(f.alice, f.group, Some(2), Some(2))
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages, 3);

    let beyond = f
        .services
        .feed
        .list_group_feed(f.alice, f.group, Some(9), Some(2))
        .unwrap();
    assert!(beyond.items.is_empty());

    assert!(matches!(
        f.services.feed.list_group_feed(f.alice, f.group, Some(0), Some(0)),
        Err(FeedError::Validation(_))
    ));

    let mine = f
        .services
        .feed
        .list_member_posts(f.admin, f.group, f.alice_member, None, None)
        .unwrap();
    assert_eq!(mine.total_elements, 5);
}

#[test]
fn test_participation_unique_and_scoped_to_event() {
    let f = fixture();
    let event = Uuid::new_v4();
    f.services
        .challenges
        .create(
            f.admin,
            f.group,
            ChallengeInput {
                event_id: Some(event),
                ..challenge_input("#toast", "Best toast")
            },
        )
        .unwrap();
    let inactive = f
        .services
        .challenges
        .create(
            f.admin,
            f.group,
            ChallengeInput {
                active: Some(false),
                ..challenge_input("#cake", "Cake")
            },
        )
        .unwrap();

    let other_event = f
        .services
        .posts
        .create(
            f.alice,
            f.group,
            CreatePostInput {
                event_id: Some(Uuid::new_v4()),
                ..post_input("#toast #cake", &[])
            },
        )
        .unwrap();
    let matching = f
        .services
        .posts
        .create(
            f.alice,
            f.group,
            CreatePostInput {
                event_id: Some(event),
                ..post_input("#Toast #TOAST #cake", &[])
            },
        )
        .unwrap();

    f.db.with_conn(|conn| {
        assert!(challenges::participations_for_post(conn, &other_event.id)?.is_empty());
        let recorded = challenges::participations_for_post(conn, &matching.id)?;
        assert_eq!(recorded.len(), 1);
        assert_eq!(challenges::count_participations(conn, &inactive.id)?, 0);
        Ok(())
    })
    .unwrap();

    // Replaying the match records nothing new
    let post = f
        .db
        .with_conn(|conn| memory_wall::db::posts::get_live_post(conn, &matching.id))
        .unwrap();
    assert_eq!(
        f.services.challenges.record_participation_for_post(&post).unwrap(),
        0
    );
}

#[test]
fn test_challenge_admin_rules_and_update_semantics() {
    let f = fixture();
    assert!(matches!(
        f.services
            .challenges
            .create(f.alice, f.group, challenge_input("#toast", "Toast")),
        Err(FeedError::Forbidden(_))
    ));

    let event = Uuid::new_v4();
    let created = f
        .services
        .challenges
        .create(
            f.admin,
            f.group,
            ChallengeInput {
                event_id: Some(event),
                description: Some("Raise a glass".into()),
                start_at: Some("2026-06-01T10:00:00Z".into()),
                ..challenge_input("#toast", "Toast")
            },
        )
        .unwrap();

    assert!(matches!(
        f.services
            .challenges
            .create(f.admin, f.group, ChallengeInput {
                event_id: Some(event),
                ..challenge_input("TOAST", "Again")
            }),
        Err(FeedError::Conflict(_))
    ));
    // Same tag in the group-wide scope is a different scope
    f.services
        .challenges
        .create(f.admin, f.group, challenge_input("#toast", "Group toast"))
        .unwrap();

    // Omitted title and description are kept; the window is replaced
    let updated = f
        .services
        .challenges
        .update(
            f.admin,
            f.group,
            &created.id,
            ChallengeInput {
                event_id: Some(event),
                active: Some(false),
                ..ChallengeInput::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Toast");
    assert_eq!(updated.description.as_deref(), Some("Raise a glass"));
    assert!(!updated.active);
    assert_eq!(updated.event_id, Some(event.to_string()));
    assert_eq!(updated.start_at, None);

    // Omitting the event moves it group-wide, where #toast is taken
    assert!(matches!(
        f.services.challenges.update(
            f.admin,
            f.group,
            &created.id,
            ChallengeInput {
                title: Some("Renamed".into()),
                ..ChallengeInput::default()
            },
        ),
        Err(FeedError::Conflict(_))
    ));

    let all = f
        .services
        .challenges
        .list(
            f.alice,
            f.group,
            ChallengeQuery {
                active_only: false,
                ..ChallengeQuery::default()
            },
        )
        .unwrap();
    assert_eq!(all.len(), 2);

    f.services
        .challenges
        .delete(f.admin, f.group, &created.id)
        .unwrap();
    assert!(matches!(
        f.services.challenges.delete(f.admin, Uuid::new_v4(), &created.id),
        Err(FeedError::Forbidden(_))
    ));
    assert!(matches!(
        f.services.challenges.delete(f.admin, f.group, &created.id),
        Err(FeedError::NotFound(_))
    ));
}

#[test]
fn test_side_effect_failures_do_not_fail_the_post() {
    let f = fixture_with(RecordingNotifier {
        fail: true,
        ..RecordingNotifier::default()
    });

    let post = f
        .services
        .posts
        .create(
            f.alice,
            f.group,
            post_input("still posted", &["   ", "ok.gif", &format!("{}/", MEDIA_URL)]),
        )
        .unwrap();
    assert_eq!(post.media_count, 1);
    assert_eq!(post.media[0].object_key, "ok.gif");
    assert!(f.notifier.sent.lock().unwrap().is_empty());

    let feed = f
        .services
        .feed
        .list_group_feed(f.alice, f.group, None, None)
        .unwrap();
    assert_eq!(feed.total_elements, 1);
}

#[test]
fn test_validation_failures() {
    let f = fixture();
    assert!(matches!(
        f.services.posts.create(
            f.alice,
            f.group,
            CreatePostInput {
                visibility: "SECRET".into(),
                ..post_input("x", &[])
            }
        ),
        Err(FeedError::Validation(_))
    ));
    assert!(matches!(
        f.services
            .posts
            .create(f.alice, f.group, post_input(&"x".repeat(2001), &[])),
        Err(FeedError::Validation(_))
    ));

    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("   ", &[]))
        .unwrap();
    assert_eq!(post.content_text, None);
    assert!(matches!(
        f.services.posts.add_comment(f.alice, &post.id, "  "),
        Err(FeedError::Validation(_))
    ));
    assert!(matches!(
        f.services.posts.toggle_like(f.alice, "not-a-post"),
        Err(FeedError::NotFound(_))
    ));
}

#[test]
fn test_concurrent_toggles_from_one_member_stay_consistent() {
    let f = fixture();
    let post = f
        .services
        .posts
        .create(f.alice, f.group, post_input("double tap", &[]))
        .unwrap();

    let handles: Vec<_> = (0..9)
        .map(|_| {
            let posts = f.services.posts.clone();
            let post_id = post.id.clone();
            let user = f.admin;
            thread::spawn(move || posts.toggle_like(user, &post_id))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    // An odd number of flips ends liked
    let rows = f
        .db
        .with_conn(|conn| likes::count_likes(conn, &post.id))
        .unwrap();
    let view = f.services.feed.get_post(f.admin, &post.id).unwrap();
    assert_eq!(rows, 1);
    assert_eq!(view.like_count as i64, rows);
    assert!(view.is_liked_by_user);
}

#[test]
fn test_feed_returns_media_in_input_order() {
    let f = fixture();
    f.services
        .posts
        .create(f.alice, f.group, post_input("mixed", &["c.mp3", "a.jpg", "b.mp4"]))
        .unwrap();

    let feed = f
        .services
        .feed
        .list_group_feed(f.alice, f.group, None, None)
        .unwrap();
    let media: Vec<(&str, i32, Option<&str>)> = feed.items[0]
        .media
        .iter()
        .map(|m| {
            (
                m.object_key.as_str(),
                m.order_index,
                m.transcode_status.as_deref(),
            )
        })
        .collect();
    assert_eq!(
        media,
        vec![
            ("c.mp3", 0, None),
            ("a.jpg", 1, None),
            ("b.mp4", 2, Some("PENDING")),
        ]
    );
    assert_eq!(feed.items[0].media_count, 3);
}

#[test]
fn test_create_response_matches_stored_view() {
    let f = fixture();
    let created = f
        .services
        .posts
        .create(f.alice, f.group, post_input("fresh", &["one.png", "two.webm"]))
        .unwrap();

    let stored = f.services.feed.get_post(f.alice, &created.id).unwrap();
    assert_eq!(created, stored);
    assert_eq!(created.media.len(), 2);
}
