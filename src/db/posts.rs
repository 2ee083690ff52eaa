//! Post operations using Diesel
//!
//! Counter columns are only ever changed through `increment_counter` /
//! `decrement_counter`, which update the column in place instead of
//! reading it into the caller first.

use diesel::prelude::*;
use diesel::sql_types::Text;

use super::diesel_schema::{media_attachments, posts};
use super::models::{MediaAttachment, NewMediaAttachment, NewPost, Post};
use super::PageRequest;
use crate::error::FeedError;

/// Denormalized counter columns on `posts`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Likes,
    Comments,
}

impl Counter {
    fn column(&self) -> &'static str {
        match self {
            Counter::Likes => "like_count",
            Counter::Comments => "comment_count",
        }
    }
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get a post by ID, deleted or not
pub fn get_post(conn: &mut SqliteConnection, post_id: &str) -> Result<Option<Post>, FeedError> {
    Ok(posts::table
        .filter(posts::id.eq(post_id))
        .select(Post::as_select())
        .first(conn)
        .optional()?)
}

/// Get a post that has not been soft-deleted, or `NotFound`
pub fn get_live_post(conn: &mut SqliteConnection, post_id: &str) -> Result<Post, FeedError> {
    match get_post(conn, post_id)? {
        Some(post) if !post.is_deleted() => Ok(post),
        _ => Err(FeedError::NotFound(format!("Post {} not found", post_id))),
    }
}

/// Newest-first page of a group's live posts
pub fn list_group_posts(
    conn: &mut SqliteConnection,
    group_id: &str,
    page: PageRequest,
) -> Result<Vec<Post>, FeedError> {
    Ok(posts::table
        .filter(posts::group_id.eq(group_id))
        .filter(posts::is_deleted.eq(0))
        .order((posts::created_at.desc(), posts::id.desc()))
        .limit(page.limit())
        .offset(page.offset())
        .select(Post::as_select())
        .load(conn)?)
}

/// Total live posts in a group
pub fn count_group_posts(conn: &mut SqliteConnection, group_id: &str) -> Result<i64, FeedError> {
    Ok(posts::table
        .filter(posts::group_id.eq(group_id))
        .filter(posts::is_deleted.eq(0))
        .count()
        .get_result(conn)?)
}

/// Newest-first page of one member's live posts within a group
pub fn list_member_posts(
    conn: &mut SqliteConnection,
    group_id: &str,
    author_member_id: &str,
    page: PageRequest,
) -> Result<Vec<Post>, FeedError> {
    Ok(posts::table
        .filter(posts::group_id.eq(group_id))
        .filter(posts::author_member_id.eq(author_member_id))
        .filter(posts::is_deleted.eq(0))
        .order((posts::created_at.desc(), posts::id.desc()))
        .limit(page.limit())
        .offset(page.offset())
        .select(Post::as_select())
        .load(conn)?)
}

/// Total live posts by one member within a group
pub fn count_member_posts(
    conn: &mut SqliteConnection,
    group_id: &str,
    author_member_id: &str,
) -> Result<i64, FeedError> {
    Ok(posts::table
        .filter(posts::group_id.eq(group_id))
        .filter(posts::author_member_id.eq(author_member_id))
        .filter(posts::is_deleted.eq(0))
        .count()
        .get_result(conn)?)
}

// ============================================================================
// Write Operations
// ============================================================================

/// Insert a post and its attachments; `media_count` is set to the number written.
///
/// Must run inside the caller's transaction so the post, its attachments and
/// the count land together.
pub fn insert_post_with_media(
    conn: &mut SqliteConnection,
    mut new_post: NewPost,
    media: Vec<NewMediaAttachment>,
) -> Result<(Post, Vec<MediaAttachment>), FeedError> {
    new_post.media_count = media.len() as i32;

    diesel::insert_into(posts::table)
        .values(&new_post)
        .execute(conn)?;

    if !media.is_empty() {
        diesel::insert_into(media_attachments::table)
            .values(&media)
            .execute(conn)?;
    }

    let post = posts::table
        .filter(posts::id.eq(&new_post.id))
        .select(Post::as_select())
        .first(conn)?;

    let attachments = media_attachments::table
        .filter(media_attachments::post_id.eq(&new_post.id))
        .order(media_attachments::order_index.asc())
        .select(MediaAttachment::as_select())
        .load(conn)?;

    Ok((post, attachments))
}

/// Atomically add one to a counter column
pub fn increment_counter(
    conn: &mut SqliteConnection,
    post_id: &str,
    counter: Counter,
) -> Result<(), FeedError> {
    let col = counter.column();
    let sql = format!("UPDATE posts SET {col} = {col} + 1 WHERE id = ?");
    let updated = diesel::sql_query(sql).bind::<Text, _>(post_id).execute(conn)?;
    if updated == 0 {
        return Err(FeedError::NotFound(format!("Post {} not found", post_id)));
    }
    Ok(())
}

/// Atomically subtract one from a counter column, never going below zero
pub fn decrement_counter(
    conn: &mut SqliteConnection,
    post_id: &str,
    counter: Counter,
) -> Result<(), FeedError> {
    let col = counter.column();
    let sql = format!(
        "UPDATE posts SET {col} = CASE WHEN {col} > 0 THEN {col} - 1 ELSE 0 END WHERE id = ?"
    );
    let updated = diesel::sql_query(sql).bind::<Text, _>(post_id).execute(conn)?;
    if updated == 0 {
        return Err(FeedError::NotFound(format!("Post {} not found", post_id)));
    }
    Ok(())
}

/// Mark a post deleted; children are retained
pub fn soft_delete_post(
    conn: &mut SqliteConnection,
    post_id: &str,
    now: &str,
) -> Result<bool, FeedError> {
    let updated = diesel::update(
        posts::table
            .filter(posts::id.eq(post_id))
            .filter(posts::is_deleted.eq(0)),
    )
    .set((posts::is_deleted.eq(1), posts::updated_at.eq(now)))
    .execute(conn)?;

    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{current_timestamp, MediaType, Visibility};
    use crate::db::FeedDb;
    use uuid::Uuid;

    fn post_at(group_id: Uuid, author: Uuid, created_at: &str) -> NewPost {
        NewPost::new(group_id, author, None, Some("hello".into()), Visibility::Public, created_at)
    }

    #[test]
    fn test_insert_sets_media_count_and_order() {
        let db = FeedDb::open_in_memory().unwrap();
        let now = current_timestamp();
        let new_post = post_at(Uuid::new_v4(), Uuid::new_v4(), &now);
        let media: Vec<NewMediaAttachment> = ["a.jpg", "b.mp4", "c.mp3"]
            .iter()
            .enumerate()
            .map(|(i, key)| {
                NewMediaAttachment::new(
                    &new_post.id,
                    MediaType::Image,
                    key.to_string(),
                    "image/jpeg".into(),
                    i as i32,
                    &now,
                )
            })
            .collect();

        let (post, attachments) = db
            .write(|conn| insert_post_with_media(conn, new_post.clone(), media.clone()))
            .unwrap();

        assert_eq!(post.media_count, 3);
        let keys: Vec<_> = attachments.iter().map(|m| m.object_key.as_str()).collect();
        assert_eq!(keys, ["a.jpg", "b.mp4", "c.mp3"]);
        let order: Vec<_> = attachments.iter().map(|m| m.order_index).collect();
        assert_eq!(order, [0, 1, 2]);
    }

    #[test]
    fn test_feed_orders_newest_first_with_id_tiebreak() {
        let db = FeedDb::open_in_memory().unwrap();
        let group = Uuid::new_v4();
        let author = Uuid::new_v4();

        let older = post_at(group, author, "2026-01-01T10:00:00.000000Z");
        let tie_a = post_at(group, author, "2026-01-01T11:00:00.000000Z");
        let tie_b = post_at(group, author, "2026-01-01T11:00:00.000000Z");
        let mut tied = vec![tie_a.id.clone(), tie_b.id.clone()];
        tied.sort();
        tied.reverse();

        for p in [older.clone(), tie_a, tie_b] {
            db.write(|conn| insert_post_with_media(conn, p.clone(), vec![])).unwrap();
        }

        let page = db
            .with_conn(|conn| list_group_posts(conn, &group.to_string(), PageRequest::new(0, 10)))
            .unwrap();
        let ids: Vec<_> = page.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![tied[0].clone(), tied[1].clone(), older.id]);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let db = FeedDb::open_in_memory().unwrap();
        let new_post = post_at(Uuid::new_v4(), Uuid::new_v4(), &current_timestamp());
        let id = new_post.id.clone();
        db.write(|conn| insert_post_with_media(conn, new_post.clone(), vec![])).unwrap();

        db.write(|conn| decrement_counter(conn, &id, Counter::Likes)).unwrap();
        db.write(|conn| increment_counter(conn, &id, Counter::Likes)).unwrap();
        db.write(|conn| increment_counter(conn, &id, Counter::Comments)).unwrap();

        let post = db.with_conn(|conn| get_live_post(conn, &id)).unwrap();
        assert_eq!(post.like_count, 1);
        assert_eq!(post.comment_count, 1);
    }

    #[test]
    fn test_counter_on_missing_post_is_not_found() {
        let db = FeedDb::open_in_memory().unwrap();
        let result = db.write(|conn| increment_counter(conn, "missing", Counter::Likes));
        assert!(matches!(result, Err(FeedError::NotFound(_))));
    }

    #[test]
    fn test_soft_deleted_posts_leave_the_feed() {
        let db = FeedDb::open_in_memory().unwrap();
        let group = Uuid::new_v4();
        let new_post = post_at(group, Uuid::new_v4(), &current_timestamp());
        let id = new_post.id.clone();
        db.write(|conn| insert_post_with_media(conn, new_post.clone(), vec![])).unwrap();

        assert!(db.write(|conn| soft_delete_post(conn, &id, &current_timestamp())).unwrap());
        assert!(!db.write(|conn| soft_delete_post(conn, &id, &current_timestamp())).unwrap());

        let gid = group.to_string();
        assert_eq!(db.with_conn(|conn| count_group_posts(conn, &gid)).unwrap(), 0);
        assert!(matches!(
            db.with_conn(|conn| get_live_post(conn, &id)),
            Err(FeedError::NotFound(_))
        ));
        assert!(db.with_conn(|conn| get_post(conn, &id)).unwrap().is_some());
    }
}
