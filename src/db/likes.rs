//! Like operations using Diesel
//!
//! The `likes` row set is the source of truth; `posts.like_count` follows it
//! inside the same transaction.

use diesel::prelude::*;

use super::diesel_schema::likes;
use super::models::Like;
use super::posts::{self, Counter};
use crate::error::FeedError;

/// Outcome of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub liked: bool,
    pub like_count: i32,
}

/// Flip `member_id`'s like on `post_id`.
///
/// Must run inside an immediate write unit so the existence check, the row
/// change and the counter update are serialized against concurrent toggles.
pub fn toggle_like(
    conn: &mut SqliteConnection,
    post_id: &str,
    member_id: &str,
    now: &str,
) -> Result<ToggleOutcome, FeedError> {
    let removed = diesel::delete(
        likes::table
            .filter(likes::post_id.eq(post_id))
            .filter(likes::member_id.eq(member_id)),
    )
    .execute(conn)?;

    let liked = if removed > 0 {
        posts::decrement_counter(conn, post_id, Counter::Likes)?;
        false
    } else {
        diesel::insert_into(likes::table)
            .values(&Like::new(post_id, member_id, now))
            .execute(conn)?;
        posts::increment_counter(conn, post_id, Counter::Likes)?;
        true
    };

    let post = posts::get_live_post(conn, post_id)?;
    Ok(ToggleOutcome {
        liked,
        like_count: post.like_count,
    })
}

/// Whether `member_id` has liked `post_id`
pub fn has_liked(
    conn: &mut SqliteConnection,
    post_id: &str,
    member_id: &str,
) -> Result<bool, FeedError> {
    let count: i64 = likes::table
        .filter(likes::post_id.eq(post_id))
        .filter(likes::member_id.eq(member_id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// All of `member_id`'s likes among `post_ids` in one query
pub fn likes_for_member(
    conn: &mut SqliteConnection,
    member_id: &str,
    post_ids: &[String],
) -> Result<Vec<Like>, FeedError> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(likes::table
        .filter(likes::member_id.eq(member_id))
        .filter(likes::post_id.eq_any(post_ids))
        .select(Like::as_select())
        .load(conn)?)
}

pub fn count_likes(conn: &mut SqliteConnection, post_id: &str) -> Result<i64, FeedError> {
    Ok(likes::table
        .filter(likes::post_id.eq(post_id))
        .count()
        .get_result(conn)?)
}
