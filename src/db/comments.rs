//! Comment operations using Diesel

use diesel::prelude::*;

use super::diesel_schema::comments;
use super::models::{Comment, NewComment};
use super::posts::{self, Counter};
use super::PageRequest;
use crate::error::FeedError;

/// Get a comment by ID, deleted or not
pub fn get_comment(
    conn: &mut SqliteConnection,
    comment_id: &str,
) -> Result<Option<Comment>, FeedError> {
    Ok(comments::table
        .filter(comments::id.eq(comment_id))
        .select(Comment::as_select())
        .first(conn)
        .optional()?)
}

/// Oldest-first page of a post's live comments
pub fn list_post_comments(
    conn: &mut SqliteConnection,
    post_id: &str,
    page: PageRequest,
) -> Result<Vec<Comment>, FeedError> {
    Ok(comments::table
        .filter(comments::post_id.eq(post_id))
        .filter(comments::is_deleted.eq(0))
        .order((comments::created_at.asc(), comments::id.asc()))
        .limit(page.limit())
        .offset(page.offset())
        .select(Comment::as_select())
        .load(conn)?)
}

pub fn count_post_comments(conn: &mut SqliteConnection, post_id: &str) -> Result<i64, FeedError> {
    Ok(comments::table
        .filter(comments::post_id.eq(post_id))
        .filter(comments::is_deleted.eq(0))
        .count()
        .get_result(conn)?)
}

/// Insert a comment and bump the post's `comment_count`.
///
/// Call inside a write unit; both changes commit together.
pub fn insert_comment(
    conn: &mut SqliteConnection,
    new_comment: &NewComment,
) -> Result<Comment, FeedError> {
    diesel::insert_into(comments::table)
        .values(new_comment)
        .execute(conn)?;

    posts::increment_counter(conn, &new_comment.post_id, Counter::Comments)?;

    Ok(comments::table
        .filter(comments::id.eq(&new_comment.id))
        .select(Comment::as_select())
        .first(conn)?)
}

/// Soft-delete a live comment and release its slot in `comment_count`.
///
/// Returns false when the comment was already deleted.
pub fn soft_delete_comment(
    conn: &mut SqliteConnection,
    comment: &Comment,
    now: &str,
) -> Result<bool, FeedError> {
    let updated = diesel::update(
        comments::table
            .filter(comments::id.eq(&comment.id))
            .filter(comments::is_deleted.eq(0)),
    )
    .set((comments::is_deleted.eq(1), comments::updated_at.eq(now)))
    .execute(conn)?;

    if updated == 0 {
        return Ok(false);
    }

    posts::decrement_counter(conn, &comment.post_id, Counter::Comments)?;
    Ok(true)
}
