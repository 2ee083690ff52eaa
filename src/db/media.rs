//! Media attachment reads

use diesel::prelude::*;

use super::diesel_schema::media_attachments;
use super::models::MediaAttachment;
use crate::error::FeedError;

/// Attachments for one post in display order
pub fn media_for_post(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<Vec<MediaAttachment>, FeedError> {
    Ok(media_attachments::table
        .filter(media_attachments::post_id.eq(post_id))
        .order(media_attachments::order_index.asc())
        .select(MediaAttachment::as_select())
        .load(conn)?)
}

/// Attachments for many posts in one query, grouped by post then display order
pub fn media_for_posts(
    conn: &mut SqliteConnection,
    post_ids: &[String],
) -> Result<Vec<MediaAttachment>, FeedError> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(media_attachments::table
        .filter(media_attachments::post_id.eq_any(post_ids))
        .order((media_attachments::post_id.asc(), media_attachments::order_index.asc()))
        .select(MediaAttachment::as_select())
        .load(conn)?)
}
