//! Post service - post, like and comment lifecycle
//!
//! Each mutation commits in its own write unit first. Challenge matching and
//! new-post notification run afterwards; their failures are logged and never
//! reach the caller.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::Collaborators;
use crate::db::models::{current_timestamp, NewComment, NewMediaAttachment, NewPost, Visibility};
use crate::db::{comments, likes, posts, FeedDb};
use crate::error::FeedError;
use crate::views::{CommentView, PostView, ToggleLikeView};

use super::access::{require_author_or_admin, require_member, require_post_member};
use super::challenge_service::ChallengeService;
use super::events::{EventBus, FeedEvent};
use super::feed_service::FeedService;

const MAX_POST_CHARS: usize = 2000;
const MAX_COMMENT_CHARS: usize = 500;

/// Fields supplied when creating a post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub content_text: Option<String>,
    pub visibility: String,
    /// Client media URLs or keys, in display order
    pub media_refs: Vec<String>,
    pub event_id: Option<Uuid>,
}

pub struct PostService {
    db: Arc<FeedDb>,
    collaborators: Collaborators,
    events: Arc<EventBus>,
    feed: Arc<FeedService>,
    challenges: Arc<ChallengeService>,
}

impl PostService {
    pub fn new(
        db: Arc<FeedDb>,
        collaborators: Collaborators,
        events: Arc<EventBus>,
        feed: Arc<FeedService>,
        challenges: Arc<ChallengeService>,
    ) -> Self {
        Self {
            db,
            collaborators,
            events,
            feed,
            challenges,
        }
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Create a post with its media attachments
    pub fn create(
        &self,
        caller: Uuid,
        group_id: Uuid,
        input: CreatePostInput,
    ) -> Result<PostView, FeedError> {
        let member = require_member(self.collaborators.membership.as_ref(), caller, group_id)?;
        let visibility: Visibility = input.visibility.parse()?;
        let content_text = validate_post_text(input.content_text)?;

        let resolved: Vec<_> = input
            .media_refs
            .iter()
            .filter_map(|raw| match self.collaborators.media.resolve(raw) {
                Ok(media) => Some(media),
                Err(e) => {
                    warn!(reference = %raw, error = %e, "Skipping unresolvable media reference");
                    None
                }
            })
            .collect();

        let now = current_timestamp();
        let new_post = NewPost::new(
            group_id,
            member.id,
            input.event_id,
            content_text,
            visibility,
            &now,
        );
        let attachments: Vec<NewMediaAttachment> = resolved
            .into_iter()
            .enumerate()
            .map(|(i, media)| {
                NewMediaAttachment::new(
                    &new_post.id,
                    media.media_type,
                    media.object_key,
                    media.mime_type,
                    i as i32,
                    &now,
                )
            })
            .collect();

        let (post, media) = self.db.write(|conn| {
            posts::insert_post_with_media(conn, new_post.clone(), attachments.clone())
        })?;

        info!(
            post_id = %post.id,
            group_id = %post.group_id,
            media = post.media_count,
            skipped = input.media_refs.len() - post.media_count as usize,
            "Created post"
        );
        self.events.emit(FeedEvent::PostCreated {
            id: post.id.clone(),
            group_id: post.group_id.clone(),
            author_member_id: post.author_member_id.clone(),
            media_count: post.media_count as usize,
        });

        if let Err(e) = self.challenges.record_participation_for_post(&post) {
            warn!(post_id = %post.id, error = %e, "Challenge matching failed");
        }

        let author_name = self
            .collaborators
            .identity
            .get_user(caller)
            .and_then(|u| u.name)
            .unwrap_or_else(|| "Someone".to_string());
        if let Err(e) = self
            .collaborators
            .notifier
            .notify_new_post(group_id, caller, &post.id, &author_name)
        {
            warn!(post_id = %post.id, error = %e, "New-post notification failed");
        }

        Ok(self.feed.assemble_created(post, media, &member))
    }

    /// Soft-delete a post; the author or a group admin only
    pub fn delete(&self, caller: Uuid, post_id: &str) -> Result<(), FeedError> {
        let post = self.db.with_conn(|conn| posts::get_live_post(conn, post_id))?;
        let member = require_post_member(self.collaborators.membership.as_ref(), caller, &post)?;
        require_author_or_admin(
            self.collaborators.membership.as_ref(),
            &member,
            &post.author_member_id,
        )?;

        let deleted = self
            .db
            .write(|conn| posts::soft_delete_post(conn, post_id, &current_timestamp()))?;
        if !deleted {
            return Err(FeedError::NotFound(format!("Post {} not found", post_id)));
        }

        info!(post_id = %post_id, "Deleted post");
        self.events.emit(FeedEvent::PostDeleted {
            id: post.id,
            group_id: post.group_id,
        });
        Ok(())
    }

    // =========================================================================
    // Likes
    // =========================================================================

    /// Flip the caller's like on a live post
    pub fn toggle_like(&self, caller: Uuid, post_id: &str) -> Result<ToggleLikeView, FeedError> {
        let post = self.db.with_conn(|conn| posts::get_live_post(conn, post_id))?;
        let member = require_post_member(self.collaborators.membership.as_ref(), caller, &post)?;
        let member_id = member.id.to_string();

        let outcome = self
            .db
            .write(|conn| likes::toggle_like(conn, post_id, &member_id, &current_timestamp()))?;

        self.events.emit(FeedEvent::LikeToggled {
            post_id: post_id.to_string(),
            member_id,
            liked: outcome.liked,
            like_count: outcome.like_count,
        });

        Ok(ToggleLikeView {
            liked: outcome.liked,
            like_count: outcome.like_count,
        })
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Comment on a live post
    pub fn add_comment(
        &self,
        caller: Uuid,
        post_id: &str,
        content_text: &str,
    ) -> Result<CommentView, FeedError> {
        let content_text = validate_comment_text(content_text)?;
        let post = self.db.with_conn(|conn| posts::get_live_post(conn, post_id))?;
        let member = require_post_member(self.collaborators.membership.as_ref(), caller, &post)?;

        let new_comment = NewComment::new(post_id, member.id, content_text, &current_timestamp());
        let comment = self.db.write(|conn| {
            // The post may have been deleted since it was read
            posts::get_live_post(conn, post_id)?;
            comments::insert_comment(conn, &new_comment)
        })?;

        info!(comment_id = %comment.id, post_id = %post_id, "Added comment");
        self.events.emit(FeedEvent::CommentAdded {
            id: comment.id.clone(),
            post_id: comment.post_id.clone(),
            author_member_id: comment.author_member_id.clone(),
        });

        let mut views = self.feed.assemble_comments(vec![comment])?;
        views
            .pop()
            .ok_or_else(|| FeedError::Internal("Comment assembly returned nothing".into()))
    }

    /// Soft-delete a comment; the comment author or a group admin only
    pub fn delete_comment(&self, caller: Uuid, comment_id: &str) -> Result<(), FeedError> {
        let not_found = || FeedError::NotFound(format!("Comment {} not found", comment_id));

        let comment = match self.db.with_conn(|conn| comments::get_comment(conn, comment_id))? {
            Some(c) if !c.is_deleted() => c,
            _ => return Err(not_found()),
        };
        // Comments of a deleted post are unreachable
        let post = match self.db.with_conn(|conn| posts::get_live_post(conn, &comment.post_id)) {
            Err(FeedError::NotFound(_)) => return Err(not_found()),
            other => other?,
        };
        let member = require_post_member(self.collaborators.membership.as_ref(), caller, &post)?;
        require_author_or_admin(
            self.collaborators.membership.as_ref(),
            &member,
            &comment.author_member_id,
        )?;

        let deleted = self
            .db
            .write(|conn| comments::soft_delete_comment(conn, &comment, &current_timestamp()))?;
        if !deleted {
            return Err(not_found());
        }

        info!(comment_id = %comment_id, post_id = %comment.post_id, "Deleted comment");
        self.events.emit(FeedEvent::CommentDeleted {
            id: comment.id,
            post_id: comment.post_id,
        });
        Ok(())
    }
}

fn validate_post_text(content_text: Option<String>) -> Result<Option<String>, FeedError> {
    match content_text {
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) if text.chars().count() > MAX_POST_CHARS => Err(FeedError::Validation(format!(
            "Post text must be at most {} characters",
            MAX_POST_CHARS
        ))),
        other => Ok(other),
    }
}

fn validate_comment_text(content_text: &str) -> Result<String, FeedError> {
    let text = content_text.trim();
    if text.is_empty() {
        return Err(FeedError::Validation("Comment text is required".into()));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(FeedError::Validation(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_text_bounds() {
        assert_eq!(validate_post_text(None).unwrap(), None);
        assert_eq!(validate_post_text(Some("   ".into())).unwrap(), None);
        assert!(validate_post_text(Some("é".repeat(2000))).is_ok());
        assert!(validate_post_text(Some("x".repeat(2001))).is_err());
    }

    #[test]
    fn test_comment_text_bounds() {
        assert_eq!(validate_comment_text("  congrats! ").unwrap(), "congrats!");
        assert!(matches!(validate_comment_text(" \n "), Err(FeedError::Validation(_))));
        assert!(validate_comment_text(&"x".repeat(501)).is_err());
    }
}
