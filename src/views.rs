//! View types for the HTTP API boundary
//!
//! These types use camelCase serialization for web clients.
//! Row types in db/models.rs keep the snake_case storage layout.
//!
//! - Boolean coercion: SQLite stores bools as i32. Views expose proper bools.
//! - InputView types accept camelCase JSON and convert into service inputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{Challenge, Comment, MediaAttachment};
use crate::services::challenge_service::ChallengeInput;
use crate::services::post_service::CreatePostInput;

// ============================================================================
// Post Views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaView {
    pub id: String,
    pub media_type: String,
    pub url: String,
    pub object_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub duration_sec: Option<i32>,
    pub order_index: i32,
    pub transcode_status: Option<String>,
}

impl MediaView {
    /// `url` is the playable URL reconstructed from the stored key
    pub fn new(media: MediaAttachment, url: String) -> Self {
        Self {
            id: media.id,
            media_type: media.media_type,
            url,
            object_key: media.object_key,
            mime_type: media.mime_type,
            size_bytes: media.size_bytes,
            duration_sec: media.duration_sec,
            order_index: media.order_index,
            transcode_status: media.transcode_status,
        }
    }
}

/// Fully hydrated post as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub group_id: String,
    pub author_member_id: String,
    /// Member-level name within the group
    pub author_display_name: Option<String>,
    /// Identity-level name
    pub author_name: Option<String>,
    pub event_id: Option<String>,
    pub content_text: Option<String>,
    pub visibility: String,
    pub media_count: i32,
    pub media: Vec<MediaView>,
    pub like_count: i32,
    pub comment_count: i32,
    pub is_liked_by_user: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author_member_id: String,
    pub author_display_name: Option<String>,
    pub author_name: Option<String>,
    pub content_text: String,
    pub created_at: String,
    pub updated_at: String,
}

impl CommentView {
    pub fn new(comment: Comment, display_name: Option<String>, name: Option<String>) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_member_id: comment.author_member_id,
            author_display_name: display_name,
            author_name: name,
            content_text: comment.content_text,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeView {
    pub liked: bool,
    pub like_count: i32,
}

// ============================================================================
// Challenge Views
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChallengeCountsView {
    pub posts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
    pub id: String,
    pub group_id: String,
    pub event_id: Option<String>,
    pub tag: String,
    pub title: String,
    pub description: Option<String>,
    pub active: bool,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<ChallengeCountsView>,
}

impl From<Challenge> for ChallengeView {
    fn from(c: Challenge) -> Self {
        Self {
            active: c.is_active(),
            id: c.id,
            group_id: c.group_id,
            event_id: c.event_id,
            tag: c.tag,
            title: c.title,
            description: c.description,
            start_at: c.start_at,
            end_at: c.end_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
            counts: None,
        }
    }
}

// ============================================================================
// Paging
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: u32,
}

// ============================================================================
// Input Views
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInputView {
    #[serde(default)]
    pub content_text: Option<String>,
    pub visibility: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub event_id: Option<Uuid>,
}

impl From<CreatePostInputView> for CreatePostInput {
    fn from(v: CreatePostInputView) -> Self {
        Self {
            content_text: v.content_text,
            visibility: v.visibility,
            media_refs: v.media_urls,
            event_id: v.event_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentInputView {
    pub content_text: String,
}

/// Body for both challenge create and update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeInputView {
    #[serde(default)]
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
}

impl From<ChallengeInputView> for ChallengeInput {
    fn from(v: ChallengeInputView) -> Self {
        Self {
            event_id: v.event_id,
            tag: v.tag,
            title: v.title,
            description: v.description,
            active: v.active,
            start_at: v.start_at,
            end_at: v.end_at,
        }
    }
}
