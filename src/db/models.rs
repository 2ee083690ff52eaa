//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data), built through
//!   explicit constructors that stamp ids and timestamps
//!
//! Enumerated columns are stored as upper-case TEXT and parsed at this layer.

use std::fmt;
use std::str::FromStr;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::diesel_schema::*;
use crate::error::FeedError;

// ============================================================================
// Timestamp / Id Helpers (SQLite stores both as TEXT)
// ============================================================================

/// Current UTC timestamp as RFC 3339 with microseconds.
///
/// Fixed width, so lexicographic order on the TEXT column is chronological order.
pub fn current_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

/// Parse an RFC 3339 instant supplied by a client and normalize it to the stored format
pub fn normalize_timestamp(raw: &str) -> Result<String, FeedError> {
    let parsed = chrono::DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|e| {
            FeedError::Validation(format!("'{}' is not an RFC 3339 timestamp: {}", raw, e))
        })?;
    Ok(parsed
        .with_timezone(&chrono::Utc)
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string())
}

/// Fresh opaque identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a stored TEXT id back to a UUID
pub fn parse_id(raw: &str) -> Result<Uuid, FeedError> {
    Uuid::parse_str(raw).map_err(|e| FeedError::Internal(format!("Corrupt id '{}': {}", raw, e)))
}

// ============================================================================
// Enumerations
// ============================================================================

macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = FeedError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(FeedError::Validation(format!(
                        "{} '{}' is not valid. Valid values: {:?}",
                        $label,
                        other,
                        [$($text),+]
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Visibility, "visibility", {
    Public => "PUBLIC",
    Private => "PRIVATE",
    Friends => "FRIENDS",
});

text_enum!(MediaType, "media type", {
    Image => "IMAGE",
    Video => "VIDEO",
    Audio => "AUDIO",
});

text_enum!(TranscodeStatus, "transcode status", {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Ready => "READY",
    Failed => "FAILED",
});

impl MediaType {
    /// Initial transcode state for a freshly attached item
    pub fn initial_transcode_status(&self) -> Option<TranscodeStatus> {
        match self {
            MediaType::Video => Some(TranscodeStatus::Pending),
            MediaType::Image | MediaType::Audio => None,
        }
    }
}

// ============================================================================
// Post Models
// ============================================================================

/// Post row from SELECT query
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Post {
    pub id: String,
    pub group_id: String,
    pub author_member_id: String,
    pub event_id: Option<String>,
    pub content_text: Option<String>,
    pub visibility: String,
    pub is_deleted: i32,
    pub media_count: i32,
    pub like_count: i32,
    pub comment_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    pub fn is_deleted(&self) -> bool {
        self.is_deleted != 0
    }
}

/// New post for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub id: String,
    pub group_id: String,
    pub author_member_id: String,
    pub event_id: Option<String>,
    pub content_text: Option<String>,
    pub visibility: String,
    pub is_deleted: i32,
    pub media_count: i32,
    pub like_count: i32,
    pub comment_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl NewPost {
    /// Counters start at zero; `media_count` is set when attachments are written
    pub fn new(
        group_id: Uuid,
        author_member_id: Uuid,
        event_id: Option<Uuid>,
        content_text: Option<String>,
        visibility: Visibility,
        now: &str,
    ) -> Self {
        Self {
            id: new_id(),
            group_id: group_id.to_string(),
            author_member_id: author_member_id.to_string(),
            event_id: event_id.map(|e| e.to_string()),
            content_text,
            visibility: visibility.as_str().to_string(),
            is_deleted: 0,
            media_count: 0,
            like_count: 0,
            comment_count: 0,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

// ============================================================================
// Media Models
// ============================================================================

/// Media attachment row from SELECT query
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = media_attachments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MediaAttachment {
    pub id: String,
    pub post_id: String,
    pub media_type: String,
    pub object_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub duration_sec: Option<i32>,
    pub order_index: i32,
    pub transcode_status: Option<String>,
    pub created_at: String,
}

/// New media attachment for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = media_attachments)]
pub struct NewMediaAttachment {
    pub id: String,
    pub post_id: String,
    pub media_type: String,
    pub object_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub duration_sec: Option<i32>,
    pub order_index: i32,
    pub transcode_status: Option<String>,
    pub created_at: String,
}

impl NewMediaAttachment {
    /// Size and duration are unknown at attach time and filled in by transcoding
    pub fn new(
        post_id: &str,
        media_type: MediaType,
        object_key: String,
        mime_type: String,
        order_index: i32,
        now: &str,
    ) -> Self {
        Self {
            id: new_id(),
            post_id: post_id.to_string(),
            media_type: media_type.as_str().to_string(),
            object_key,
            mime_type,
            size_bytes: 0,
            duration_sec: None,
            order_index,
            transcode_status: media_type
                .initial_transcode_status()
                .map(|s| s.as_str().to_string()),
            created_at: now.to_string(),
        }
    }
}

// ============================================================================
// Comment Models
// ============================================================================

/// Comment row from SELECT query
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_member_id: String,
    pub content_text: String,
    pub is_deleted: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.is_deleted != 0
    }
}

/// New comment for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub id: String,
    pub post_id: String,
    pub author_member_id: String,
    pub content_text: String,
    pub is_deleted: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl NewComment {
    pub fn new(post_id: &str, author_member_id: Uuid, content_text: String, now: &str) -> Self {
        Self {
            id: new_id(),
            post_id: post_id.to_string(),
            author_member_id: author_member_id.to_string(),
            content_text,
            is_deleted: 0,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

// ============================================================================
// Like Models
// ============================================================================

/// Like row; at most one per (post_id, member_id)
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = likes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Like {
    pub id: String,
    pub post_id: String,
    pub member_id: String,
    pub created_at: String,
}

impl Like {
    pub fn new(post_id: &str, member_id: &str, now: &str) -> Self {
        Self {
            id: new_id(),
            post_id: post_id.to_string(),
            member_id: member_id.to_string(),
            created_at: now.to_string(),
        }
    }
}

// ============================================================================
// Challenge Models
// ============================================================================

/// Challenge row from SELECT query
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = challenges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Challenge {
    pub id: String,
    pub group_id: String,
    pub event_id: Option<String>,
    pub tag: String,
    pub title: String,
    pub description: Option<String>,
    pub active: i32,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Challenge {
    pub fn is_active(&self) -> bool {
        self.active != 0
    }

    /// Group-wide challenges match any post; event-scoped ones only posts of that event
    pub fn applies_to_event(&self, post_event_id: Option<&str>) -> bool {
        match self.event_id.as_deref() {
            None => true,
            Some(event_id) => post_event_id == Some(event_id),
        }
    }
}

/// New challenge for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = challenges)]
pub struct NewChallenge {
    pub id: String,
    pub group_id: String,
    pub event_id: Option<String>,
    pub tag: String,
    pub title: String,
    pub description: Option<String>,
    pub active: i32,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Full-row replacement applied by an update
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = challenges)]
#[diesel(treat_none_as_null = true)]
pub struct ChallengeChangeset {
    pub event_id: Option<String>,
    pub tag: String,
    pub title: String,
    pub description: Option<String>,
    pub active: i32,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub updated_at: String,
}

/// Participation row; at most one per (challenge_id, post_id)
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = challenge_participations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChallengeParticipation {
    pub id: String,
    pub challenge_id: String,
    pub post_id: String,
    pub member_id: Option<String>,
    pub created_at: String,
}

impl ChallengeParticipation {
    pub fn new(challenge_id: &str, post_id: &str, member_id: Option<&str>, now: &str) -> Self {
        Self {
            id: new_id(),
            challenge_id: challenge_id.to_string(),
            post_id: post_id.to_string(),
            member_id: member_id.map(str::to_string),
            created_at: now.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_parse_is_case_insensitive() {
        assert_eq!("public".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!(" Friends ".parse::<Visibility>().unwrap(), Visibility::Friends);
        let err = "everyone".parse::<Visibility>().unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
    }

    #[test]
    fn test_only_video_starts_pending() {
        assert_eq!(MediaType::Video.initial_transcode_status(), Some(TranscodeStatus::Pending));
        assert_eq!(MediaType::Image.initial_transcode_status(), None);
        assert_eq!(MediaType::Audio.initial_transcode_status(), None);
    }

    #[test]
    fn test_timestamps_sort_chronologically() {
        let a = normalize_timestamp("2026-06-01T09:00:00+05:30").unwrap();
        let b = normalize_timestamp("2026-06-01T04:00:00.5Z").unwrap();
        assert_eq!(a, "2026-06-01T03:30:00.000000Z");
        assert!(a < b);
        assert!(normalize_timestamp("next tuesday").is_err());
    }

    #[test]
    fn test_event_scope_matching() {
        let mut challenge = Challenge {
            id: new_id(),
            group_id: new_id(),
            event_id: None,
            tag: "#firstdance".into(),
            title: "First dance".into(),
            description: None,
            active: 1,
            start_at: None,
            end_at: None,
            created_at: current_timestamp(),
            updated_at: current_timestamp(),
        };
        assert!(challenge.applies_to_event(None));
        assert!(challenge.applies_to_event(Some("sangeet")));

        challenge.event_id = Some("sangeet".into());
        assert!(challenge.applies_to_event(Some("sangeet")));
        assert!(!challenge.applies_to_event(Some("reception")));
        assert!(!challenge.applies_to_event(None));
    }
}
