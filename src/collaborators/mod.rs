//! Contracts the feed engine consumes from neighbouring systems
//!
//! Membership, identity, media storage and push delivery live outside this
//! crate. The engine only calls them through these traits; the in-process
//! implementations here back the binary and the tests.

pub mod directory;
pub mod media;
pub mod notify;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::MediaType;
use crate::error::FeedError;

pub use directory::StaticDirectory;
pub use media::PublicUrlResolver;
pub use notify::{LoggingNotifier, WebhookNotifier};

/// Role of a member inside one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

/// Invitation state of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Accepted,
    Pending,
}

/// Group-scoped identity of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub role: MemberRole,
    pub status: MemberStatus,
}

impl Member {
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }

    pub fn is_accepted(&self) -> bool {
        self.status == MemberStatus::Accepted
    }
}

/// Global identity of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Canonical storage facts for one client-supplied media reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub object_key: String,
    pub mime_type: String,
    pub media_type: MediaType,
}

/// Group membership predicate and lookup
pub trait MembershipGate: Send + Sync {
    fn is_accepted_member(&self, user_id: Uuid, group_id: Uuid) -> bool;

    /// The caller's member record in `group_id`, whatever its status
    fn get_member(&self, user_id: Uuid, group_id: Uuid) -> Option<Member>;

    fn require_admin(&self, user_id: Uuid, group_id: Uuid) -> bool;

    /// Member records by member id; unknown ids are omitted
    fn get_members(&self, member_ids: &[Uuid]) -> Vec<Member>;
}

/// User profile lookup
pub trait IdentityLookup: Send + Sync {
    /// Profiles by user id; unknown ids are omitted
    fn get_users(&self, user_ids: &[Uuid]) -> Vec<UserProfile>;

    fn get_user(&self, user_id: Uuid) -> Option<UserProfile> {
        self.get_users(&[user_id]).into_iter().next()
    }
}

/// Maps client media references onto storage keys and back to URLs
pub trait MediaResolver: Send + Sync {
    fn resolve(&self, raw: &str) -> Result<ResolvedMedia, FeedError>;

    fn playable_url(&self, object_key: &str, group_id: &str) -> String;
}

/// Fire-and-forget new-post fan-out
pub trait NotificationDispatch: Send + Sync {
    fn notify_new_post(
        &self,
        group_id: Uuid,
        excluded_user_id: Uuid,
        post_id: &str,
        author_name: &str,
    ) -> anyhow::Result<()>;
}

/// The external contracts a service needs, shared between services
#[derive(Clone)]
pub struct Collaborators {
    pub membership: Arc<dyn MembershipGate>,
    pub identity: Arc<dyn IdentityLookup>,
    pub media: Arc<dyn MediaResolver>,
    pub notifier: Arc<dyn NotificationDispatch>,
}

impl Collaborators {
    /// Directory-backed membership and identity with the given media and notification backends
    pub fn from_directory(
        directory: Arc<StaticDirectory>,
        media: Arc<dyn MediaResolver>,
        notifier: Arc<dyn NotificationDispatch>,
    ) -> Self {
        Self {
            membership: directory.clone(),
            identity: directory,
            media,
            notifier,
        }
    }
}
