//! In-process membership and identity directory
//!
//! Backs `MembershipGate` and `IdentityLookup` from a TOML file:
//!
//! ```toml
//! [[users]]
//! id = "5f0c..."
//! name = "Asha"
//!
//! [[members]]
//! id = "9b1e..."
//! group_id = "77aa..."
//! user_id = "5f0c..."
//! display_name = "Bride's sister"
//! role = "admin"
//! ```

use std::path::Path;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{IdentityLookup, Member, MemberRole, MemberStatus, MembershipGate, UserProfile};
use crate::error::FeedError;

#[derive(Debug, Deserialize, Default)]
struct DirectoryFile {
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    members: Vec<MemberEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    id: Uuid,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberEntry {
    id: Uuid,
    group_id: Uuid,
    user_id: Uuid,
    display_name: Option<String>,
    #[serde(default)]
    role: MemberRole,
    #[serde(default)]
    status: MemberStatus,
}

/// Concurrent in-memory directory of users and group members
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: DashMap<Uuid, UserProfile>,
    members: DashMap<Uuid, Member>,
    /// (user_id, group_id) -> member_id
    by_user_group: DashMap<(Uuid, Uuid), Uuid>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a directory from a TOML file
    pub fn load(path: &Path) -> Result<Self, FeedError> {
        let contents = std::fs::read_to_string(path)?;
        let directory = Self::from_toml(&contents)?;
        info!(
            users = directory.users.len(),
            members = directory.members.len(),
            "Loaded directory from {:?}",
            path
        );
        Ok(directory)
    }

    pub fn from_toml(contents: &str) -> Result<Self, FeedError> {
        let file: DirectoryFile = toml::from_str(contents)
            .map_err(|e| FeedError::Config(format!("Failed to parse directory: {}", e)))?;

        let directory = Self::new();
        for user in file.users {
            directory.users.insert(
                user.id,
                UserProfile {
                    id: user.id,
                    name: user.name,
                    avatar_url: user.avatar_url,
                },
            );
        }
        for m in file.members {
            directory.insert_member(Member {
                id: m.id,
                group_id: m.group_id,
                user_id: m.user_id,
                display_name: m.display_name,
                role: m.role,
                status: m.status,
            });
        }
        Ok(directory)
    }

    /// Register a user profile
    pub fn add_user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.users.insert(
            id,
            UserProfile {
                id,
                name: Some(name.to_string()),
                avatar_url: None,
            },
        );
        id
    }

    /// Register `user_id` in `group_id`; returns the new member id
    pub fn add_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
        display_name: Option<&str>,
        role: MemberRole,
        status: MemberStatus,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.insert_member(Member {
            id,
            group_id,
            user_id,
            display_name: display_name.map(str::to_string),
            role,
            status,
        });
        id
    }

    fn insert_member(&self, member: Member) {
        self.by_user_group
            .insert((member.user_id, member.group_id), member.id);
        self.members.insert(member.id, member);
    }
}

impl MembershipGate for StaticDirectory {
    fn is_accepted_member(&self, user_id: Uuid, group_id: Uuid) -> bool {
        self.get_member(user_id, group_id)
            .map(|m| m.is_accepted())
            .unwrap_or(false)
    }

    fn get_member(&self, user_id: Uuid, group_id: Uuid) -> Option<Member> {
        let member_id = *self.by_user_group.get(&(user_id, group_id))?;
        self.members.get(&member_id).map(|m| m.clone())
    }

    fn require_admin(&self, user_id: Uuid, group_id: Uuid) -> bool {
        self.get_member(user_id, group_id)
            .map(|m| m.is_accepted() && m.is_admin())
            .unwrap_or(false)
    }

    fn get_members(&self, member_ids: &[Uuid]) -> Vec<Member> {
        member_ids
            .iter()
            .filter_map(|id| self.members.get(id).map(|m| m.clone()))
            .collect()
    }
}

impl IdentityLookup for StaticDirectory {
    fn get_users(&self, user_ids: &[Uuid]) -> Vec<UserProfile> {
        user_ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect()
    }
}
