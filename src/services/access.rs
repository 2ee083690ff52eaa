//! Membership-scoped authorization glue shared by the services

use uuid::Uuid;

use crate::collaborators::{Member, MembershipGate};
use crate::db::models::{parse_id, Post};
use crate::error::FeedError;

/// The caller's accepted member record in `group_id`, or `NotMember`
pub fn require_member(
    gate: &dyn MembershipGate,
    user_id: Uuid,
    group_id: Uuid,
) -> Result<Member, FeedError> {
    match gate.get_member(user_id, group_id) {
        Some(member) if member.is_accepted() => Ok(member),
        _ => Err(FeedError::NotMember(format!(
            "User {} is not a member of group {}",
            user_id, group_id
        ))),
    }
}

/// Succeeds only for accepted group admins
pub fn require_admin(
    gate: &dyn MembershipGate,
    user_id: Uuid,
    group_id: Uuid,
) -> Result<(), FeedError> {
    if gate.require_admin(user_id, group_id) {
        Ok(())
    } else {
        Err(FeedError::Forbidden("Only group admins can manage challenges".into()))
    }
}

/// The caller's member record in the group that owns `post`
pub fn require_post_member(
    gate: &dyn MembershipGate,
    user_id: Uuid,
    post: &Post,
) -> Result<Member, FeedError> {
    require_member(gate, user_id, parse_id(&post.group_id)?)
}

/// Authors may remove their own content; admins may remove anyone's
pub fn require_author_or_admin(
    gate: &dyn MembershipGate,
    member: &Member,
    author_member_id: &str,
) -> Result<(), FeedError> {
    if member.id.to_string() == author_member_id
        || gate.require_admin(member.user_id, member.group_id)
    {
        Ok(())
    } else {
        Err(FeedError::Forbidden("Only the author or a group admin can delete this".into()))
    }
}
