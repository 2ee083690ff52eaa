//! Challenge service - hashtag challenges and participation matching
//!
//! Participation is recorded after the post it belongs to has committed, in a
//! separate write unit; callers treat its failure as non-fatal.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::collaborators::Collaborators;
use crate::db::models::{
    current_timestamp, new_id, normalize_timestamp, Challenge, ChallengeChangeset,
    ChallengeParticipation, NewChallenge, Post,
};
use crate::db::{challenges, FeedDb};
use crate::error::FeedError;
use crate::views::{ChallengeCountsView, ChallengeView};

use super::access::{require_admin, require_member};
use super::events::{EventBus, FeedEvent};
use super::hashtags::{canonicalize_tag, extract_tags, is_matchable_tag};

const MAX_TITLE_CHARS: usize = 200;

/// Fields supplied for a challenge create or update.
///
/// On update, `None` leaves tag, title, description and active unchanged,
/// while event_id, start_at and end_at always replace the stored value.
#[derive(Debug, Clone, Default)]
pub struct ChallengeInput {
    pub event_id: Option<Uuid>,
    pub tag: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
}

/// Options for listing a group's challenges
#[derive(Debug, Clone, Copy)]
pub struct ChallengeQuery {
    pub event_id: Option<Uuid>,
    pub include_counts: bool,
    pub active_only: bool,
}

impl Default for ChallengeQuery {
    fn default() -> Self {
        Self {
            event_id: None,
            include_counts: false,
            active_only: true,
        }
    }
}

pub struct ChallengeService {
    db: Arc<FeedDb>,
    collaborators: Collaborators,
    events: Arc<EventBus>,
}

impl ChallengeService {
    pub fn new(db: Arc<FeedDb>, collaborators: Collaborators, events: Arc<EventBus>) -> Self {
        Self {
            db,
            collaborators,
            events,
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Newest-first challenges of a group
    pub fn list(
        &self,
        caller: Uuid,
        group_id: Uuid,
        query: ChallengeQuery,
    ) -> Result<Vec<ChallengeView>, FeedError> {
        require_member(self.collaborators.membership.as_ref(), caller, group_id)?;
        let gid = group_id.to_string();
        let event_id = query.event_id.map(|e| e.to_string());

        self.db.with_conn(|conn| {
            let rows =
                challenges::list_challenges(conn, &gid, event_id.as_deref(), query.active_only)?;
            let mut views = Vec::with_capacity(rows.len());
            for row in rows {
                let counts = if query.include_counts {
                    Some(ChallengeCountsView {
                        posts: challenges::count_participations(conn, &row.id)?,
                    })
                } else {
                    None
                };
                let mut view = ChallengeView::from(row);
                view.counts = counts;
                views.push(view);
            }
            Ok(views)
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a challenge; admins only
    pub fn create(
        &self,
        caller: Uuid,
        group_id: Uuid,
        input: ChallengeInput,
    ) -> Result<ChallengeView, FeedError> {
        require_admin(self.collaborators.membership.as_ref(), caller, group_id)?;

        let tag = validate_tag(input.tag.as_deref().unwrap_or(""))?;
        let title = validate_title(input.title.as_deref().unwrap_or(""))?;
        let (start_at, end_at) =
            validate_window(input.start_at.as_deref(), input.end_at.as_deref())?;

        let now = current_timestamp();
        let new_challenge = NewChallenge {
            id: new_id(),
            group_id: group_id.to_string(),
            event_id: input.event_id.map(|e| e.to_string()),
            tag,
            title,
            description: input.description,
            active: input.active.unwrap_or(true) as i32,
            start_at,
            end_at,
            created_at: now.clone(),
            updated_at: now,
        };

        let challenge = self.db.write(|conn| {
            if challenges::scope_taken(
                conn,
                &new_challenge.group_id,
                new_challenge.event_id.as_deref(),
                &new_challenge.tag,
                None,
            )? {
                return Err(duplicate_scope(&new_challenge.tag));
            }
            challenges::insert_challenge(conn, &new_challenge)
        })?;

        info!(
            challenge_id = %challenge.id,
            group_id = %challenge.group_id,
            tag = %challenge.tag,
            "Created challenge"
        );
        self.events.emit(FeedEvent::ChallengeCreated {
            id: challenge.id.clone(),
            group_id: challenge.group_id.clone(),
            tag: challenge.tag.clone(),
        });

        Ok(challenge.into())
    }

    /// Update a challenge; admins only
    pub fn update(
        &self,
        caller: Uuid,
        group_id: Uuid,
        challenge_id: &str,
        input: ChallengeInput,
    ) -> Result<ChallengeView, FeedError> {
        require_admin(self.collaborators.membership.as_ref(), caller, group_id)?;
        let existing = self.load_in_group(group_id, challenge_id)?;

        let tag = match input.tag.as_deref() {
            Some(raw) => validate_tag(raw)?,
            None => existing.tag,
        };
        let title = match input.title.as_deref() {
            Some(raw) => validate_title(raw)?,
            None => existing.title,
        };
        let (start_at, end_at) =
            validate_window(input.start_at.as_deref(), input.end_at.as_deref())?;

        let changes = ChallengeChangeset {
            event_id: input.event_id.map(|e| e.to_string()),
            tag,
            title,
            description: input.description.or(existing.description),
            active: input.active.map(i32::from).unwrap_or(existing.active),
            start_at,
            end_at,
            updated_at: current_timestamp(),
        };

        let challenge = self.db.write(|conn| {
            if challenges::scope_taken(
                conn,
                &existing.group_id,
                changes.event_id.as_deref(),
                &changes.tag,
                Some(challenge_id),
            )? {
                return Err(duplicate_scope(&changes.tag));
            }
            challenges::update_challenge(conn, challenge_id, &changes)
        })?;

        info!(challenge_id = %challenge.id, "Updated challenge");
        self.events.emit(FeedEvent::ChallengeUpdated {
            id: challenge.id.clone(),
        });

        Ok(challenge.into())
    }

    /// Delete a challenge and its participations; admins only
    pub fn delete(
        &self,
        caller: Uuid,
        group_id: Uuid,
        challenge_id: &str,
    ) -> Result<(), FeedError> {
        require_admin(self.collaborators.membership.as_ref(), caller, group_id)?;
        self.load_in_group(group_id, challenge_id)?;

        let deleted = self.db.write(|conn| challenges::delete_challenge(conn, challenge_id))?;
        if !deleted {
            return Err(not_found(challenge_id));
        }

        info!(challenge_id = %challenge_id, "Deleted challenge");
        self.events.emit(FeedEvent::ChallengeDeleted {
            id: challenge_id.to_string(),
            group_id: group_id.to_string(),
        });
        Ok(())
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Record participation of `post` in every active challenge its hashtags match.
    ///
    /// Idempotent: a (challenge, post) pair is recorded at most once however
    /// often the tag recurs or the call is retried. Returns the number of new rows.
    pub fn record_participation_for_post(&self, post: &Post) -> Result<usize, FeedError> {
        let tags = extract_tags(post.content_text.as_deref().unwrap_or(""));
        if tags.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp();
        let recorded = self.db.write(|conn| {
            let candidates = challenges::list_challenges(conn, &post.group_id, None, true)?;
            let mut recorded = Vec::new();
            for challenge in candidates
                .iter()
                .filter(|c| tags.contains(&c.tag) && c.applies_to_event(post.event_id.as_deref()))
            {
                let participation = ChallengeParticipation::new(
                    &challenge.id,
                    &post.id,
                    Some(post.author_member_id.as_str()),
                    &now,
                );
                if challenges::insert_participation(conn, &participation)? {
                    recorded.push(challenge.id.clone());
                }
            }
            Ok(recorded)
        })?;

        debug!(
            post_id = %post.id,
            tags = tags.len(),
            recorded = recorded.len(),
            "Matched challenges"
        );
        for challenge_id in &recorded {
            self.events.emit(FeedEvent::ParticipationRecorded {
                challenge_id: challenge_id.clone(),
                post_id: post.id.clone(),
            });
        }
        Ok(recorded.len())
    }

    fn load_in_group(&self, group_id: Uuid, challenge_id: &str) -> Result<Challenge, FeedError> {
        let gid = group_id.to_string();
        match self.db.with_conn(|conn| challenges::get_challenge(conn, challenge_id))? {
            Some(challenge) if challenge.group_id == gid => Ok(challenge),
            _ => Err(not_found(challenge_id)),
        }
    }
}

fn not_found(challenge_id: &str) -> FeedError {
    FeedError::NotFound(format!("Challenge {} not found", challenge_id))
}

fn duplicate_scope(tag: &str) -> FeedError {
    FeedError::Conflict(format!("A challenge tagged {} already exists in this scope", tag))
}

fn validate_tag(raw: &str) -> Result<String, FeedError> {
    let tag = canonicalize_tag(raw);
    if !is_matchable_tag(&tag) {
        return Err(FeedError::Validation(format!(
            "Tag '{}' must be 2-32 letters, digits or underscores",
            raw.trim()
        )));
    }
    Ok(tag)
}

fn validate_title(raw: &str) -> Result<String, FeedError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(FeedError::Validation("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(FeedError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

fn validate_window(
    start_at: Option<&str>,
    end_at: Option<&str>,
) -> Result<(Option<String>, Option<String>), FeedError> {
    let start = start_at.map(normalize_timestamp).transpose()?;
    let end = end_at.map(normalize_timestamp).transpose()?;
    if let (Some(s), Some(e)) = (&start, &end) {
        if e < s {
            return Err(FeedError::Validation("endAt must not precede startAt".into()));
        }
    }
    Ok((start, end))
}
