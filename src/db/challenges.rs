//! Challenge and participation operations using Diesel

use diesel::prelude::*;

use super::diesel_schema::{challenge_participations, challenges};
use super::models::{Challenge, ChallengeChangeset, ChallengeParticipation, NewChallenge};
use crate::error::FeedError;

// ============================================================================
// Challenges
// ============================================================================

pub fn get_challenge(
    conn: &mut SqliteConnection,
    challenge_id: &str,
) -> Result<Option<Challenge>, FeedError> {
    Ok(challenges::table
        .filter(challenges::id.eq(challenge_id))
        .select(Challenge::as_select())
        .first(conn)
        .optional()?)
}

/// Newest-first challenges for a group.
///
/// With `event_id` set, only challenges scoped to that event are returned.
pub fn list_challenges(
    conn: &mut SqliteConnection,
    group_id: &str,
    event_id: Option<&str>,
    active_only: bool,
) -> Result<Vec<Challenge>, FeedError> {
    let mut query = challenges::table
        .filter(challenges::group_id.eq(group_id))
        .into_boxed();

    if active_only {
        query = query.filter(challenges::active.eq(1));
    }
    if let Some(event_id) = event_id {
        query = query.filter(challenges::event_id.eq(event_id));
    }

    Ok(query
        .order((challenges::created_at.desc(), challenges::id.desc()))
        .select(Challenge::as_select())
        .load(conn)?)
}

/// Whether another challenge already occupies (group, event scope, tag)
pub fn scope_taken(
    conn: &mut SqliteConnection,
    group_id: &str,
    event_id: Option<&str>,
    tag: &str,
    except_id: Option<&str>,
) -> Result<bool, FeedError> {
    let mut query = challenges::table
        .filter(challenges::group_id.eq(group_id))
        .filter(challenges::tag.eq(tag))
        .into_boxed();

    query = match event_id {
        Some(event_id) => query.filter(challenges::event_id.eq(event_id)),
        None => query.filter(challenges::event_id.is_null()),
    };
    if let Some(except_id) = except_id {
        query = query.filter(challenges::id.ne(except_id));
    }

    let count: i64 = query.count().get_result(conn)?;
    Ok(count > 0)
}

pub fn insert_challenge(
    conn: &mut SqliteConnection,
    new_challenge: &NewChallenge,
) -> Result<Challenge, FeedError> {
    diesel::insert_into(challenges::table)
        .values(new_challenge)
        .execute(conn)?;

    Ok(challenges::table
        .filter(challenges::id.eq(&new_challenge.id))
        .select(Challenge::as_select())
        .first(conn)?)
}

pub fn update_challenge(
    conn: &mut SqliteConnection,
    challenge_id: &str,
    changes: &ChallengeChangeset,
) -> Result<Challenge, FeedError> {
    let updated = diesel::update(challenges::table.filter(challenges::id.eq(challenge_id)))
        .set(changes)
        .execute(conn)?;

    if updated == 0 {
        return Err(FeedError::NotFound(format!("Challenge {} not found", challenge_id)));
    }

    Ok(challenges::table
        .filter(challenges::id.eq(challenge_id))
        .select(Challenge::as_select())
        .first(conn)?)
}

/// Delete a challenge together with its participations
pub fn delete_challenge(
    conn: &mut SqliteConnection,
    challenge_id: &str,
) -> Result<bool, FeedError> {
    diesel::delete(
        challenge_participations::table
            .filter(challenge_participations::challenge_id.eq(challenge_id)),
    )
    .execute(conn)?;

    let deleted = diesel::delete(challenges::table.filter(challenges::id.eq(challenge_id)))
        .execute(conn)?;

    Ok(deleted > 0)
}

// ============================================================================
// Participations
// ============================================================================

pub fn participation_exists(
    conn: &mut SqliteConnection,
    challenge_id: &str,
    post_id: &str,
) -> Result<bool, FeedError> {
    let count: i64 = challenge_participations::table
        .filter(challenge_participations::challenge_id.eq(challenge_id))
        .filter(challenge_participations::post_id.eq(post_id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// Record a participation unless (challenge, post) is already recorded.
///
/// Returns true when a row was written.
pub fn insert_participation(
    conn: &mut SqliteConnection,
    participation: &ChallengeParticipation,
) -> Result<bool, FeedError> {
    if participation_exists(conn, &participation.challenge_id, &participation.post_id)? {
        return Ok(false);
    }

    let inserted = diesel::insert_or_ignore_into(challenge_participations::table)
        .values(participation)
        .execute(conn)?;

    Ok(inserted > 0)
}

pub fn count_participations(
    conn: &mut SqliteConnection,
    challenge_id: &str,
) -> Result<i64, FeedError> {
    Ok(challenge_participations::table
        .filter(challenge_participations::challenge_id.eq(challenge_id))
        .count()
        .get_result(conn)?)
}

pub fn participations_for_post(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<Vec<ChallengeParticipation>, FeedError> {
    Ok(challenge_participations::table
        .filter(challenge_participations::post_id.eq(post_id))
        .order(challenge_participations::created_at.asc())
        .select(ChallengeParticipation::as_select())
        .load(conn)?)
}
