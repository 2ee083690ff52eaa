//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::FeedError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), FeedError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.immediate_transaction(|conn| {
            create_tables(conn)?;
            set_schema_version(conn, SCHEMA_VERSION)
        })?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, FeedError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| FeedError::Database(format!("Failed to create schema_version table: {}", e)))?;

    let row: Option<VersionRow> = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result(conn)
        .optional()?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

/// Set schema version
fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), FeedError> {
    diesel::sql_query("DELETE FROM schema_version").execute(conn)?;
    diesel::sql_query("INSERT INTO schema_version (version) VALUES (?)")
        .bind::<Integer, _>(version)
        .execute(conn)?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &mut SqliteConnection) -> Result<(), FeedError> {
    conn.batch_execute(FEED_SCHEMA)
        .map_err(|e| FeedError::Database(format!("Failed to create feed tables: {}", e)))?;

    conn.batch_execute(CHALLENGE_SCHEMA)
        .map_err(|e| FeedError::Database(format!("Failed to create challenge tables: {}", e)))?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| FeedError::Database(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &mut SqliteConnection, from_version: i32) -> Result<(), FeedError> {
    // No released version predates v1 yet; steps slot in here by from_version.
    let _ = from_version;
    set_schema_version(conn, SCHEMA_VERSION)
}

/// Posts, comments, likes and media attachments
const FEED_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY NOT NULL,
    group_id TEXT NOT NULL,
    author_member_id TEXT NOT NULL,
    event_id TEXT,
    content_text TEXT CHECK (content_text IS NULL OR length(content_text) <= 2000),
    visibility TEXT NOT NULL CHECK (visibility IN ('PUBLIC', 'PRIVATE', 'FRIENDS')),
    is_deleted INTEGER NOT NULL DEFAULT 0,
    media_count INTEGER NOT NULL DEFAULT 0,
    like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
    comment_count INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT NOT NULL REFERENCES posts(id),
    author_member_id TEXT NOT NULL,
    content_text TEXT NOT NULL CHECK (length(content_text) <= 500),
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS likes (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT NOT NULL REFERENCES posts(id),
    member_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (post_id, member_id)
);

CREATE TABLE IF NOT EXISTS media_attachments (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT NOT NULL REFERENCES posts(id),
    media_type TEXT NOT NULL CHECK (media_type IN ('IMAGE', 'VIDEO', 'AUDIO')),
    object_key TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    duration_sec INTEGER,
    order_index INTEGER NOT NULL,
    transcode_status TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (post_id, order_index)
);
"#;

/// Challenges and their participations
const CHALLENGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS challenges (
    id TEXT PRIMARY KEY NOT NULL,
    group_id TEXT NOT NULL,
    event_id TEXT,
    tag TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    start_at TEXT,
    end_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS challenge_participations (
    id TEXT PRIMARY KEY NOT NULL,
    challenge_id TEXT NOT NULL REFERENCES challenges(id),
    post_id TEXT NOT NULL REFERENCES posts(id),
    member_id TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (challenge_id, post_id)
);
"#;

/// Indexes for feed reads and uniqueness scopes
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_posts_group_feed
    ON posts(group_id, is_deleted, created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_member_id, is_deleted, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, is_deleted, created_at);
CREATE INDEX IF NOT EXISTS idx_likes_member ON likes(member_id, post_id);
CREATE INDEX IF NOT EXISTS idx_media_post ON media_attachments(post_id, order_index);
CREATE INDEX IF NOT EXISTS idx_challenges_group ON challenges(group_id, active, created_at DESC);
CREATE UNIQUE INDEX IF NOT EXISTS idx_challenges_scope_tag
    ON challenges(group_id, COALESCE(event_id, ''), tag);
CREATE INDEX IF NOT EXISTS idx_participations_challenge ON challenge_participations(challenge_id);
"#;
