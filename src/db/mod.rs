//! SQLite database module for the social feed
//!
//! ## Architecture
//!
//! - Diesel over an r2d2 pool of `SqliteConnection`s
//! - Every write unit runs inside `immediate_transaction`, so SQLite takes the
//!   write lock up front instead of upgrading mid-transaction
//! - Lock contention surfaces as `FeedError::Transient` and write units are
//!   retried a bounded number of times before it reaches the caller
//!
//! ## Tables
//!
//! - `posts` - Posts with denormalized media/like/comment counters
//! - `comments` - Comments on posts
//! - `likes` - One row per (post, member)
//! - `media_attachments` - Ordered media per post
//! - `challenges` - Hashtag challenges scoped to a group (optionally an event)
//! - `challenge_participations` - One row per (challenge, post)

pub mod challenges;
pub mod comments;
pub mod diesel_schema;
pub mod likes;
pub mod media;
pub mod models;
pub mod posts;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use tracing::{debug, info, warn};

use crate::error::FeedError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Milliseconds SQLite waits on a locked database before reporting busy
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Per-connection PRAGMAs applied when the pool opens a connection
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            BUSY_TIMEOUT_MS
        );
        if self.wal {
            pragmas.push_str(" PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// SQLite database for the feed engine
pub struct FeedDb {
    pool: DbPool,
    write_attempts: u32,
}

impl FeedDb {
    /// Open or create the feed database at `db_path`
    pub fn open(db_path: &Path, pool_size: u32, write_attempts: u32) -> Result<Self, FeedError> {
        info!("Opening SQLite database at {:?}", db_path);

        let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_customizer(Box::new(ConnectionOptions { wal: true }))
            .build(manager)
            .map_err(|e| FeedError::Database(format!("Failed to open SQLite pool: {}", e)))?;

        Self::from_pool(pool, write_attempts)
    }

    /// Open an in-memory database (for testing)
    ///
    /// Each SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub fn open_in_memory() -> Result<Self, FeedError> {
        debug!("Opening in-memory SQLite database");

        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_customizer(Box::new(ConnectionOptions { wal: false }))
            .build(manager)
            .map_err(|e| FeedError::Database(format!("Failed to open in-memory SQLite: {}", e)))?;

        Self::from_pool(pool, 3)
    }

    fn from_pool(pool: DbPool, write_attempts: u32) -> Result<Self, FeedError> {
        let db = Self {
            pool,
            write_attempts: write_attempts.max(1),
        };
        db.with_conn(schema::init_schema)?;
        Ok(db)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConn, FeedError> {
        Ok(self.pool.get()?)
    }

    /// Run a read against a pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, FeedError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, FeedError>,
    {
        let mut conn = self.conn()?;
        f(&mut *conn)
    }

    /// Run a write unit inside an immediate transaction, retrying lock contention
    pub fn write<F, T>(&self, mut f: F) -> Result<T, FeedError>
    where
        F: FnMut(&mut SqliteConnection) -> Result<T, FeedError>,
    {
        let mut attempt = 1;
        loop {
            let result = self
                .conn()
                .and_then(|mut conn| conn.immediate_transaction(|conn| f(conn)));

            match result {
                Err(e) if e.is_transient() && attempt < self.write_attempts => {
                    warn!(attempt, error = %e, "Write unit hit contention, retrying");
                    std::thread::sleep(Duration::from_millis(10 * attempt as u64));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, FeedError> {
        use diesel_schema::{challenges, comments, likes, posts};

        self.with_conn(|conn| {
            let post_count: i64 = posts::table.count().get_result(conn)?;
            let comment_count: i64 = comments::table.count().get_result(conn)?;
            let like_count: i64 = likes::table.count().get_result(conn)?;
            let challenge_count: i64 = challenges::table.count().get_result(conn)?;

            Ok(DbStats {
                post_count: post_count as u64,
                comment_count: comment_count as u64,
                like_count: like_count as u64,
                challenge_count: challenge_count as u64,
            })
        })
    }
}

/// Zero-based page window over an ordered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }

    /// Number of pages needed for `total` rows; zero when there are none
    pub fn total_pages(&self, total: i64) -> u32 {
        if self.size == 0 || total <= 0 {
            return 0;
        }
        ((total + self.size as i64 - 1) / self.size as i64) as u32
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub post_count: u64,
    pub comment_count: u64,
    pub like_count: u64,
    pub challenge_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_schema() {
        let db = FeedDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.post_count, 0);
        assert_eq!(stats.challenge_count, 0);
    }

    #[test]
    fn test_in_memory_database_outlives_checkouts() {
        let db = FeedDb::open_in_memory().unwrap();
        db.write(|conn| {
            diesel::sql_query(
                "INSERT INTO challenges (id, group_id, tag, title, created_at, updated_at) \
                 VALUES ('c1', 'g1', '#t', 'T', 'now', 'now')",
            )
            .execute(conn)?;
            Ok(())
        })
        .unwrap();

        for _ in 0..3 {
            assert_eq!(db.stats().unwrap().challenge_count, 1);
        }
        let state = db.pool.state();
        assert_eq!((state.connections, state.idle_connections), (1, 1));
    }

    #[test]
    fn test_page_request_window() {
        let page = PageRequest::new(2, 20);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(40), 2);
        assert_eq!(page.total_pages(41), 3);
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let db = FeedDb::open_in_memory().unwrap();
        let result: Result<(), FeedError> = db.write(|conn| {
            diesel::sql_query(
                "INSERT INTO challenges (id, group_id, tag, title, created_at, updated_at) \
                 VALUES ('c1', 'g1', '#t', 'T', 'now', 'now')",
            )
            .execute(conn)?;
            Err(FeedError::Validation("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.stats().unwrap().challenge_count, 0);
    }

    #[test]
    fn test_write_does_not_retry_validation_errors() {
        let db = FeedDb::open_in_memory().unwrap();
        let mut calls = 0;
        let result: Result<(), FeedError> = db.write(|_| {
            calls += 1;
            Err(FeedError::Validation("bad".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_write_retries_transient_errors_up_to_bound() {
        let db = FeedDb::open_in_memory().unwrap();
        let mut calls = 0;
        let result: Result<(), FeedError> = db.write(|_| {
            calls += 1;
            Err(FeedError::Transient("database is locked".into()))
        });
        assert!(matches!(result, Err(FeedError::Transient(_))));
        assert_eq!(calls, 3);
    }
}
