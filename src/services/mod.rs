//! Service layer for memory-wall
//!
//! Services encapsulate business logic between HTTP handlers and repositories.
//! Each service wraps database operations with:
//! - Membership and role checks
//! - Input validation
//! - Event emission for audit trails
//! - Transaction boundaries
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod access;
pub mod challenge_service;
pub mod events;
pub mod feed_service;
pub mod hashtags;
pub mod post_service;
pub mod response;

pub use challenge_service::{ChallengeInput, ChallengeQuery, ChallengeService};
pub use events::{EventBus, EventListener, FeedEvent};
pub use feed_service::{FeedService, PagingLimits};
pub use post_service::{CreatePostInput, PostService};
pub use response::*;

use std::sync::Arc;

use crate::collaborators::Collaborators;
use crate::db::FeedDb;

/// Service container for dependency injection
///
/// Holds all services over one shared database pool.
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub posts: Arc<PostService>,
    pub feed: Arc<FeedService>,
    pub challenges: Arc<ChallengeService>,
    pub events: Arc<EventBus>,
    pub db: Arc<FeedDb>,
}

impl Services {
    /// Create all services with shared database and collaborators
    pub fn new(db: Arc<FeedDb>, collaborators: Collaborators, paging: PagingLimits) -> Self {
        let events = Arc::new(EventBus::new());

        let feed = Arc::new(FeedService::new(db.clone(), collaborators.clone(), paging));
        let challenges = Arc::new(ChallengeService::new(
            db.clone(),
            collaborators.clone(),
            events.clone(),
        ));
        let posts = Arc::new(PostService::new(
            db.clone(),
            collaborators,
            events.clone(),
            feed.clone(),
            challenges.clone(),
        ));

        Self {
            posts,
            feed,
            challenges,
            events,
            db,
        }
    }
}
