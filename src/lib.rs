//! Memory Wall - social feed engine for private event groups
//!
//! Members of a group share posts with photos and videos, like and comment on
//! them, and take part in hashtag challenges run by group admins.
//!
//! ## Architecture
//!
//! - **db**: Diesel/SQLite repositories with denormalized like and comment counters
//! - **services**: Access checks, validation, write units and feed assembly
//! - **collaborators**: Membership, identity, media and notification contracts
//! - **http**: hyper 1 JSON API over the services
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/memory-wall/
//! ├── feed.db          # SQLite database (WAL mode)
//! └── config.toml      # Configuration
//! ```

pub mod batch;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod services;
pub mod views;

// Re-exports
pub use collaborators::Collaborators;
pub use config::Config;
pub use db::FeedDb;
pub use error::FeedError;
pub use http::HttpServer;
pub use services::{PagingLimits, Services};
