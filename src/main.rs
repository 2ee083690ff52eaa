//! Memory Wall Daemon
//!
//! Serves the group feed API over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! memory-wall
//!
//! # Start with custom config
//! memory-wall --config /path/to/config.toml
//!
//! # Seed members from a directory file and post notifications to a webhook
//! memory-wall --directory-file members.toml --notify-webhook-url http://notify.local/new-post
//! ```

use clap::Parser;
use memory_wall::collaborators::{
    LoggingNotifier, NotificationDispatch, PublicUrlResolver, StaticDirectory, WebhookNotifier,
};
use memory_wall::services::events::spawn_logging_listener;
use memory_wall::{Collaborators, Config, FeedDb, HttpServer, PagingLimits, Services};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "memory-wall")]
#[command(about = "Social feed engine for private event groups")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// TOML file with users and group members
    #[arg(long, env = "MEMORY_WALL_DIRECTORY")]
    directory_file: Option<PathBuf>,

    /// Public base URL media object keys are served from
    #[arg(long, env = "MEMORY_WALL_MEDIA_URL")]
    media_public_url: Option<String>,

    /// Endpoint that receives new-post notifications
    #[arg(long, env = "MEMORY_WALL_NOTIFY_URL")]
    notify_webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("memory_wall=info".parse()?))
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(path) = args.directory_file {
        config.directory_file = Some(path);
    }
    if let Some(url) = args.media_public_url {
        config.media_public_url = url;
    }
    if let Some(url) = args.notify_webhook_url {
        config.notify_webhook_url = Some(url);
    }
    config.validate()?;

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        "Starting memory-wall"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(FeedDb::open(
        &config.database_path(),
        config.pool_size,
        config.write_retry_attempts,
    )?);

    let directory = match &config.directory_file {
        Some(path) => StaticDirectory::load(path)?,
        None => {
            warn!("No directory file configured; every request will be rejected as non-member");
            StaticDirectory::new()
        }
    };

    let notifier: Arc<dyn NotificationDispatch> = match &config.notify_webhook_url {
        Some(url) => {
            info!(url = %url, "New-post notifications go to webhook");
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => Arc::new(LoggingNotifier),
    };

    let collaborators = Collaborators::from_directory(
        Arc::new(directory),
        Arc::new(PublicUrlResolver::new(config.media_public_url.clone())),
        notifier,
    );
    let paging = PagingLimits {
        default_size: config.default_page_size,
        max_size: config.max_page_size,
    };
    let services = Arc::new(Services::new(db.clone(), collaborators, paging));
    let listener_handle = spawn_logging_listener(services.events.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_server = Arc::new(HttpServer::new(services, http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    listener_handle.abort();

    // Print stats before exit
    if let Ok(stats) = db.stats() {
        info!(
            posts = stats.post_count,
            comments = stats.comment_count,
            likes = stats.like_count,
            "Final feed stats"
        );
    }

    Ok(())
}
