//! Branchmap: a structure snapshotter for browser-rendered item trees
//!
//! This crate walks a hierarchy of groups and models exposed only through
//! rendered pages, breadth-first, and records it as a graph of nodes and
//! edges in SQLite.

pub mod config;
pub mod crawler;
pub mod output;
pub mod page;
pub mod storage;

use thiserror::Error;

/// Main error type for Branchmap operations
#[derive(Debug, Error)]
pub enum BranchmapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Browser backend error: {0}")]
    Backend(#[from] page::BackendError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Navigation failures, as seen by the crawler
#[derive(Debug, Error)]
pub enum NavigationError {
    /// A single attempt did not reach the landmark
    #[error("Landmark for {location} not reached: {reason}")]
    Transient { location: String, reason: String },

    /// Every attempt failed; the run cannot continue
    #[error("Gave up on {location} after {attempts} attempts: {last_error}")]
    Fatal {
        location: String,
        attempts: u32,
        last_error: String,
    },
}

/// Result type alias for Branchmap operations
pub type Result<T> = std::result::Result<T, BranchmapError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, CrawlSettings, Crawler, RetryPolicy, RevisitPolicy};
pub use page::{BrowserSession, ItemDescriptor, ItemExtractor, PageNavigator};
pub use storage::{GraphStore, SqliteStorage};

/// Runs a crawl inside an open browser session
///
/// The session is opened first and closed afterwards whether or not the
/// crawl succeeded, and also when opening it failed part-way. Close failures are logged and never mask the crawl
/// outcome.
pub async fn crawl_with_session<B, S>(
    session: &mut B,
    store: &mut S,
    settings: CrawlSettings,
    root: ItemDescriptor,
) -> Result<CrawlReport>
where
    B: BrowserSession + PageNavigator + ItemExtractor + ?Sized,
    S: GraphStore + ?Sized,
{
    if let Err(e) = session.open().await {
        // A failed sign-in leaves the browser session itself open
        if let Err(close_err) = session.close().await {
            tracing::error!("Failed to release browser session: {}", close_err);
        }
        return Err(e.into());
    }

    let outcome = {
        let mut crawler = Crawler::new(&mut *session, &mut *store, settings);
        crawler.run(root).await
    };

    if let Err(e) = session.close().await {
        tracing::error!("Failed to release browser session: {}", e);
    }

    outcome
}
