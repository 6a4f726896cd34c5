//! Storage module for persisting the discovered graph
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Node and edge persistence
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{GraphStore, StorageError, StorageResult};

use crate::BranchmapError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(BranchmapError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, BranchmapError> {
    SqliteStorage::new(path)
}

/// A discovered item as stored in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: i64,
    /// Stable identifier of the item in the source application
    pub location: String,
    pub title: String,
    /// Terminal model item, never explored
    pub is_leaf: bool,
    pub scope_name: String,
    pub png_exported: bool,
    pub pdf_exported: bool,
    /// Children of this node have been fully materialized
    pub expanded: bool,
    pub discovered_at: String,
    pub discovered_run: i64,
}

/// Fields needed to create a node
#[derive(Debug, Clone, Copy)]
pub struct NewNode<'a> {
    pub location: &'a str,
    pub title: &'a str,
    pub is_leaf: bool,
    pub scope_name: &'a str,
    pub run_id: i64,
}

/// A parent to child containment relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub id: i64,
    pub source_id: i64,
    pub destination_id: i64,
    pub discovered_run: i64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub scope_name: String,
    pub root_location: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Downstream export step a leaf can still be waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Png,
    Pdf,
}
