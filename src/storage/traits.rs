//! Storage traits and error types
//!
//! This module defines the trait interface for graph storage backends and
//! associated error types.

use crate::storage::{EdgeRecord, ExportKind, NewNode, NodeRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Node not found: {0}")]
    NodeNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence operations the crawler relies on
///
/// The store only records what it is told. Deciding when a node or an edge
/// exists is the crawler's job. Every call commits on its own.
pub trait GraphStore {
    // ===== Run Management =====

    /// Opens a new run record in the `running` state
    fn create_run(
        &mut self,
        scope_name: &str,
        root_location: &str,
        config_hash: &str,
    ) -> StorageResult<i64>;

    /// Stamps a finish time and a final status on a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Counts all recorded runs
    fn count_runs(&self) -> StorageResult<u64>;

    // ===== Node Management =====

    /// Looks up a node by its unique location
    fn find_node_by_location(&self, location: &str) -> StorageResult<Option<NodeRecord>>;

    /// Creates a node with both export flags cleared
    ///
    /// Fails if a node with the same location already exists.
    fn create_node(&mut self, node: &NewNode<'_>) -> StorageResult<NodeRecord>;

    /// Gets a node by ID
    fn get_node(&self, node_id: i64) -> StorageResult<NodeRecord>;

    /// Records that a node's children have been fully materialized
    fn mark_expanded(&mut self, node_id: i64) -> StorageResult<()>;

    /// Non-leaf destinations of a node's outgoing edges, in discovery order
    fn container_children(&self, node_id: i64) -> StorageResult<Vec<NodeRecord>>;

    // ===== Edge Management =====

    /// Appends an edge; edges are never deduplicated
    fn create_edge(
        &mut self,
        source_id: i64,
        destination_id: i64,
        run_id: i64,
    ) -> StorageResult<EdgeRecord>;

    /// Gets all outgoing edges from a node
    fn get_outgoing_edges(&self, node_id: i64) -> StorageResult<Vec<EdgeRecord>>;

    /// Gets all incoming edges to a node
    fn get_incoming_edges(&self, node_id: i64) -> StorageResult<Vec<EdgeRecord>>;

    // ===== Statistics =====

    /// Counts nodes, optionally restricted to leaves or containers
    fn count_nodes(&self, is_leaf: Option<bool>) -> StorageResult<u64>;

    /// Counts all edges
    fn count_edges(&self) -> StorageResult<u64>;

    /// Counts leaves whose given export has not happened yet
    fn count_pending_exports(&self, kind: ExportKind) -> StorageResult<u64>;
}
