//! Statistics generation from the graph database
//!
//! This module provides functionality for extracting and displaying
//! snapshot statistics from the storage layer.

use crate::storage::{ExportKind, GraphStore, RunStatus};
use crate::BranchmapError;

/// Snapshot statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStatistics {
    pub total_nodes: u64,
    pub containers: u64,
    pub leaves: u64,
    pub total_edges: u64,

    /// Leaves still waiting for the PNG export step
    pub pending_png: u64,

    /// Leaves still waiting for the PDF export step
    pub pending_pdf: u64,

    pub runs: u64,
    pub latest_run: Option<(i64, RunStatus)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(GraphStatistics)` - Successfully loaded statistics
/// * `Err(BranchmapError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn GraphStore) -> Result<GraphStatistics, BranchmapError> {
    Ok(GraphStatistics {
        total_nodes: storage.count_nodes(None)?,
        containers: storage.count_nodes(Some(false))?,
        leaves: storage.count_nodes(Some(true))?,
        total_edges: storage.count_edges()?,
        pending_png: storage.count_pending_exports(ExportKind::Png)?,
        pending_pdf: storage.count_pending_exports(ExportKind::Pdf)?,
        runs: storage.count_runs()?,
        latest_run: storage.get_latest_run()?.map(|run| (run.id, run.status)),
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &GraphStatistics) {
    println!("=== Graph Statistics ===\n");

    println!("Nodes:");
    println!("  Total: {}", stats.total_nodes);
    println!("  Groups: {}", stats.containers);
    println!("  Models: {}", stats.leaves);
    println!("Edges: {}", stats.total_edges);
    println!();

    println!("Pending Exports:");
    println!("  PNG: {} / {}", stats.pending_png, stats.leaves);
    println!("  PDF: {} / {}", stats.pending_pdf, stats.leaves);
    println!();

    match stats.latest_run {
        Some((id, status)) => println!(
            "Runs: {} (latest #{} {})",
            stats.runs,
            id,
            status.to_db_string()
        ),
        None => println!("Runs: none"),
    }
}
