//! Output module for reporting on snapshots
//!
//! This module handles:
//! - Printing the outcome of a crawl run with its elapsed time
//! - Graph statistics from an existing database

pub mod stats;

pub use stats::{load_statistics, print_statistics, GraphStatistics};

use crate::crawler::CrawlReport;
use std::time::Duration;

/// Prints the summary of a finished run
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report (run #{}) ===\n", report.run_id);
    println!("  Pages visited: {}", report.pages_visited);
    println!("  Nodes created: {}", report.nodes_created);
    println!("  Edges created: {}", report.edges_created);
    println!("  Models found: {}", report.leaves_found);
    if report.expansions_skipped > 0 {
        println!("  Already expanded: {}", report.expansions_skipped);
    }
    println!();
    print_elapsed(report.elapsed);
}

/// Prints the elapsed wall time of a run
pub fn print_elapsed(elapsed: Duration) {
    println!("Elapsed time: {:.2} seconds", elapsed.as_secs_f64());
}
