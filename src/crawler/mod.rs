//! Crawler module for breadth-first exploration of the item tree
//!
//! This module contains the core crawling logic, including:
//! - The FIFO frontier and its visited set
//! - Bounded-retry navigation over a flaky rendering backend
//! - The traversal loop that materializes nodes and edges

mod coordinator;
mod frontier;
mod retry;

pub use coordinator::{CrawlReport, CrawlSettings, Crawler, RevisitPolicy};
pub use frontier::{Frontier, FrontierEntry};
pub use retry::{Navigated, RetryPolicy, RetryingNavigator};
