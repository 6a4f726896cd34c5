//! Crawler coordinator - breadth-first traversal of the item tree
//!
//! This module contains the main crawl loop:
//! - Opening and closing the run record
//! - Navigating to each frontier item through the retry wrapper
//! - Reading container and leaf children from the rendered page
//! - Materializing nodes and edges, and growing the frontier

use crate::config::Config;
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::retry::{RetryPolicy, RetryingNavigator};
use crate::page::{ItemDescriptor, ItemExtractor, PageNavigator};
use crate::storage::{GraphStore, NewNode, NodeRecord, RunStatus};
use crate::Result;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// What to do with an item whose node has already been expanded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevisitPolicy {
    /// Walk its stored children instead of loading the page again
    #[default]
    SkipExpanded,
    /// Load and extract the page again, appending edges
    ReExpand,
}

/// Per-run crawl parameters
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Stamped on every node created by the run
    pub scope_name: String,
    /// Recorded on the run
    pub config_hash: String,
    pub retry: RetryPolicy,
    /// Wait for each child region on a page
    pub extraction_timeout: Duration,
    pub revisit: RevisitPolicy,
}

impl CrawlSettings {
    pub fn new(scope_name: impl Into<String>) -> Self {
        Self {
            scope_name: scope_name.into(),
            config_hash: String::new(),
            retry: RetryPolicy::default(),
            extraction_timeout: Duration::from_secs(5),
            revisit: RevisitPolicy::default(),
        }
    }

    pub fn from_config(config: &Config, config_hash: &str) -> Self {
        Self {
            scope_name: config.target.scope_name.clone(),
            config_hash: config_hash.to_string(),
            retry: RetryPolicy::from(&config.retry),
            extraction_timeout: Duration::from_secs(config.extraction.timeout_secs),
            revisit: config.crawl.revisit,
        }
    }
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    /// Pages navigated to and expanded
    pub pages_visited: u64,
    pub nodes_created: u64,
    pub edges_created: u64,
    /// Leaf children seen, including repeats
    pub leaves_found: u64,
    /// Already-expanded items walked from the store
    pub expansions_skipped: u64,
    pub elapsed: Duration,
}

/// Breadth-first crawler over one page session and one graph store
///
/// Both are borrowed for the crawler's lifetime: the session is a single
/// stateful browser, and nothing else may drive it while a run is going.
pub struct Crawler<'a, B: ?Sized, S: ?Sized> {
    session: &'a mut B,
    store: &'a mut S,
    navigator: RetryingNavigator,
    settings: CrawlSettings,
}

impl<'a, B, S> Crawler<'a, B, S>
where
    B: PageNavigator + ItemExtractor + ?Sized,
    S: GraphStore + ?Sized,
{
    pub fn new(session: &'a mut B, store: &'a mut S, settings: CrawlSettings) -> Self {
        Self {
            session,
            store,
            navigator: RetryingNavigator::new(settings.retry),
            settings,
        }
    }

    /// Crawls everything reachable from `root`
    ///
    /// Nodes and edges are committed as they are discovered, so when this
    /// returns an error the store holds everything found up to that point.
    /// The run record is closed as `completed` or `failed` either way.
    pub async fn run(&mut self, root: ItemDescriptor) -> Result<CrawlReport> {
        let start = Instant::now();
        let run_id = self.store.create_run(
            &self.settings.scope_name,
            &root.location,
            &self.settings.config_hash,
        )?;
        tracing::info!(
            "Starting crawl run {} at {} ({})",
            run_id,
            root.location,
            root.title
        );

        let mut report = CrawlReport {
            run_id,
            ..CrawlReport::default()
        };
        let outcome = self.traverse(run_id, root, &mut report).await;
        report.elapsed = start.elapsed();

        match outcome {
            Ok(()) => {
                self.store.finish_run(run_id, RunStatus::Completed)?;
                tracing::info!(
                    "Crawl completed: {} pages, {} nodes, {} edges in {:?}",
                    report.pages_visited,
                    report.nodes_created,
                    report.edges_created,
                    report.elapsed
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    "Crawl run {} aborted after {} pages ({} nodes, {} edges) in {:?}: {}",
                    run_id,
                    report.pages_visited,
                    report.nodes_created,
                    report.edges_created,
                    report.elapsed,
                    e
                );
                if let Err(store_err) = self.store.finish_run(run_id, RunStatus::Failed) {
                    tracing::warn!("Could not mark run {} as failed: {}", run_id, store_err);
                }
                Err(e)
            }
        }
    }

    async fn traverse(
        &mut self,
        run_id: i64,
        root: ItemDescriptor,
        report: &mut CrawlReport,
    ) -> Result<()> {
        let mut frontier = Frontier::new();
        frontier.mark_visited(&root.location);
        frontier.push(FrontierEntry::root(root));

        while let Some(entry) = frontier.pop() {
            let known = match entry.node_id {
                Some(id) => Some(self.store.get_node(id)?),
                None => self.store.find_node_by_location(&entry.item.location)?,
            };

            if let Some(node) = &known {
                if node.expanded && self.settings.revisit == RevisitPolicy::SkipExpanded {
                    tracing::debug!("{} already expanded, walking stored children", node.location);
                    self.enqueue_stored_children(node, entry.depth, &mut frontier)?;
                    report.expansions_skipped += 1;
                    continue;
                }
            }

            self.navigator
                .navigate(&mut *self.session, &entry.item.location, &entry.item.title)
                .await?;
            report.pages_visited += 1;

            let parent = match known {
                Some(node) => node,
                None => self.materialize(run_id, &entry.item, false, entry.parent_id, report)?,
            };

            self.expand(run_id, &parent, entry.depth, &mut frontier, report)
                .await?;

            if report.pages_visited % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages visited, {} in frontier, {} nodes created",
                    report.pages_visited,
                    frontier.len(),
                    report.nodes_created
                );
            }
        }

        tracing::info!(
            "Frontier is empty, crawl complete ({} locations seen)",
            frontier.visited_count()
        );
        Ok(())
    }

    /// Reads the rendered page's children and records them under `parent`
    async fn expand(
        &mut self,
        run_id: i64,
        parent: &NodeRecord,
        depth: u32,
        frontier: &mut Frontier,
        report: &mut CrawlReport,
    ) -> Result<()> {
        let timeout = self.settings.extraction_timeout;
        let containers = self.session.query_container_children(timeout).await?;
        let leaves = self.session.query_leaf_children(timeout).await?;
        tracing::debug!(
            "{}: {} containers, {} leaves",
            parent.location,
            containers.len(),
            leaves.len()
        );

        for child in containers {
            if !frontier.mark_visited(&child.location) {
                tracing::debug!("Skipping already visited {}", child.location);
                continue;
            }
            let node = self.materialize(run_id, &child, false, Some(parent.id), report)?;
            // The stored kind wins; a stored leaf is never navigated
            if node.is_leaf {
                continue;
            }
            frontier.push(FrontierEntry {
                item: child,
                depth: depth + 1,
                node_id: Some(node.id),
                parent_id: Some(parent.id),
            });
        }

        // Leaves are never explored, so the visited set does not apply
        for leaf in leaves {
            self.materialize(run_id, &leaf, true, Some(parent.id), report)?;
            report.leaves_found += 1;
        }

        self.store.mark_expanded(parent.id)?;
        Ok(())
    }

    /// Finds or creates the node for `item`, then links it from `parent`
    fn materialize(
        &mut self,
        run_id: i64,
        item: &ItemDescriptor,
        is_leaf: bool,
        parent: Option<i64>,
        report: &mut CrawlReport,
    ) -> Result<NodeRecord> {
        let node = match self.store.find_node_by_location(&item.location)? {
            Some(existing) => {
                if existing.is_leaf != is_leaf {
                    tracing::warn!(
                        "{} reported as {} but stored as {}",
                        item.location,
                        kind_name(is_leaf),
                        kind_name(existing.is_leaf)
                    );
                }
                existing
            }
            None => {
                let created = self.store.create_node(&NewNode {
                    location: &item.location,
                    title: &item.title,
                    is_leaf,
                    scope_name: &self.settings.scope_name,
                    run_id,
                })?;
                report.nodes_created += 1;
                created
            }
        };

        if let Some(parent_id) = parent {
            self.store.create_edge(parent_id, node.id, run_id)?;
            report.edges_created += 1;
        }

        Ok(node)
    }

    fn enqueue_stored_children(
        &mut self,
        node: &NodeRecord,
        depth: u32,
        frontier: &mut Frontier,
    ) -> Result<()> {
        for child in self.store.container_children(node.id)? {
            if !frontier.mark_visited(&child.location) {
                continue;
            }
            frontier.push(FrontierEntry {
                item: ItemDescriptor::new(child.location.clone(), child.title.clone()),
                depth: depth + 1,
                node_id: Some(child.id),
                parent_id: Some(node.id),
            });
        }
        Ok(())
    }
}

fn kind_name(is_leaf: bool) -> &'static str {
    if is_leaf {
        "leaf"
    } else {
        "container"
    }
}
