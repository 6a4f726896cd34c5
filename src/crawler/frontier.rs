//! Breadth-first frontier with its visited set
//!
//! A location enters the visited set the moment it is first accepted, so a
//! container reported by several parents, or twice by the same page, is
//! queued exactly once.

use crate::page::ItemDescriptor;
use std::collections::{HashSet, VecDeque};

/// An item waiting to be navigated and expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub item: ItemDescriptor,

    /// Distance from the root (root is 0)
    pub depth: u32,

    /// Node already materialized for this item, if any
    pub node_id: Option<i64>,

    /// Node that discovered this item; `None` only for the root
    pub parent_id: Option<i64>,
}

impl FrontierEntry {
    /// Entry for the crawl root, resolved when dequeued
    pub fn root(item: ItemDescriptor) -> Self {
        Self {
            item,
            depth: 0,
            node_id: None,
            parent_id: None,
        }
    }
}

/// FIFO queue of items plus the set of locations ever accepted
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `location` as visited
    ///
    /// Returns `false` if it was already known, in which case the caller
    /// must not enqueue it again.
    pub fn mark_visited(&mut self, location: &str) -> bool {
        if self.visited.contains(location) {
            return false;
        }
        self.visited.insert(location.to_string())
    }

    pub fn push(&mut self, entry: FrontierEntry) {
        self.queue.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
