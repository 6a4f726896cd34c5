//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the GraphStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{GraphStore, StorageError, StorageResult};
use crate::storage::{EdgeRecord, ExportKind, NewNode, NodeRecord, RunRecord, RunStatus};
use crate::BranchmapError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const NODE_COLUMNS: &str = "id, location, title, is_leaf, scope_name, png_exported, pdf_exported,
     expanded, discovered_at, discovered_run";

const RUN_COLUMNS: &str =
    "id, scope_name, root_location, started_at, finished_at, config_hash, status";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(BranchmapError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, BranchmapError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, BranchmapError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Marks an export as done for a leaf
    ///
    /// Used by the downstream export step; the crawler never calls this.
    pub fn mark_exported(&mut self, node_id: i64, kind: ExportKind) -> StorageResult<()> {
        let sql = match kind {
            ExportKind::Png => "UPDATE nodes SET png_exported = 1 WHERE id = ?1",
            ExportKind::Pdf => "UPDATE nodes SET pdf_exported = 1 WHERE id = ?1",
        };
        let updated = self.conn.execute(sql, params![node_id])?;
        if updated == 0 {
            return Err(StorageError::NodeNotFound(node_id));
        }
        Ok(())
    }
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
    Ok(NodeRecord {
        id: row.get(0)?,
        location: row.get(1)?,
        title: row.get(2)?,
        is_leaf: row.get(3)?,
        scope_name: row.get(4)?,
        png_exported: row.get(5)?,
        pdf_exported: row.get(6)?,
        expanded: row.get(7)?,
        discovered_at: row.get(8)?,
        discovered_run: row.get(9)?,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<EdgeRecord> {
    Ok(EdgeRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        destination_id: row.get(2)?,
        discovered_run: row.get(3)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        scope_name: row.get(1)?,
        root_location: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Failed),
    })
}

impl GraphStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        scope_name: &str,
        root_location: &str,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (scope_name, root_location, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                scope_name,
                root_location,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Node Management =====

    fn find_node_by_location(&self, location: &str) -> StorageResult<Option<NodeRecord>> {
        let node = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE location = ?1", NODE_COLUMNS),
                params![location],
                node_from_row,
            )
            .optional()?;
        Ok(node)
    }

    fn create_node(&mut self, node: &NewNode<'_>) -> StorageResult<NodeRecord> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO nodes (location, title, is_leaf, scope_name, png_exported, pdf_exported,
             expanded, discovered_at, discovered_run)
             VALUES (?1, ?2, ?3, ?4, 0, 0, 0, ?5, ?6)",
            params![
                node.location,
                node.title,
                node.is_leaf,
                node.scope_name,
                now,
                node.run_id
            ],
        )?;

        Ok(NodeRecord {
            id: self.conn.last_insert_rowid(),
            location: node.location.to_string(),
            title: node.title.to_string(),
            is_leaf: node.is_leaf,
            scope_name: node.scope_name.to_string(),
            png_exported: false,
            pdf_exported: false,
            expanded: false,
            discovered_at: now,
            discovered_run: node.run_id,
        })
    }

    fn get_node(&self, node_id: i64) -> StorageResult<NodeRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                params![node_id],
                node_from_row,
            )
            .optional()?
            .ok_or(StorageError::NodeNotFound(node_id))
    }

    fn mark_expanded(&mut self, node_id: i64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE nodes SET expanded = 1 WHERE id = ?1",
            params![node_id],
        )?;
        if updated == 0 {
            return Err(StorageError::NodeNotFound(node_id));
        }
        Ok(())
    }

    fn container_children(&self, node_id: i64) -> StorageResult<Vec<NodeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.id, n.location, n.title, n.is_leaf, n.scope_name, n.png_exported,
             n.pdf_exported, n.expanded, n.discovered_at, n.discovered_run
             FROM edges e JOIN nodes n ON n.id = e.destination_id
             WHERE e.source_id = ?1 AND n.is_leaf = 0
             GROUP BY n.id
             ORDER BY MIN(e.id)",
        )?;

        let children = stmt
            .query_map(params![node_id], node_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(children)
    }

    // ===== Edge Management =====

    fn create_edge(
        &mut self,
        source_id: i64,
        destination_id: i64,
        run_id: i64,
    ) -> StorageResult<EdgeRecord> {
        self.conn.execute(
            "INSERT INTO edges (source_id, destination_id, discovered_run) VALUES (?1, ?2, ?3)",
            params![source_id, destination_id, run_id],
        )?;

        Ok(EdgeRecord {
            id: self.conn.last_insert_rowid(),
            source_id,
            destination_id,
            discovered_run: run_id,
        })
    }

    fn get_outgoing_edges(&self, node_id: i64) -> StorageResult<Vec<EdgeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, destination_id, discovered_run FROM edges
             WHERE source_id = ?1 ORDER BY id",
        )?;

        let edges = stmt
            .query_map(params![node_id], edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    fn get_incoming_edges(&self, node_id: i64) -> StorageResult<Vec<EdgeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, destination_id, discovered_run FROM edges
             WHERE destination_id = ?1 ORDER BY id",
        )?;

        let edges = stmt
            .query_map(params![node_id], edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    // ===== Statistics =====

    fn count_nodes(&self, is_leaf: Option<bool>) -> StorageResult<u64> {
        let count: i64 = match is_leaf {
            Some(leaf) => self.conn.query_row(
                "SELECT COUNT(*) FROM nodes WHERE is_leaf = ?1",
                params![leaf],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    fn count_edges(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_pending_exports(&self, kind: ExportKind) -> StorageResult<u64> {
        let sql = match kind {
            ExportKind::Png => "SELECT COUNT(*) FROM nodes WHERE is_leaf = 1 AND png_exported = 0",
            ExportKind::Pdf => "SELECT COUNT(*) FROM nodes WHERE is_leaf = 1 AND pdf_exported = 0",
        };
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
