//! TursoStore - HierarchyStore Implementation for Turso/libsql
//!
//! This module implements the `HierarchyStore` trait on top of `DatabaseService`.
//! Each `TursoStore` is bound to the table of one tree instance.
//!
//! # Design Principles
//!
//! 1. **No business logic**: invariants are the engine's job; the store only
//!    persists and queries
//! 2. **Row Conversion**: `row_to_node` is the single libsql::Row → model mapping
//! 3. **Explicit transactions**: `apply_batch` runs inside
//!    `BEGIN TRANSACTION`/`COMMIT` and issues `ROLLBACK` on the first failure
//!
//! # Examples
//!
//! ```rust,no_run
//! use syllabus_core::db::{DatabaseService, HierarchyStore, TursoStore};
//! use syllabus_core::models::QUESTION_BANK;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/syllabus.db")).await?);
//!     let store: Arc<dyn HierarchyStore> = Arc::new(TursoStore::new(db, &QUESTION_BANK));
//!     let node = store.get_node("node-123").await?;
//!     Ok(())
//! }
//! ```

use crate::db::error::DatabaseError;
use crate::db::node_store::HierarchyStore;
use crate::db::DatabaseService;
use crate::models::{
    HierarchyNode, LevelAggregate, NodeFilter, NodeUpdate, ParentFilter, TreeInstanceConfig,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::params::Params;
use libsql::{Row, Value};
use std::sync::Arc;

const NODE_COLUMNS: &str = "id, name, level, node_type, color, sort_order, parent_id, \
                            question_count, is_published, created_at, updated_at";

/// TursoStore implements `HierarchyStore` for one tree instance table
#[derive(Debug, Clone)]
pub struct TursoStore {
    db: Arc<DatabaseService>,
    config: &'static TreeInstanceConfig,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>, config: &'static TreeInstanceConfig) -> Self {
        Self { db, config }
    }

    fn table(&self) -> &'static str {
        self.config.table
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(anyhow!(
            "Unable to parse timestamp '{}' as RFC3339 or SQLite format",
            s
        ))
    }

    /// Convert libsql::Row to HierarchyNode
    ///
    /// Expected columns, in order: see `NODE_COLUMNS`.
    fn row_to_node(&self, row: &Row) -> Result<HierarchyNode> {
        let id: String = row.get(0).context("Failed to get id")?;
        let name: String = row.get(1).context("Failed to get name")?;
        let level: i64 = row.get(2).context("Failed to get level")?;
        let node_type: String = row.get(3).context("Failed to get node_type")?;
        let color: Option<String> = row.get(4).context("Failed to get color")?;
        let order: i64 = row.get(5).context("Failed to get sort_order")?;
        let parent_id: Option<String> = row.get(6).context("Failed to get parent_id")?;
        let question_count: i64 = row.get(7).context("Failed to get question_count")?;
        let is_published: i64 = row.get(8).context("Failed to get is_published")?;
        let created_at_str: String = row.get(9).context("Failed to get created_at")?;
        let updated_at_str: String = row.get(10).context("Failed to get updated_at")?;

        let level = u8::try_from(level).map_err(|_| {
            DatabaseError::invalid_row(self.table(), format!("level {} for node {}", level, id))
        })?;

        Ok(HierarchyNode {
            id,
            name,
            level,
            node_type,
            color,
            order,
            parent_id,
            question_count,
            is_published: is_published != 0,
            created_at: Self::parse_timestamp(&created_at_str)
                .context("Failed to parse created_at")?,
            updated_at: Self::parse_timestamp(&updated_at_str)
                .context("Failed to parse updated_at")?,
        })
    }

    async fn query_nodes(&self, sql: &str, values: Vec<Value>) -> Result<Vec<HierarchyNode>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Query failed: {}", e)))?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            nodes.push(self.row_to_node(&row)?);
        }
        Ok(nodes)
    }

    /// Build `SET` clause and positional values for a sparse update.
    /// Returns `None` when the update carries no field.
    fn update_statement(&self, id: &str, update: &NodeUpdate) -> Option<(String, Vec<Value>)> {
        if update.is_empty() {
            return None;
        }

        let mut sets = Vec::new();
        let mut values = Vec::new();

        if let Some(name) = &update.name {
            sets.push("name = ?");
            values.push(Value::Text(name.clone()));
        }
        if let Some(color) = &update.color {
            sets.push("color = ?");
            values.push(text_or_null(color.as_deref()));
        }
        if let Some(order) = update.order {
            sets.push("sort_order = ?");
            values.push(Value::Integer(order));
        }
        if let Some(count) = update.question_count {
            sets.push("question_count = ?");
            values.push(Value::Integer(count));
        }
        if let Some(published) = update.is_published {
            sets.push("is_published = ?");
            values.push(Value::Integer(i64::from(published)));
        }
        sets.push("updated_at = ?");
        values.push(Value::Text(Utc::now().to_rfc3339()));
        values.push(Value::Text(id.to_string()));

        Some((
            format!(
                "UPDATE {} SET {} WHERE id = ?",
                self.table(),
                sets.join(", ")
            ),
            values,
        ))
    }

    async fn fetch_existing(&self, id: &str) -> Result<HierarchyNode> {
        self.get_node(id)
            .await?
            .ok_or_else(|| anyhow!("Node not found: {}", id))
    }
}

fn text_or_null(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}

#[async_trait]
impl HierarchyStore for TursoStore {
    async fn create_node(&self, node: HierarchyNode) -> Result<HierarchyNode> {
        let conn = self.db.connect_with_timeout().await?;

        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                self.table(),
                NODE_COLUMNS
            ),
            Params::Positional(vec![
                Value::Text(node.id.clone()),
                Value::Text(node.name.clone()),
                Value::Integer(i64::from(node.level)),
                Value::Text(node.node_type.clone()),
                text_or_null(node.color.as_deref()),
                Value::Integer(node.order),
                text_or_null(node.parent_id.as_deref()),
                Value::Integer(node.question_count),
                Value::Integer(i64::from(node.is_published)),
                Value::Text(node.created_at.to_rfc3339()),
                Value::Text(node.updated_at.to_rfc3339()),
            ]),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;

        self.fetch_existing(&node.id).await
    }

    async fn get_node(&self, id: &str) -> Result<Option<HierarchyNode>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            NODE_COLUMNS,
            self.table()
        );
        let mut nodes = self
            .query_nodes(&sql, vec![Value::Text(id.to_string())])
            .await?;
        Ok(nodes.pop())
    }

    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<HierarchyNode> {
        let Some((sql, values)) = self.update_statement(id, &update) else {
            return self.fetch_existing(id).await;
        };

        let conn = self.db.connect_with_timeout().await?;
        let changed = conn
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to update node: {}", e)))?;

        if changed == 0 {
            return Err(anyhow!("Node not found: {}", id));
        }

        self.fetch_existing(id).await
    }

    async fn delete_node(&self, id: &str) -> Result<()> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(&format!("DELETE FROM {} WHERE id = ?", self.table()), [id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))?;
        Ok(())
    }

    async fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<HierarchyNode>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values = Vec::new();

        if let Some(level) = filter.level {
            clauses.push("level = ?".to_string());
            values.push(Value::Integer(i64::from(level)));
        }
        match &filter.parent {
            ParentFilter::Any => {}
            ParentFilter::Root => clauses.push("parent_id IS NULL".to_string()),
            ParentFilter::Id(parent_id) => {
                clauses.push("parent_id = ?".to_string());
                values.push(Value::Text(parent_id.clone()));
            }
        }
        if let Some(published) = filter.is_published {
            clauses.push("is_published = ?".to_string());
            values.push(Value::Integer(i64::from(published)));
        }
        if let Some(ids) = &filter.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            clauses.push(format!("id IN ({})", placeholders));
            values.extend(ids.iter().map(|id| Value::Text(id.clone())));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY sort_order ASC, created_at ASC",
            NODE_COLUMNS,
            self.table(),
            where_clause
        );
        self.query_nodes(&sql, values).await
    }

    async fn max_sibling_order(&self, level: u8, parent_id: Option<&str>) -> Result<Option<i64>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT MAX(sort_order) FROM {} WHERE level = ? AND parent_id IS ?",
                    self.table()
                ),
                Params::Positional(vec![
                    Value::Integer(i64::from(level)),
                    text_or_null(parent_id),
                ]),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to aggregate order: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => Ok(row.get::<Option<i64>>(0)?),
            None => Ok(None),
        }
    }

    async fn count_children(&self, id: &str) -> Result<usize> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                &format!("SELECT COUNT(*) FROM {} WHERE parent_id = ?", self.table()),
                [id],
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to count children: {}", e)))?;

        let count = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn level_stats(&self) -> Result<Vec<LevelAggregate>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT level, COUNT(*), COALESCE(SUM(question_count), 0) FROM {} \
                     GROUP BY level ORDER BY level",
                    self.table()
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to aggregate levels: {}", e)))?;

        let mut stats = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let level: i64 = row.get(0)?;
            stats.push(LevelAggregate {
                level: u8::try_from(level).map_err(|_| {
                    DatabaseError::invalid_row(self.table(), format!("level {}", level))
                })?,
                count: row.get(1)?,
                total_questions: row.get(2)?,
            });
        }
        Ok(stats)
    }

    async fn apply_batch(&self, updates: Vec<(String, NodeUpdate)>) -> Result<Vec<HierarchyNode>> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        for (id, update) in &updates {
            let Some((sql, values)) = self.update_statement(id, update) else {
                continue;
            };

            match conn.execute(&sql, Params::Positional(values)).await {
                Ok(0) => {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(anyhow!("Batch aborted, node not found: {}", id));
                }
                Ok(_) => {}
                Err(e) => {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::sql_execution(format!(
                        "Failed to update node {}: {}",
                        id, e
                    ))
                    .into());
                }
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(
                DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e)).into(),
            );
        }

        let mut updated = Vec::with_capacity(updates.len());
        for (id, _) in &updates {
            updated.push(self.fetch_existing(id).await?);
        }
        Ok(updated)
    }
}
