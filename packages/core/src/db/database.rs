//! Database Connection Management
//!
//! This module provides the libsql/Turso connection and schema setup used by
//! `TursoStore`.
//!
//! # Architecture
//!
//! - **One file, one table per tree instance**: `question_bank_nodes` and
//!   `previous_paper_nodes` live side by side and never reference each other
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: `parent_id` references the same table with
//!   `ON DELETE RESTRICT`, so the store itself refuses to orphan children
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS` on every open
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** The 5-second
//! busy timeout lets concurrent writers wait instead of failing immediately
//! with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use syllabus_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/syllabus.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use crate::models::{TreeInstance, TreeInstanceConfig};
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing the libsql connection and schema
#[derive(Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` and initialize the tables of
    /// every shipped tree instance.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;
        tracing::info!(path = %service.db_path.display(), "Database ready");

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so they go through `query()` instead of
    /// `execute()`.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create the tables and indexes of every tree instance
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        for instance in TreeInstance::ALL {
            self.create_instance_table(&conn, instance.config()).await?;
        }

        // Flush the fresh schema so a second connection sees it immediately
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    async fn create_instance_table(
        &self,
        conn: &libsql::Connection,
        config: &TreeInstanceConfig,
    ) -> Result<(), DatabaseError> {
        let table = config.table;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    level INTEGER NOT NULL CHECK (level BETWEEN 1 AND {max_level}),
                    node_type TEXT NOT NULL,
                    color TEXT,
                    sort_order INTEGER NOT NULL,
                    parent_id TEXT,
                    question_count INTEGER NOT NULL DEFAULT 0,
                    is_published INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (parent_id) REFERENCES {table}(id) ON DELETE RESTRICT
                )",
                table = table,
                max_level = config.max_level()
            ),
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create table {}: {}", table, e))
        })?;

        let indexes = [
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_siblings ON {table}(level, parent_id, sort_order)"
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_id)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_published ON {table}(is_published)"),
        ];

        for sql in indexes {
            conn.execute(&sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!("Failed to run '{}': {}", sql, e))
            })?;
        }

        Ok(())
    }

    /// Get a raw connection handle.
    ///
    /// Prefer `connect_with_timeout()` in async code.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with busy timeout and foreign keys configured
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }
}
