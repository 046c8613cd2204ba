use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use super::migrations;
use super::schema::{BADGE_CATALOG, SCHEMA};

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager = Self::create_connection_manager(path)
            .with_init(|conn| {
                conn.busy_timeout(Duration::from_secs(5))?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")
            });
        let pool = Pool::new(manager).context("Failed to create database connection pool")?;
        Ok(Self { pool })
    }

    /// Create appropriate connection manager based on path
    ///
    /// `:memory:` maps to a uniquely named shared-cache memory database so that
    /// every pooled connection sees the same data.
    fn create_connection_manager<P: AsRef<Path>>(path: P) -> SqliteConnectionManager {
        let path_str = path.as_ref().to_string_lossy();
        let trimmed_path = path_str.trim();

        if trimmed_path.eq_ignore_ascii_case(MEMORY_DB_PATH) {
            SqliteConnectionManager::file(format!(
                "file:fitlog-{}?mode=memory&cache=shared",
                Uuid::new_v4().simple()
            ))
        } else {
            SqliteConnectionManager::file(path)
        }
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Bring the schema up to date: legacy migrations, base tables, badge catalog
    pub fn initialize(&self) -> Result<()> {
        let mut conn = self.connection()?;

        let applied = migrations::run(&mut conn)?;
        if !applied.is_empty() {
            tracing::info!("Applied {} schema migration(s)", applied.len());
        }

        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        conn.execute_batch(BADGE_CATALOG)
            .context("Failed to seed badge catalog")?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        // Verify tables exist
        let conn = db.connection().expect("Failed to get connection");
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .expect("Failed to prepare statement");

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("Failed to query tables")
            .collect::<Result<Vec<_>, _>>()
            .expect("Failed to collect tables");

        for table in [
            "users",
            "posts",
            "comments",
            "likes",
            "friends",
            "pending_invites",
            "notifications",
            "badges",
            "user_badges",
            "sessions",
            "media_blobs",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("first initialize");
        db.initialize().expect("second initialize");

        let conn = db.connection().unwrap();
        let badges: i64 = conn
            .query_row("SELECT COUNT(*) FROM badges", [], |row| row.get(0))
            .unwrap();
        assert_eq!(badges, 5);
    }

    #[test]
    fn test_pooled_connections_share_memory_database() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().unwrap();

        let first = db.connection().unwrap();
        let second = db.connection().unwrap();
        first
            .execute(
                "INSERT INTO media_blobs (key, mime, data, created_at) VALUES ('k', 'image/png', x'00', '2025-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM media_blobs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_separate_memory_databases_are_isolated() {
        let a = Database::in_memory().unwrap();
        let b = Database::in_memory().unwrap();
        a.initialize().unwrap();

        let conn = b.connection().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();

        let conn = db.connection().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (id, user_id, sport, minutes, created_at) VALUES ('p', 'missing', 'run', 10, '2025-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
