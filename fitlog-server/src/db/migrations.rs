use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::format_timestamp;

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);";

/// A versioned, idempotent schema change for databases created by older releases.
///
/// Migrations run before the base schema is applied, so each step must cope
/// with its table not existing yet (fresh database) as well as with the change
/// already being present.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    apply: fn(&Connection) -> Result<()>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "rename_user_to_users",
        apply: |conn| rename_table_if_present(conn, "user", "users"),
    },
    Migration {
        version: 2,
        name: "rename_post_to_posts",
        apply: |conn| rename_table_if_present(conn, "post", "posts"),
    },
    Migration {
        version: 3,
        name: "add_post_visibility",
        apply: |conn| {
            add_column_if_missing(
                conn,
                "posts",
                "visibility",
                "TEXT NOT NULL DEFAULT 'public'",
            )
        },
    },
    Migration {
        version: 4,
        name: "add_media_columns",
        apply: |conn| {
            add_column_if_missing(conn, "posts", "image_key", "TEXT")?;
            add_column_if_missing(conn, "posts", "image_mime", "TEXT")?;
            add_column_if_missing(conn, "users", "avatar_key", "TEXT")?;
            add_column_if_missing(conn, "users", "avatar_mime", "TEXT")
        },
    },
];

/// Apply every migration that has not been recorded yet.
/// Returns the names of the migrations applied by this call.
pub fn run(conn: &mut Connection) -> Result<Vec<&'static str>> {
    conn.execute_batch(MIGRATIONS_TABLE)
        .context("Failed to create schema_migrations table")?;

    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        if is_recorded(conn, migration.version)? {
            continue;
        }

        let tx = conn.transaction()?;
        (migration.apply)(&tx)
            .with_context(|| format!("Migration {} ({}) failed", migration.version, migration.name))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![migration.version, migration.name, format_timestamp(Utc::now())],
        )?;
        tx.commit()?;

        tracing::info!("Applied migration {} ({})", migration.version, migration.name);
        applied.push(migration.name);
    }

    Ok(applied)
}

/// Versions already recorded in `schema_migrations`, ascending
pub fn applied_versions(conn: &Connection) -> Result<Vec<i64>> {
    conn.execute_batch(MIGRATIONS_TABLE)?;
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(versions)
}

fn is_recorded(conn: &Connection, version: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT version FROM schema_migrations WHERE version = ?1",
            [version],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{}')", table))?;
    let columns = stmt
        .query_map([], |row| row.get(1))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(columns)
}

fn rename_table_if_present(conn: &Connection, from: &str, to: &str) -> Result<()> {
    if table_exists(conn, from)? && !table_exists(conn, to)? {
        conn.execute_batch(&format!("ALTER TABLE \"{}\" RENAME TO \"{}\"", from, to))
            .with_context(|| format!("Failed to rename table {} to {}", from, to))?;
    }
    Ok(())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, definition: &str) -> Result<()> {
    if !table_exists(conn, table)? {
        return Ok(());
    }
    if table_columns(conn, table)?.iter().any(|c| c == column) {
        return Ok(());
    }
    conn.execute_batch(&format!(
        "ALTER TABLE \"{}\" ADD COLUMN {} {}",
        table, column, definition
    ))
    .with_context(|| format!("Failed to add column {}.{}", table, column))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_records_every_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = run(&mut conn).unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());

        let versions = applied_versions(&conn).unwrap();
        assert_eq!(versions, vec![1, 2, 3, 4]);

        // Second run is a no-op
        assert!(run(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn legacy_tables_are_renamed_and_extended() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE user (id INTEGER PRIMARY KEY, username TEXT);
             CREATE TABLE post (id INTEGER PRIMARY KEY, user_id INTEGER, sport TEXT, minutes INTEGER);
             INSERT INTO post (user_id, sport, minutes) VALUES (1, 'run', 30);",
        )
        .unwrap();

        run(&mut conn).unwrap();

        assert!(table_exists(&conn, "users").unwrap());
        assert!(!table_exists(&conn, "user").unwrap());
        assert!(table_exists(&conn, "posts").unwrap());

        let post_columns = table_columns(&conn, "posts").unwrap();
        assert!(post_columns.contains(&"visibility".to_string()));
        assert!(post_columns.contains(&"image_mime".to_string()));

        let user_columns = table_columns(&conn, "users").unwrap();
        assert!(user_columns.contains(&"avatar_mime".to_string()));

        let visibility: String = conn
            .query_row("SELECT visibility FROM posts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(visibility, "public");
    }

    #[test]
    fn rename_skipped_when_target_exists() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE user (id INTEGER PRIMARY KEY);
             CREATE TABLE users (id TEXT PRIMARY KEY);",
        )
        .unwrap();

        run(&mut conn).unwrap();

        assert!(table_exists(&conn, "user").unwrap());
        assert!(table_exists(&conn, "users").unwrap());
    }
}
