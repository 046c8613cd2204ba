use crate::db::{format_timestamp, Database};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

/// Database-backed session manager for login tokens
///
/// Manages user sessions with token-based authentication, including:
/// - Session creation with UUID v4 tokens and a configurable lifetime
/// - Session validation with expiry checking
/// - Session deletion (logout)
/// - Cleanup of expired sessions
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Database, ttl_days: i64) -> Self {
        Self {
            db,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Create a new session for a user and return its token
    pub fn create_session(&self, user_id: Uuid) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + self.ttl;

        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                token,
                user_id.to_string(),
                format_timestamp(created_at),
                format_timestamp(expires_at),
            ],
        )
        .context("Failed to create session")?;

        tracing::info!("Created session for user {}", user_id);
        Ok(token)
    }

    /// Validate a session token and return the associated user ID
    ///
    /// Returns `Ok(None)` for unknown tokens and for expired ones; an expired
    /// session is deleted on the way out.
    pub fn validate_session(&self, token: &str) -> Result<Option<Uuid>> {
        let conn = self.db.connection()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                rusqlite::params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((user_id_str, expires_at_str)) = row else {
            return Ok(None);
        };

        let expires_at = expires_at_str
            .parse::<DateTime<Utc>>()
            .context("Failed to parse expiry time")?;

        if Utc::now() > expires_at {
            self.delete_session(token)?;
            tracing::debug!("Rejected expired session");
            return Ok(None);
        }

        let user_id = Uuid::parse_str(&user_id_str).context("Failed to parse user ID")?;
        Ok(Some(user_id))
    }

    /// Delete a session (logout). Deleting an unknown token is not an error.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.db.connection()?;
        let rows_affected = conn
            .execute("DELETE FROM sessions WHERE token = ?1", rusqlite::params![token])
            .context("Failed to delete session")?;

        if rows_affected > 0 {
            tracing::info!("Deleted session");
        }

        Ok(())
    }

    /// Remove all sessions past their expiry time
    ///
    /// # Returns
    /// * `Result<usize>` - The number of sessions deleted
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.db.connection()?;
        let now = format_timestamp(Utc::now());

        let rows_affected = conn
            .execute("DELETE FROM sessions WHERE expires_at < ?1", rusqlite::params![now])
            .context("Failed to cleanup expired sessions")?;

        if rows_affected > 0 {
            tracing::info!("Cleaned up {} expired sessions", rows_affected);
        }

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, setup_db};

    fn setup() -> (Database, SessionManager, Uuid) {
        let db = setup_db();
        let user_id = create_user(&db, "testuser");
        let manager = SessionManager::new(db.clone(), 30);
        (db, manager, user_id)
    }

    #[test]
    fn test_create_and_validate_session() {
        let (_db, manager, user_id) = setup();

        let token = manager.create_session(user_id).expect("Failed to create session");
        assert!(Uuid::parse_str(&token).is_ok(), "Token should be a valid UUID");
        assert_eq!(manager.validate_session(&token).unwrap(), Some(user_id));
    }

    #[test]
    fn test_validate_invalid_session() {
        let (_db, manager, _) = setup();
        assert_eq!(manager.validate_session("invalid-token").unwrap(), None);
    }

    #[test]
    fn test_delete_session_is_idempotent() {
        let (_db, manager, user_id) = setup();

        let token = manager.create_session(user_id).expect("Failed to create session");
        manager.delete_session(&token).expect("Failed to delete session");
        manager.delete_session(&token).expect("Second delete should succeed");

        assert_eq!(manager.validate_session(&token).unwrap(), None);
    }

    #[test]
    fn test_expired_session_is_rejected_and_removed() {
        let (db, manager, user_id) = setup();
        let token = manager.create_session(user_id).unwrap();

        let conn = db.connection().unwrap();
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
            rusqlite::params![format_timestamp(Utc::now() - Duration::days(1)), token],
        )
        .unwrap();

        assert_eq!(manager.validate_session(&token).unwrap(), None);
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_cleanup_expired_sessions() {
        let (db, manager, user_id) = setup();
        let expired = manager.create_session(user_id).unwrap();
        let live = manager.create_session(user_id).unwrap();

        let conn = db.connection().unwrap();
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
            rusqlite::params![format_timestamp(Utc::now() - Duration::days(1)), expired],
        )
        .unwrap();

        assert_eq!(manager.cleanup_expired_sessions().unwrap(), 1);
        assert_eq!(manager.validate_session(&live).unwrap(), Some(user_id));
    }

    #[test]
    fn test_ttl_is_configurable() {
        let (db, _, user_id) = setup();
        let manager = SessionManager::new(db.clone(), 2);
        let token = manager.create_session(user_id).unwrap();

        let conn = db.connection().unwrap();
        let expires_at: String = conn
            .query_row("SELECT expires_at FROM sessions WHERE token = ?1", [&token], |row| row.get(0))
            .unwrap();
        let expires_at = expires_at.parse::<DateTime<Utc>>().unwrap();
        let remaining = expires_at - Utc::now();
        assert!(remaining <= Duration::days(2));
        assert!(remaining > Duration::days(2) - Duration::minutes(1));
    }
}
