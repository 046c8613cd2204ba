use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use fitlog_types::{User, UserSummary};

use super::post_repository::streak_as_of_today;
use crate::db::{format_timestamp, media_url, timestamp_col, uuid_col, DbPool};

const USER_COLUMNS: &str = "id, username, display_name, bio, avatar_key, created_at";

pub struct UserRepository {
    pool: DbPool,
}

/// Stored credentials for a username, used only by the login flow
pub struct Credentials {
    pub user_id: Uuid,
    pub password_hash: String,
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let avatar_key: Option<String> = row.get(4)?;
    Ok(User {
        id: uuid_col(row, 0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        avatar_url: avatar_key.as_deref().map(media_url),
        streak_days: 0,
        created_at: timestamp_col(row, 5)?,
    })
}

/// Fill in the streak, which is derived from check-ins on every read
fn with_streak(conn: &Connection, mut user: User) -> Result<User> {
    user.streak_days = streak_as_of_today(conn, &user.id)?;
    Ok(user)
}

/// Map `id, username, display_name, avatar_key` starting at column `offset`
pub(crate) fn map_summary(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<UserSummary> {
    let avatar_key: Option<String> = row.get(offset + 3)?;
    Ok(UserSummary {
        id: uuid_col(row, offset)?,
        username: row.get(offset + 1)?,
        display_name: row.get(offset + 2)?,
        avatar_url: avatar_key.as_deref().map(media_url),
    })
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Returns `None` when the username is taken.
    pub fn create(&self, username: &str, password_hash: &str, display_name: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            bio: None,
            avatar_url: None,
            streak_days: 0,
            created_at: Utc::now(),
        };

        let inserted = conn
            .execute(
                "INSERT INTO users (id, username, password_hash, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(username) DO NOTHING",
                (
                    user.id.to_string(),
                    &user.username,
                    password_hash,
                    &user.display_name,
                    format_timestamp(user.created_at),
                ),
            )
            .context("Failed to create user")?;

        Ok((inserted == 1).then_some(user))
    }

    /// Get user by ID
    pub fn get_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [user_id.to_string()],
                map_user,
            )
            .optional()?;
        user.map(|u| with_streak(&conn, u)).transpose()
    }

    /// Get user by username (case-insensitive)
    pub fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                [username],
                map_user,
            )
            .optional()?;
        user.map(|u| with_streak(&conn, u)).transpose()
    }

    pub fn get_credentials(&self, username: &str) -> Result<Option<Credentials>> {
        let conn = self.pool.get()?;
        let creds = conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(Credentials {
                        user_id: uuid_col(row, 0)?,
                        password_hash: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(creds)
    }

    /// List all users ordered by username
    pub fn list_all(&self) -> Result<Vec<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], map_user)?
            .collect::<Result<Vec<_>, _>>()?;
        users.into_iter().map(|u| with_streak(&conn, u)).collect()
    }

    /// Case-insensitive substring search on username and display name.
    /// Exact username matches sort first.
    pub fn search(&self, query: &str, limit: i64) -> Result<Vec<UserSummary>> {
        let conn = self.pool.get()?;
        let pattern = format!(
            "%{}%",
            query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );
        let mut stmt = conn.prepare(
            "SELECT id, username, display_name, avatar_key
             FROM users
             WHERE username LIKE ?1 ESCAPE '\\' OR display_name LIKE ?1 ESCAPE '\\'
             ORDER BY (lower(username) = lower(?2)) DESC, username ASC
             LIMIT ?3",
        )?;
        let users = stmt
            .query_map(rusqlite::params![pattern, query, limit], |row| map_summary(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn update_profile(&self, user_id: &Uuid, display_name: Option<&str>, bio: Option<Option<&str>>) -> Result<()> {
        let conn = self.pool.get()?;
        if let Some(name) = display_name {
            conn.execute(
                "UPDATE users SET display_name = ?1 WHERE id = ?2",
                (name, user_id.to_string()),
            )
            .context("Failed to update display name")?;
        }
        if let Some(bio) = bio {
            conn.execute(
                "UPDATE users SET bio = ?1 WHERE id = ?2",
                (bio, user_id.to_string()),
            )
            .context("Failed to update bio")?;
        }
        Ok(())
    }

    /// Point the user's avatar at a new media key, returning the previous key
    pub fn set_avatar(&self, user_id: &Uuid, key: &str, mime: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT avatar_key FROM users WHERE id = ?1",
                [user_id.to_string()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        tx.execute(
            "UPDATE users SET avatar_key = ?1, avatar_mime = ?2 WHERE id = ?3",
            (key, mime, user_id.to_string()),
        )
        .context("Failed to set avatar")?;
        tx.commit()?;
        Ok(previous)
    }

}
