use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use fitlog_types::{Notification, NotificationKind, UserSummary};

use crate::db::{format_timestamp, media_url, parse_optional_uuid, parse_uuid, timestamp_col, uuid_col, DbPool};

/// A notification about to be written
pub struct NewNotification<'a> {
    pub user_id: &'a Uuid,
    pub actor_id: Option<&'a Uuid>,
    pub kind: NotificationKind,
    pub post_id: Option<&'a Uuid>,
    pub message: &'a str,
}

pub struct NotificationRepository {
    pool: DbPool,
}

fn map_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(1)?;
    let kind = NotificationKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown notification kind: {}", kind).into(),
        )
    })?;

    let actor_id: Option<String> = row.get(6)?;
    let actor = match actor_id {
        Some(id) => {
            let avatar_key: Option<String> = row.get(9)?;
            Some(UserSummary {
                id: parse_uuid(6, &id)?,
                username: row.get(7)?,
                display_name: row.get(8)?,
                avatar_url: avatar_key.as_deref().map(media_url),
            })
        }
        None => None,
    };

    Ok(Notification {
        id: uuid_col(row, 0)?,
        kind,
        actor,
        post_id: parse_optional_uuid(2, row.get(2)?)?,
        message: row.get(3)?,
        is_read: row.get::<_, i64>(4)? != 0,
        created_at: timestamp_col(row, 5)?,
    })
}

impl NotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, notification: &NewNotification<'_>) -> Result<Uuid> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO notifications (id, user_id, actor_id, kind, post_id, message, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            (
                id.to_string(),
                notification.user_id.to_string(),
                notification.actor_id.map(|a| a.to_string()),
                notification.kind.as_str(),
                notification.post_id.map(|p| p.to_string()),
                notification.message,
                format_timestamp(Utc::now()),
            ),
        )
        .context("Failed to create notification")?;
        Ok(id)
    }

    /// Notifications for a user, newest first
    pub fn list(&self, user_id: &Uuid, limit: i64, unread_only: bool) -> Result<Vec<Notification>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT n.id, n.kind, n.post_id, n.message, n.is_read, n.created_at,
                    a.id, a.username, a.display_name, a.avatar_key
             FROM notifications n
             LEFT JOIN users a ON a.id = n.actor_id
             WHERE n.user_id = ?1 AND (?2 = 0 OR n.is_read = 0)
             ORDER BY n.created_at DESC, n.rowid DESC
             LIMIT ?3",
        )?;
        let notifications = stmt
            .query_map((user_id.to_string(), unread_only as i64, limit), map_notification)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    pub fn unread_count(&self, user_id: &Uuid) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Mark one notification read. Returns false if it does not belong to the user.
    pub fn mark_read(&self, notification_id: &Uuid, user_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let updated = conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                (notification_id.to_string(), user_id.to_string()),
            )
            .context("Failed to mark notification read")?;
        Ok(updated > 0)
    }

    /// Returns how many notifications changed state
    pub fn mark_all_read(&self, user_id: &Uuid) -> Result<usize> {
        let conn = self.pool.get()?;
        let updated = conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
            )
            .context("Failed to mark notifications read")?;
        Ok(updated)
    }
}
