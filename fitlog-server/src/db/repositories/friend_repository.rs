use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use fitlog_types::Friend;

use super::post_repository::streak_as_of_today;
use super::user_repository::map_summary;
use crate::db::{format_timestamp, timestamp_col, DbPool};

pub struct FriendRepository {
    pool: DbPool,
}

/// Insert both directions of a friendship. Callers pass their own
/// connection or transaction so this can be part of a larger write.
pub(crate) fn insert_friendship(conn: &rusqlite::Connection, a: &Uuid, b: &Uuid) -> Result<()> {
    let now = format_timestamp(Utc::now());
    conn.execute(
        "INSERT INTO friends (user_id, friend_id, created_at) VALUES (?1, ?2, ?3), (?2, ?1, ?3)
         ON CONFLICT(user_id, friend_id) DO NOTHING",
        (a.to_string(), b.to_string(), now),
    )
    .context("Failed to create friendship")?;
    Ok(())
}

impl FriendRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn are_friends(&self, a: &Uuid, b: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM friends WHERE user_id = ?1 AND friend_id = ?2",
            (a.to_string(), b.to_string()),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Make two users friends directly (used by seeding and tests)
    pub fn add(&self, a: &Uuid, b: &Uuid) -> Result<()> {
        let conn = self.pool.get()?;
        insert_friendship(&conn, a, b)
    }

    /// Remove a friendship in both directions. Returns false if they were not friends.
    pub fn remove(&self, a: &Uuid, b: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let removed = conn
            .execute(
                "DELETE FROM friends
                 WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                (a.to_string(), b.to_string()),
            )
            .context("Failed to remove friendship")?;
        Ok(removed > 0)
    }

    /// Friends of a user, alphabetical by username
    pub fn list(&self, user_id: &Uuid) -> Result<Vec<Friend>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.display_name, u.avatar_key, f.created_at
             FROM friends f
             JOIN users u ON u.id = f.friend_id
             WHERE f.user_id = ?1
             ORDER BY u.username ASC",
        )?;
        let friends = stmt
            .query_map([user_id.to_string()], |row| {
                Ok((map_summary(row, 0)?, timestamp_col(row, 4)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        friends
            .into_iter()
            .map(|(user, since)| {
                Ok(Friend {
                    streak_days: streak_as_of_today(&conn, &user.id)?,
                    user,
                    since,
                })
            })
            .collect()
    }

    pub fn count(&self, user_id: &Uuid) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM friends WHERE user_id = ?1",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, setup_db};

    #[test]
    fn test_friendship_is_bidirectional() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let repo = FriendRepository::new(db.pool.clone());

        repo.add(&alice, &bob).unwrap();
        assert!(repo.are_friends(&alice, &bob).unwrap());
        assert!(repo.are_friends(&bob, &alice).unwrap());
        assert_eq!(repo.count(&alice).unwrap(), 1);

        // Adding again is a no-op
        repo.add(&bob, &alice).unwrap();
        assert_eq!(repo.count(&bob).unwrap(), 1);
    }

    #[test]
    fn test_remove_friendship() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let repo = FriendRepository::new(db.pool.clone());

        repo.add(&alice, &bob).unwrap();
        assert!(repo.remove(&bob, &alice).unwrap());
        assert!(!repo.are_friends(&alice, &bob).unwrap());
        assert!(!repo.are_friends(&bob, &alice).unwrap());
        assert!(!repo.remove(&bob, &alice).unwrap());
    }

    #[test]
    fn test_list_friends_sorted() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let carol = create_user(&db, "carol");
        let bob = create_user(&db, "bob");
        let repo = FriendRepository::new(db.pool.clone());

        repo.add(&alice, &carol).unwrap();
        repo.add(&alice, &bob).unwrap();

        let names: Vec<_> = repo
            .list(&alice)
            .unwrap()
            .into_iter()
            .map(|f| f.user.username)
            .collect();
        assert_eq!(names, vec!["bob", "carol"]);
    }

    #[test]
    fn test_cannot_befriend_self() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = FriendRepository::new(db.pool.clone());
        assert!(repo.add(&alice, &alice).is_err());
    }
}
