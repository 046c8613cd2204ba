use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use fitlog_types::UserSummary;

use super::user_repository::map_summary;
use crate::db::{format_timestamp, DbPool};

pub struct LikeRepository {
    pool: DbPool,
}

impl LikeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Like the post if not yet liked, otherwise remove the like.
    /// Returns whether the post is liked afterwards and the new like count.
    pub fn toggle(&self, user_id: &Uuid, post_id: &Uuid) -> Result<(bool, i64)> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let removed = tx
            .execute(
                "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
                (user_id.to_string(), post_id.to_string()),
            )
            .context("Failed to remove like")?;

        let liked = if removed == 0 {
            tx.execute(
                "INSERT INTO likes (user_id, post_id, created_at) VALUES (?1, ?2, ?3)",
                (user_id.to_string(), post_id.to_string(), format_timestamp(Utc::now())),
            )
            .context("Failed to add like")?;
            true
        } else {
            false
        };

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            [post_id.to_string()],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok((liked, count))
    }

    /// Users who liked a post, most recent first
    pub fn likers(&self, post_id: &Uuid) -> Result<Vec<UserSummary>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.display_name, u.avatar_key
             FROM likes l
             JOIN users u ON u.id = l.user_id
             WHERE l.post_id = ?1
             ORDER BY l.created_at DESC, u.username ASC",
        )?;
        let users = stmt
            .query_map([post_id.to_string()], |row| map_summary(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, insert_post_at, setup_db};
    use fitlog_types::Visibility;

    #[test]
    fn test_toggle_like() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let post = insert_post_at(&db, &alice, 30, Utc::now(), Visibility::Public);
        let repo = LikeRepository::new(db.pool.clone());

        assert_eq!(repo.toggle(&bob, &post).unwrap(), (true, 1));
        assert_eq!(repo.toggle(&alice, &post).unwrap(), (true, 2));
        assert_eq!(repo.toggle(&bob, &post).unwrap(), (false, 1));

        let likers = repo.likers(&post).unwrap();
        assert_eq!(likers.len(), 1);
        assert_eq!(likers[0].username, "alice");
    }

    #[test]
    fn test_like_on_missing_post_fails() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = LikeRepository::new(db.pool.clone());
        assert!(repo.toggle(&alice, &Uuid::new_v4()).is_err());
    }
}
