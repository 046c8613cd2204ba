use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use fitlog_types::Comment;

use crate::db::{format_timestamp, timestamp_col, uuid_col, DbPool};

pub struct CommentRepository {
    pool: DbPool,
}

/// Who may moderate a comment: its author and the author of the post it is on
pub struct CommentOwnership {
    pub comment_author: Uuid,
    pub post_author: Uuid,
}

fn map_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: uuid_col(row, 0)?,
        post_id: uuid_col(row, 1)?,
        user_id: uuid_col(row, 2)?,
        username: row.get(3)?,
        display_name: row.get(4)?,
        content: row.get(5)?,
        created_at: timestamp_col(row, 6)?,
    })
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, post_id: &Uuid, user_id: &Uuid, content: &str) -> Result<Comment> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                id.to_string(),
                post_id.to_string(),
                user_id.to_string(),
                content,
                format_timestamp(Utc::now()),
            ),
        )
        .context("Failed to create comment")?;

        let comment = conn.query_row(
            "SELECT c.id, c.post_id, c.user_id, u.username, u.display_name, c.content, c.created_at
             FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.id = ?1",
            [id.to_string()],
            map_comment,
        )?;
        Ok(comment)
    }

    /// Comments on a post, oldest first
    pub fn list_for_post(&self, post_id: &Uuid) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.user_id, u.username, u.display_name, c.content, c.created_at
             FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.rowid ASC",
        )?;
        let comments = stmt
            .query_map([post_id.to_string()], map_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub fn ownership(&self, comment_id: &Uuid) -> Result<Option<CommentOwnership>> {
        let conn = self.pool.get()?;
        let ownership = conn
            .query_row(
                "SELECT c.user_id, p.user_id
                 FROM comments c JOIN posts p ON p.id = c.post_id
                 WHERE c.id = ?1",
                [comment_id.to_string()],
                |row| {
                    Ok(CommentOwnership {
                        comment_author: uuid_col(row, 0)?,
                        post_author: uuid_col(row, 1)?,
                    })
                },
            )
            .optional()?;
        Ok(ownership)
    }

    pub fn delete(&self, comment_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let deleted = conn
            .execute("DELETE FROM comments WHERE id = ?1", [comment_id.to_string()])
            .context("Failed to delete comment")?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, insert_post_at, setup_db};
    use fitlog_types::Visibility;

    #[test]
    fn test_comments_are_listed_oldest_first() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let post = insert_post_at(&db, &alice, 30, Utc::now(), Visibility::Public);
        let repo = CommentRepository::new(db.pool.clone());

        let first = repo.create(&post, &bob, "Nice pace!").unwrap();
        let second = repo.create(&post, &alice, "Thanks").unwrap();
        assert_eq!(first.username, "bob");

        let comments = repo.list_for_post(&post).unwrap();
        let ids: Vec<_> = comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_ownership_and_delete() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let post = insert_post_at(&db, &alice, 30, Utc::now(), Visibility::Public);
        let repo = CommentRepository::new(db.pool.clone());

        let comment = repo.create(&post, &bob, "Keep going").unwrap();
        let ownership = repo.ownership(&comment.id).unwrap().unwrap();
        assert_eq!(ownership.comment_author, bob);
        assert_eq!(ownership.post_author, alice);

        assert!(repo.delete(&comment.id).unwrap());
        assert!(repo.ownership(&comment.id).unwrap().is_none());
        assert!(repo.list_for_post(&post).unwrap().is_empty());
    }
}
