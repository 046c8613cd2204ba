use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use fitlog_types::{Post, Visibility};

use crate::db::{format_timestamp, media_url, timestamp_col, uuid_col, DbPool};
use crate::streak::current_streak;

/// Columns and joins shared by every post query. `?1` is the viewer id
/// (empty string for anonymous viewers).
const POST_SELECT: &str = "
    SELECT p.id, p.user_id, u.username, u.display_name, u.avatar_key,
           p.sport, p.minutes, p.message, p.image_key, p.visibility, p.created_at,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
           EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1) AS liked_by_me
    FROM posts p
    JOIN users u ON u.id = p.user_id";

/// Rows the viewer `?1` is allowed to see
const VISIBLE_TO_VIEWER: &str = "
    (p.visibility = 'public'
     OR p.user_id = ?1
     OR (p.visibility = 'friends'
         AND EXISTS (SELECT 1 FROM friends f WHERE f.user_id = ?1 AND f.friend_id = p.user_id)))";

/// Fields of a check-in to insert
pub struct NewPost<'a> {
    pub user_id: Uuid,
    pub sport: &'a str,
    pub minutes: i64,
    pub message: Option<&'a str>,
    pub image: Option<(&'a str, &'a str)>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// Ownership and media details of a post, independent of who is asking
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub user_id: Uuid,
    pub image_key: Option<String>,
}

/// Minutes and check-ins logged on one UTC day
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub minutes: i64,
    pub checkins: i64,
}

fn viewer_param(viewer: Option<&Uuid>) -> String {
    viewer.map(|v| v.to_string()).unwrap_or_default()
}

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let avatar_key: Option<String> = row.get(4)?;
    let image_key: Option<String> = row.get(8)?;
    let visibility: String = row.get(9)?;
    Ok(Post {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        avatar_url: avatar_key.as_deref().map(media_url),
        sport: row.get(5)?,
        minutes: row.get(6)?,
        message: row.get(7)?,
        image_url: image_key.as_deref().map(media_url),
        // An unknown value is treated as the most restrictive setting
        visibility: Visibility::parse(&visibility).unwrap_or(Visibility::Private),
        created_at: timestamp_col(row, 10)?,
        like_count: row.get(11)?,
        comment_count: row.get(12)?,
        liked_by_me: row.get(13)?,
    })
}

fn parse_day(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn query_checkin_days(conn: &Connection, user_id: &Uuid) -> Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT substr(created_at, 1, 10) AS day
         FROM posts WHERE user_id = ?1
         ORDER BY day DESC",
    )?;
    let days = stmt
        .query_map([user_id.to_string()], |row| {
            let day: String = row.get(0)?;
            parse_day(0, &day)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(days)
}

/// Streak as of today (UTC), derived from the user's check-ins.
/// Never stored: it drops to zero on its own once a day is missed.
pub(crate) fn streak_as_of_today(conn: &Connection, user_id: &Uuid) -> Result<i64> {
    Ok(current_streak(
        &query_checkin_days(conn, user_id)?,
        Utc::now().date_naive(),
    ))
}

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a check-in and return its id
    pub fn create(&self, post: &NewPost<'_>) -> Result<Uuid> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        let (image_key, image_mime) = post.image.unzip();
        conn.execute(
            "INSERT INTO posts (id, user_id, sport, minutes, message, image_key, image_mime, visibility, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                id.to_string(),
                post.user_id.to_string(),
                post.sport,
                post.minutes,
                post.message,
                image_key,
                image_mime,
                post.visibility.as_str(),
                format_timestamp(post.created_at),
            ],
        )
        .context("Failed to create post")?;
        Ok(id)
    }

    /// Fetch a post if the viewer may see it
    pub fn get_visible(&self, post_id: &Uuid, viewer: Option<&Uuid>) -> Result<Option<Post>> {
        let conn = self.pool.get()?;
        let query = format!("{} WHERE p.id = ?2 AND {}", POST_SELECT, VISIBLE_TO_VIEWER);
        let post = conn
            .query_row(
                &query,
                rusqlite::params![viewer_param(viewer), post_id.to_string()],
                map_post,
            )
            .optional()?;
        Ok(post)
    }

    /// Ownership details regardless of visibility
    pub fn get_record(&self, post_id: &Uuid) -> Result<Option<PostRecord>> {
        let conn = self.pool.get()?;
        let record = conn
            .query_row(
                "SELECT user_id, image_key FROM posts WHERE id = ?1",
                [post_id.to_string()],
                |row| {
                    Ok(PostRecord {
                        user_id: uuid_col(row, 0)?,
                        image_key: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Newest-first feed of posts the viewer may see, optionally limited to one author
    pub fn feed(
        &self,
        viewer: Option<&Uuid>,
        author: Option<&Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        let query = format!(
            "{} WHERE {} AND (?2 IS NULL OR p.user_id = ?2)
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?3 OFFSET ?4",
            POST_SELECT, VISIBLE_TO_VIEWER
        );
        let mut stmt = conn.prepare(&query)?;
        let posts = stmt
            .query_map(
                rusqlite::params![
                    viewer_param(viewer),
                    author.map(|a| a.to_string()),
                    limit,
                    offset
                ],
                map_post,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    pub fn update(&self, post_id: &Uuid, message: Option<Option<&str>>, visibility: Option<Visibility>) -> Result<()> {
        let conn = self.pool.get()?;
        if let Some(message) = message {
            conn.execute(
                "UPDATE posts SET message = ?1 WHERE id = ?2",
                (message, post_id.to_string()),
            )
            .context("Failed to update post message")?;
        }
        if let Some(visibility) = visibility {
            conn.execute(
                "UPDATE posts SET visibility = ?1 WHERE id = ?2",
                (visibility.as_str(), post_id.to_string()),
            )
            .context("Failed to update post visibility")?;
        }
        Ok(())
    }

    /// Delete a post together with its likes, comments and notifications
    pub fn delete(&self, post_id: &Uuid) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let id = post_id.to_string();
        tx.execute("DELETE FROM notifications WHERE post_id = ?1", [&id])?;
        tx.execute("DELETE FROM likes WHERE post_id = ?1", [&id])?;
        tx.execute("DELETE FROM comments WHERE post_id = ?1", [&id])?;
        let deleted = tx
            .execute("DELETE FROM posts WHERE id = ?1", [&id])
            .context("Failed to delete post")?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Distinct UTC days with at least one check-in, most recent first
    pub fn checkin_days(&self, user_id: &Uuid) -> Result<Vec<NaiveDate>> {
        let conn = self.pool.get()?;
        query_checkin_days(&conn, user_id)
    }

    /// (check-in count, total minutes) for a user
    pub fn totals(&self, user_id: &Uuid) -> Result<(i64, i64)> {
        let conn = self.pool.get()?;
        let totals = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(minutes), 0) FROM posts WHERE user_id = ?1",
            [user_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(totals)
    }

    /// Per-day totals from `since` (inclusive) onward; days without check-ins are absent
    pub fn daily_totals(&self, user_id: &Uuid, since: NaiveDate) -> Result<Vec<DailyTotal>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT substr(created_at, 1, 10) AS day, SUM(minutes), COUNT(*)
             FROM posts
             WHERE user_id = ?1 AND created_at >= ?2
             GROUP BY day
             ORDER BY day",
        )?;
        let totals = stmt
            .query_map(
                (user_id.to_string(), since.format("%Y-%m-%d").to_string()),
                |row| {
                    let day: String = row.get(0)?;
                    Ok(DailyTotal {
                        date: parse_day(0, &day)?,
                        minutes: row.get(1)?,
                        checkins: row.get(2)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, insert_post_at, make_friends, setup_db};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_create_and_get_visible() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = PostRepository::new(db.pool.clone());

        let id = repo
            .create(&NewPost {
                user_id: alice,
                sport: "跑步",
                minutes: 30,
                message: Some("morning run"),
                image: Some(("abc.png", "image/png")),
                visibility: Visibility::Public,
                created_at: Utc::now(),
            })
            .unwrap();

        let post = repo.get_visible(&id, None).unwrap().unwrap();
        assert_eq!(post.sport, "跑步");
        assert_eq!(post.minutes, 30);
        assert_eq!(post.username, "alice");
        assert_eq!(post.image_url.as_deref(), Some("/media/abc.png"));
        assert_eq!(post.like_count, 0);
        assert!(!post.liked_by_me);
    }

    #[test]
    fn test_visibility_rules() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let carol = create_user(&db, "carol");
        make_friends(&db, &alice, &bob);
        let repo = PostRepository::new(db.pool.clone());

        let now = Utc::now();
        let public = insert_post_at(&db, &alice, 10, now, Visibility::Public);
        let friends = insert_post_at(&db, &alice, 20, now, Visibility::Friends);
        let private = insert_post_at(&db, &alice, 30, now, Visibility::Private);

        // Author sees everything
        assert!(repo.get_visible(&private, Some(&alice)).unwrap().is_some());

        // Friend sees public and friends-only
        assert!(repo.get_visible(&public, Some(&bob)).unwrap().is_some());
        assert!(repo.get_visible(&friends, Some(&bob)).unwrap().is_some());
        assert!(repo.get_visible(&private, Some(&bob)).unwrap().is_none());

        // Stranger and anonymous see public only
        assert!(repo.get_visible(&friends, Some(&carol)).unwrap().is_none());
        assert!(repo.get_visible(&friends, None).unwrap().is_none());
        assert_eq!(repo.feed(None, None, 10, 0).unwrap().len(), 1);
        assert_eq!(repo.feed(Some(&bob), None, 10, 0).unwrap().len(), 2);
        assert_eq!(repo.feed(Some(&alice), None, 10, 0).unwrap().len(), 3);
    }

    #[test]
    fn test_feed_is_newest_first_and_paginates() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let repo = PostRepository::new(db.pool.clone());

        let base = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let oldest = insert_post_at(&db, &alice, 10, base, Visibility::Public);
        let middle = insert_post_at(&db, &bob, 20, base + Duration::hours(1), Visibility::Public);
        let newest = insert_post_at(&db, &alice, 30, base + Duration::hours(2), Visibility::Public);

        let page: Vec<_> = repo.feed(None, None, 2, 0).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(page, vec![newest, middle]);
        let page: Vec<_> = repo.feed(None, None, 2, 2).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(page, vec![oldest]);

        let alice_only = repo.feed(None, Some(&alice), 10, 0).unwrap();
        assert_eq!(alice_only.len(), 2);
        assert!(alice_only.iter().all(|p| p.user_id == alice));
    }

    #[test]
    fn test_checkin_days_and_daily_totals() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = PostRepository::new(db.pool.clone());

        let day1 = Utc.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap();
        insert_post_at(&db, &alice, 10, day1, Visibility::Public);
        insert_post_at(&db, &alice, 15, day1 + Duration::hours(10), Visibility::Private);
        insert_post_at(&db, &alice, 40, day1 + Duration::days(2), Visibility::Public);

        let days = repo.checkin_days(&alice).unwrap();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            ]
        );

        let totals = repo
            .daily_totals(&alice, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
            .unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].minutes, 25);
        assert_eq!(totals[0].checkins, 2);
        assert_eq!(totals[1].minutes, 40);

        assert_eq!(repo.totals(&alice).unwrap(), (3, 65));
    }

    #[test]
    fn test_streak_lapses_without_recent_checkins() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let now = Utc::now();
        for day in 1..=3 {
            insert_post_at(&db, &alice, 20, now - Duration::days(day), Visibility::Public);
            insert_post_at(&db, &bob, 20, now - Duration::days(day + 5), Visibility::Public);
        }

        let conn = db.connection().unwrap();
        // Nothing yet today still counts the run ending yesterday
        assert_eq!(streak_as_of_today(&conn, &alice).unwrap(), 3);
        assert_eq!(streak_as_of_today(&conn, &bob).unwrap(), 0);
    }

    #[test]
    fn test_update_and_delete() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = PostRepository::new(db.pool.clone());
        let id = insert_post_at(&db, &alice, 10, Utc::now(), Visibility::Public);

        repo.update(&id, Some(Some("edited")), Some(Visibility::Friends)).unwrap();
        let post = repo.get_visible(&id, Some(&alice)).unwrap().unwrap();
        assert_eq!(post.message.as_deref(), Some("edited"));
        assert_eq!(post.visibility, Visibility::Friends);
        let record = repo.get_record(&id).unwrap().unwrap();
        assert_eq!(record.user_id, alice);

        assert!(repo.delete(&id).unwrap());
        assert!(repo.get_record(&id).unwrap().is_none());
        assert!(!repo.delete(&id).unwrap());
    }
}
