use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use fitlog_types::LeaderboardEntry;

use super::post_repository::streak_as_of_today;
use super::user_repository::map_summary;
use crate::db::{format_timestamp, DbPool};

/// Minutes per user inside an optional time window.
/// `?1` window start (NULL for all time), `?2` circle owner (NULL for everyone).
const STANDINGS_SQL: &str = "
    SELECT u.id, u.username, u.display_name, u.avatar_key,
           COALESCE(SUM(p.minutes), 0) AS points,
           COUNT(p.id) AS checkins
    FROM users u
    LEFT JOIN posts p ON p.user_id = u.id AND (?1 IS NULL OR p.created_at >= ?1)
    WHERE ?2 IS NULL
       OR u.id = ?2
       OR u.id IN (SELECT friend_id FROM friends WHERE user_id = ?2)
    GROUP BY u.id
    HAVING ?2 IS NOT NULL OR points > 0
    ORDER BY points DESC, checkins DESC, u.username ASC
    LIMIT ?3";

pub struct LeaderboardRepository {
    pool: DbPool,
}

impl LeaderboardRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ranked standings. With `circle_of` set only that user and their friends
    /// are ranked (zero-point members included); otherwise every user with
    /// points inside the window.
    pub fn standings(
        &self,
        since: Option<DateTime<Utc>>,
        circle_of: Option<&Uuid>,
        viewer: Option<&Uuid>,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(STANDINGS_SQL)?;
        let rows = stmt
            .query_map(
                (
                    since.map(format_timestamp),
                    circle_of.map(|u| u.to_string()),
                    limit,
                ),
                |row| {
                    Ok((
                        map_summary(row, 0)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .enumerate()
            .map(|(idx, (user, points, checkins))| {
                Ok(LeaderboardEntry {
                    rank: idx + 1,
                    is_me: viewer == Some(&user.id),
                    streak_days: streak_as_of_today(&conn, &user.id)?,
                    user,
                    points,
                    checkins,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, insert_post_at, make_friends, setup_db};
    use chrono::Duration;
    use fitlog_types::Visibility;

    #[test]
    fn test_window_only_counts_recent_minutes() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let now = Utc::now();
        insert_post_at(&db, &alice, 30, now - Duration::days(1), Visibility::Public);
        insert_post_at(&db, &alice, 500, now - Duration::days(20), Visibility::Private);
        insert_post_at(&db, &bob, 45, now - Duration::hours(2), Visibility::Friends);
        let repo = LeaderboardRepository::new(db.pool.clone());

        let week = repo
            .standings(Some(now - Duration::days(7)), None, Some(&alice), 50)
            .unwrap();
        assert_eq!(week.len(), 2);
        assert_eq!(week[0].user.username, "bob");
        assert_eq!(week[0].points, 45);
        assert_eq!(week[0].rank, 1);
        assert!(!week[0].is_me);
        assert_eq!(week[1].points, 30);
        assert_eq!(week[1].rank, 2);
        assert!(week[1].is_me);

        let all = repo.standings(None, None, None, 50).unwrap();
        assert_eq!(all[0].user.username, "alice");
        assert_eq!(all[0].points, 530);
        assert_eq!(all[0].checkins, 2);
    }

    #[test]
    fn test_global_omits_users_without_points() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        create_user(&db, "idle");
        insert_post_at(&db, &alice, 20, Utc::now(), Visibility::Public);
        let repo = LeaderboardRepository::new(db.pool.clone());

        let entries = repo.standings(None, None, None, 50).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user.username, "alice");
    }

    #[test]
    fn test_friends_scope_and_tie_breaks() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let carol = create_user(&db, "carol");
        let dave = create_user(&db, "dave");
        let stranger = create_user(&db, "stranger");
        make_friends(&db, &alice, &bob);
        make_friends(&db, &alice, &carol);
        make_friends(&db, &alice, &dave);

        let now = Utc::now();
        // bob and carol tie on points; carol has more check-ins
        insert_post_at(&db, &bob, 60, now, Visibility::Public);
        insert_post_at(&db, &carol, 30, now, Visibility::Public);
        insert_post_at(&db, &carol, 30, now, Visibility::Public);
        insert_post_at(&db, &stranger, 999, now, Visibility::Public);
        let repo = LeaderboardRepository::new(db.pool.clone());

        let entries = repo.standings(None, Some(&alice), Some(&alice), 50).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.user.username.as_str()).collect();
        assert_eq!(names, vec!["carol", "bob", "alice", "dave"]);
        let ranks: Vec<_> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert!(entries[2].is_me);
    }

    #[test]
    fn test_limit() {
        let db = setup_db();
        for name in ["amy", "ben", "cat"] {
            let id = create_user(&db, name);
            insert_post_at(&db, &id, 10, Utc::now(), Visibility::Public);
        }
        let repo = LeaderboardRepository::new(db.pool.clone());
        assert_eq!(repo.standings(None, None, None, 2).unwrap().len(), 2);
    }
}
