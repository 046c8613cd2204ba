use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use fitlog_types::{Badge, BadgeRule};

use crate::db::{format_timestamp, timestamp_col, DbPool};

pub struct BadgeRepository {
    pool: DbPool,
}

fn map_badge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Badge> {
    let rule: String = row.get(3)?;
    let rule = BadgeRule::parse(&rule).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown badge rule: {}", rule).into(),
        )
    })?;
    Ok(Badge {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        rule,
        threshold: row.get(4)?,
    })
}

impl BadgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All badges, grouped by rule and ordered by threshold
    pub fn catalog(&self) -> Result<Vec<Badge>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, rule, threshold FROM badges ORDER BY rule, threshold, id",
        )?;
        let badges = stmt
            .query_map([], map_badge)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(badges)
    }

    /// Badges the user holds, keyed by badge id
    pub fn awarded(&self, user_id: &Uuid) -> Result<HashMap<String, DateTime<Utc>>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT badge_id, awarded_at FROM user_badges WHERE user_id = ?1")?;
        let awarded = stmt
            .query_map([user_id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, timestamp_col(row, 1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(awarded)
    }

    /// Award a badge. Returns true only the first time the user earns it.
    pub fn award(&self, user_id: &Uuid, badge_id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let inserted = conn
            .execute(
                "INSERT INTO user_badges (user_id, badge_id, awarded_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, badge_id) DO NOTHING",
                (user_id.to_string(), badge_id, format_timestamp(Utc::now())),
            )
            .context("Failed to award badge")?;
        Ok(inserted > 0)
    }

    pub fn count(&self, user_id: &Uuid) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM user_badges WHERE user_id = ?1",
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
    fn test_catalog_is_seeded() {
        let db = setup_db();
        let repo = BadgeRepository::new(db.pool.clone());
        let catalog = repo.catalog().unwrap();
        assert_eq!(catalog.len(), 5);
        let streak_7 = catalog.iter().find(|b| b.id == "streak_7").unwrap();
        assert_eq!(streak_7.rule, BadgeRule::Streak);
        assert_eq!(streak_7.threshold, 7);
    }

    #[test]
    fn test_award_only_once() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = BadgeRepository::new(db.pool.clone());

        assert!(repo.award(&alice, "first_checkin").unwrap());
        assert!(!repo.award(&alice, "first_checkin").unwrap());
        assert_eq!(repo.count(&alice).unwrap(), 1);
        assert!(repo.awarded(&alice).unwrap().contains_key("first_checkin"));
    }

    #[test]
    fn test_award_unknown_badge_fails() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = BadgeRepository::new(db.pool.clone());
        assert!(repo.award(&alice, "no_such_badge").is_err());
    }
}
