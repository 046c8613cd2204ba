use std::collections::HashMap;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use fitlog_types::{DayStat, Stats};

use crate::db::repositories::{DailyTotal, PostRepository};
use crate::db::Database;
use crate::streak::{current_streak, longest_streak};

pub const DEFAULT_DAYS: i64 = 7;
pub const MAX_DAYS: i64 = 90;

/// One bucket per day for the `days` days ending on `today`, oldest first
pub fn fill_days(totals: &[DailyTotal], days: i64, today: NaiveDate) -> Vec<DayStat> {
    let by_date: HashMap<NaiveDate, &DailyTotal> = totals.iter().map(|t| (t.date, t)).collect();
    (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let (minutes, checkins) = by_date
                .get(&date)
                .map(|t| (t.minutes, t.checkins))
                .unwrap_or((0, 0));
            DayStat {
                date,
                minutes,
                checkins,
            }
        })
        .collect()
}

/// Activity summary for a user over the last `days` days
pub fn compute(db: &Database, user_id: &Uuid, days: i64, daily_goal_minutes: i64, today: NaiveDate) -> Result<Stats> {
    let post_repo = PostRepository::new(db.pool.clone());

    let since = today - Duration::days(days - 1);
    let buckets = fill_days(&post_repo.daily_totals(user_id, since)?, days, today);
    let (total_checkins, total_minutes) = post_repo.totals(user_id)?;
    let checkin_days = post_repo.checkin_days(user_id)?;
    let today_minutes = buckets.last().map(|d| d.minutes).unwrap_or(0);

    Ok(Stats {
        days: buckets,
        total_minutes,
        total_checkins,
        current_streak: current_streak(&checkin_days, today),
        longest_streak: longest_streak(&checkin_days),
        today_minutes,
        daily_goal_minutes,
        today_goal_met: today_minutes >= daily_goal_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, insert_post_at, setup_db};
    use chrono::{TimeZone, Utc};
    use fitlog_types::Visibility;

    #[test]
    fn test_fill_days_zero_fills() {
        let today: NaiveDate = "2025-03-10".parse().unwrap();
        let totals = vec![DailyTotal {
            date: "2025-03-08".parse().unwrap(),
            minutes: 40,
            checkins: 2,
        }];
        let days = fill_days(&totals, 3, today);
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date.to_string(), "2025-03-08");
        assert_eq!(days[0].minutes, 40);
        assert_eq!(days[1].minutes, 0);
        assert_eq!(days[2].date, today);
    }

    #[test]
    fn test_compute_stats() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let today = Utc::now().date_naive();
        let noon = |d: NaiveDate| Utc.from_utc_datetime(&d.and_hms_opt(12, 0, 0).unwrap());

        insert_post_at(&db, &alice, 20, noon(today), Visibility::Public);
        insert_post_at(&db, &alice, 15, noon(today), Visibility::Private);
        insert_post_at(&db, &alice, 30, noon(today - Duration::days(1)), Visibility::Public);
        insert_post_at(&db, &alice, 50, noon(today - Duration::days(20)), Visibility::Public);

        let stats = compute(&db, &alice, 7, 30, today).unwrap();
        assert_eq!(stats.days.len(), 7);
        assert_eq!(stats.today_minutes, 35);
        assert!(stats.today_goal_met);
        assert_eq!(stats.total_minutes, 115);
        assert_eq!(stats.total_checkins, 4);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.days.iter().map(|d| d.minutes).sum::<i64>(), 65);

        let strict = compute(&db, &alice, 1, 60, today).unwrap();
        assert_eq!(strict.days.len(), 1);
        assert!(!strict.today_goal_met);
    }
}
