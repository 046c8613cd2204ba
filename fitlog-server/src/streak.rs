//! Streak arithmetic over the set of UTC days a user checked in.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

/// Consecutive check-in days ending today, or ending yesterday when nothing
/// has been logged today yet.
pub fn current_streak(days: &[NaiveDate], today: NaiveDate) -> i64 {
    let days: BTreeSet<NaiveDate> = days.iter().copied().collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

/// Longest run of consecutive check-in days ever
pub fn longest_streak(days: &[NaiveDate]) -> i64 {
    let days: BTreeSet<NaiveDate> = days.iter().copied().collect();

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(current_streak(&[], d("2025-03-10")), 0);
        assert_eq!(longest_streak(&[]), 0);
    }

    #[test]
    fn test_streak_including_today() {
        let days = [d("2025-03-10"), d("2025-03-09"), d("2025-03-08"), d("2025-03-05")];
        assert_eq!(current_streak(&days, d("2025-03-10")), 3);
    }

    #[test]
    fn test_nothing_yet_today_keeps_streak() {
        let days = [d("2025-03-09"), d("2025-03-08")];
        assert_eq!(current_streak(&days, d("2025-03-10")), 2);
    }

    #[test]
    fn test_gap_breaks_streak() {
        let days = [d("2025-03-08"), d("2025-03-07")];
        assert_eq!(current_streak(&days, d("2025-03-10")), 0);
        assert_eq!(longest_streak(&days), 2);
    }

    #[test]
    fn test_duplicates_and_order_do_not_matter() {
        let days = [d("2025-03-09"), d("2025-03-10"), d("2025-03-10"), d("2025-03-09")];
        assert_eq!(current_streak(&days, d("2025-03-10")), 2);
        assert_eq!(longest_streak(&days), 2);
    }

    #[test]
    fn test_longest_across_month_boundary() {
        let days = [d("2025-01-30"), d("2025-01-31"), d("2025-02-01"), d("2025-02-03")];
        assert_eq!(longest_streak(&days), 3);
    }

    proptest! {
        #[test]
        fn prop_current_never_exceeds_longest(offsets in proptest::collection::vec(0i64..60, 0..40)) {
            let today = d("2025-06-01");
            let days: Vec<_> = offsets.iter().map(|o| today - Duration::days(*o)).collect();
            prop_assert!(current_streak(&days, today) <= longest_streak(&days));
        }

        #[test]
        fn prop_unbroken_run_counts_every_day(len in 1i64..100, skip_today in any::<bool>()) {
            let today = d("2025-06-01");
            let start = if skip_today { 1 } else { 0 };
            let days: Vec<_> = (start..start + len).map(|o| today - Duration::days(o)).collect();
            prop_assert_eq!(current_streak(&days, today), len);
            prop_assert_eq!(longest_streak(&days), len);
        }
    }
}
