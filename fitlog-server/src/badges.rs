use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fitlog_types::{Badge, BadgeRule, BadgeStatus};

/// A user's totals as far as badge rules are concerned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub streak_days: i64,
    pub total_minutes: i64,
    pub checkins: i64,
}

impl Progress {
    fn measure(&self, rule: BadgeRule) -> i64 {
        match rule {
            BadgeRule::Streak => self.streak_days,
            BadgeRule::TotalMinutes => self.total_minutes,
            BadgeRule::Checkins => self.checkins,
        }
    }
}

pub fn qualifies(badge: &Badge, progress: &Progress) -> bool {
    progress.measure(badge.rule) >= badge.threshold
}

/// Badges the user qualifies for but has not been awarded yet
pub fn newly_earned<'a>(
    catalog: &'a [Badge],
    progress: &Progress,
    awarded: &HashMap<String, DateTime<Utc>>,
) -> Vec<&'a Badge> {
    catalog
        .iter()
        .filter(|badge| !awarded.contains_key(&badge.id) && qualifies(badge, progress))
        .collect()
}

/// Pair every catalog entry with whether and when it was awarded
pub fn statuses(catalog: Vec<Badge>, awarded: &HashMap<String, DateTime<Utc>>) -> Vec<BadgeStatus> {
    catalog
        .into_iter()
        .map(|badge| {
            let awarded_at = awarded.get(&badge.id).copied();
            BadgeStatus {
                achieved: awarded_at.is_some(),
                awarded_at,
                badge,
            }
        })
        .collect()
}
