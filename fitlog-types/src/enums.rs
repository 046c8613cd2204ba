use serde::{Deserialize, Serialize};

/// Who can see a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Friends,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Friends => "friends",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "friends" => Some(Visibility::Friends),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardPeriod {
    #[default]
    Week,
    Month,
    All,
}

impl LeaderboardPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardPeriod::Week => "week",
            LeaderboardPeriod::Month => "month",
            LeaderboardPeriod::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "week" => Some(LeaderboardPeriod::Week),
            "month" => Some(LeaderboardPeriod::Month),
            "all" => Some(LeaderboardPeriod::All),
            _ => None,
        }
    }

    /// Length of the rolling window in days, `None` for all time
    pub fn window_days(&self) -> Option<i64> {
        match self {
            LeaderboardPeriod::Week => Some(7),
            LeaderboardPeriod::Month => Some(30),
            LeaderboardPeriod::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardScope {
    #[default]
    Global,
    Friends,
}

impl LeaderboardScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardScope::Global => "global",
            LeaderboardScope::Friends => "friends",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "global" => Some(LeaderboardScope::Global),
            "friends" => Some(LeaderboardScope::Friends),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    FriendRequest,
    FriendAccept,
    Badge,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::FriendRequest => "friend_request",
            NotificationKind::FriendAccept => "friend_accept",
            NotificationKind::Badge => "badge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "friend_request" => Some(NotificationKind::FriendRequest),
            "friend_accept" => Some(NotificationKind::FriendAccept),
            "badge" => Some(NotificationKind::Badge),
            _ => None,
        }
    }
}

/// The measure a badge threshold is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRule {
    Streak,
    TotalMinutes,
    Checkins,
}

impl BadgeRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeRule::Streak => "streak",
            BadgeRule::TotalMinutes => "total_minutes",
            BadgeRule::Checkins => "checkins",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "streak" => Some(BadgeRule::Streak),
            "total_minutes" => Some(BadgeRule::TotalMinutes),
            "checkins" => Some(BadgeRule::Checkins),
            _ => None,
        }
    }
}

/// How the viewer relates to a profile they are looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    #[serde(rename = "self")]
    Self_,
    Friends,
    RequestSent,
    RequestReceived,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_parse_is_case_insensitive() {
        assert_eq!(Visibility::parse("Friends"), Some(Visibility::Friends));
        assert_eq!(Visibility::parse(" PRIVATE "), Some(Visibility::Private));
        assert_eq!(Visibility::parse("everyone"), None);
    }

    #[test]
    fn period_windows() {
        assert_eq!(LeaderboardPeriod::Week.window_days(), Some(7));
        assert_eq!(LeaderboardPeriod::Month.window_days(), Some(30));
        assert_eq!(LeaderboardPeriod::All.window_days(), None);
    }

    #[test]
    fn relationship_serializes_self_keyword() {
        let json = serde_json::to_string(&Relationship::Self_).unwrap();
        assert_eq!(json, "\"self\"");
        let json = serde_json::to_string(&Relationship::RequestSent).unwrap();
        assert_eq!(json, "\"request_sent\"");
    }

    #[test]
    fn notification_kind_round_trips_through_str() {
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::FriendRequest,
            NotificationKind::FriendAccept,
            NotificationKind::Badge,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
    }
}
