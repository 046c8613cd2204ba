use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{BadgeRule, NotificationKind, Relationship, Visibility};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

mod optional_datetime_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_some(&d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Public view of an account. The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub streak_days: i64,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// A logged workout, as shown in the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub sport: String,
    pub minutes: i64,
    pub message: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub visibility: Visibility,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
    /// Whether the requesting user has liked this post
    #[serde(default)]
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// Compact user reference used in lists (likes, friends, search)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friend {
    pub user: UserSummary,
    pub streak_days: i64,
    #[serde(with = "datetime_format")]
    pub since: DateTime<Utc>,
}

/// A friend request that has not been answered yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInvite {
    pub id: Uuid,
    pub from_user: UserSummary,
    pub to_user: UserSummary,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequests {
    pub incoming: Vec<PendingInvite>,
    pub outgoing: Vec<PendingInvite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    #[serde(default)]
    pub actor: Option<UserSummary>,
    #[serde(default)]
    pub post_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub rule: BadgeRule,
    pub threshold: i64,
}

/// A catalog badge together with whether a given user holds it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeStatus {
    #[serde(flatten)]
    pub badge: Badge,
    pub achieved: bool,
    #[serde(default, with = "optional_datetime_format")]
    pub awarded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user: UserSummary,
    pub points: i64,
    pub checkins: i64,
    pub streak_days: i64,
    #[serde(default)]
    pub is_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayStat {
    pub date: NaiveDate,
    pub minutes: i64,
    pub checkins: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub days: Vec<DayStat>,
    pub total_minutes: i64,
    pub total_checkins: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub today_minutes: i64,
    pub daily_goal_minutes: i64,
    pub today_goal_met: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user: User,
    pub total_checkins: i64,
    pub total_minutes: i64,
    pub badge_count: i64,
    pub friend_count: i64,
    pub relationship: Relationship,
}

// Request/Response types for API

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub session_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub message: Option<String>,
    /// Kept as text so an unknown level is reported as a validation error
    #[serde(default)]
    pub visibility: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub post: Post,
    pub streak_days: i64,
    pub new_badges: Vec<Badge>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequestPayload {
    pub username: String,
}

/// Result of sending a friend request: either a new pending invite, or an
/// immediate friendship when the target had already invited the sender.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FriendRequestOutcome {
    Pending { invite: PendingInvite },
    Accepted { friend: UserSummary },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
