use askama::Template;

use fitlog_types::{BadgeStatus, DayStat, LeaderboardEntry, Post, Stats};

/// A check-in flattened for display
pub struct PostView {
    pub author: String,
    pub username: String,
    pub sport: String,
    pub minutes: i64,
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub visibility: &'static str,
    pub created: String,
    pub like_count: i64,
    pub comment_count: i64,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            author: post.display_name,
            username: post.username,
            sport: post.sport,
            minutes: post.minutes,
            message: post.message,
            image_url: post.image_url,
            visibility: post.visibility.as_str(),
            created: post.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            like_count: post.like_count,
            comment_count: post.comment_count,
        }
    }
}

/// One bar of the stats chart; `percent` is relative to the busiest day
pub struct DayView {
    pub label: String,
    pub minutes: i64,
    pub checkins: i64,
    pub percent: i64,
}

pub fn day_views(days: &[DayStat]) -> Vec<DayView> {
    let max = days.iter().map(|d| d.minutes).max().unwrap_or(0);
    days.iter()
        .map(|d| DayView {
            label: d.date.format("%a %m-%d").to_string(),
            minutes: d.minutes,
            checkins: d.checkins,
            percent: if max > 0 { d.minutes * 100 / max } else { 0 },
        })
        .collect()
}

pub struct RankView {
    pub rank: usize,
    pub name: String,
    pub points: i64,
    pub checkins: i64,
    pub streak_days: i64,
    pub is_me: bool,
}

impl From<LeaderboardEntry> for RankView {
    fn from(entry: LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            name: entry.user.display_name,
            points: entry.points,
            checkins: entry.checkins,
            streak_days: entry.streak_days,
            is_me: entry.is_me,
        }
    }
}

pub struct BadgeView {
    pub title: String,
    pub description: String,
    pub achieved: bool,
}

impl From<BadgeStatus> for BadgeView {
    fn from(status: BadgeStatus) -> Self {
        Self {
            title: status.badge.title,
            description: status.badge.description,
            achieved: status.achieved,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub nav_user: String,
    pub streak_days: i64,
    pub today_minutes: i64,
    pub daily_goal_minutes: i64,
    pub goal_met: bool,
    pub posts: Vec<PostView>,
}

impl IndexTemplate {
    pub fn new(nav_user: String, stats: &Stats, posts: Vec<Post>) -> Self {
        Self {
            nav_user,
            streak_days: stats.current_streak,
            today_minutes: stats.today_minutes,
            daily_goal_minutes: stats.daily_goal_minutes,
            goal_met: stats.today_goal_met,
            posts: posts.into_iter().map(PostView::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub nav_user: String,
    pub error: Option<String>,
    pub username: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub nav_user: String,
    pub error: Option<String>,
    pub username: String,
    pub display_name: String,
}

#[derive(Template)]
#[template(path = "checkin.html")]
pub struct CheckinTemplate {
    pub nav_user: String,
    pub error: Option<String>,
    pub confirmation: Option<String>,
    pub new_badges: Vec<String>,
    pub streak_days: i64,
}

#[derive(Template)]
#[template(path = "leaderboard.html")]
pub struct LeaderboardTemplate {
    pub nav_user: String,
    pub entries: Vec<RankView>,
    pub badges: Vec<BadgeView>,
}

#[derive(Template)]
#[template(path = "stats.html")]
pub struct StatsTemplate {
    pub nav_user: String,
    pub days: Vec<DayView>,
    pub total_minutes: i64,
    pub total_checkins: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
}
