mod badge_repository;
mod comment_repository;
mod friend_repository;
mod invite_repository;
mod leaderboard_repository;
mod like_repository;
mod notification_repository;
mod post_repository;
mod user_repository;

pub use badge_repository::BadgeRepository;
pub use comment_repository::{CommentOwnership, CommentRepository};
pub use friend_repository::FriendRepository;
pub use invite_repository::InviteRepository;
pub use leaderboard_repository::LeaderboardRepository;
pub use like_repository::LikeRepository;
pub use notification_repository::{NewNotification, NotificationRepository};
pub use post_repository::{DailyTotal, NewPost, PostRecord, PostRepository};
pub use user_repository::{Credentials, UserRepository};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use fitlog_types::Visibility;

    use super::{FriendRepository, NewPost, PostRepository, UserRepository};
    use crate::db::Database;

    pub fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    pub fn create_user(db: &Database, username: &str) -> Uuid {
        UserRepository::new(db.pool.clone())
            .create(username, "not-a-real-hash", username)
            .unwrap()
            .unwrap()
            .id
    }

    pub fn insert_post_at(
        db: &Database,
        user_id: &Uuid,
        minutes: i64,
        created_at: DateTime<Utc>,
        visibility: Visibility,
    ) -> Uuid {
        PostRepository::new(db.pool.clone())
            .create(&NewPost {
                user_id: *user_id,
                sport: "running",
                minutes,
                message: None,
                image: None,
                visibility,
                created_at,
            })
            .unwrap()
    }

    pub fn make_friends(db: &Database, a: &Uuid, b: &Uuid) {
        FriendRepository::new(db.pool.clone()).add(a, b).unwrap();
    }
}
