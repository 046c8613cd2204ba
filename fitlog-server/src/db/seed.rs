use anyhow::{Context, Result};
use chrono::{Duration, Utc};

use fitlog_types::Visibility;

use super::repositories::{NewPost, PostRepository, UserRepository};
use super::Database;
use crate::activity::refresh_progress;
use crate::password::hash_password;

pub const DEMO_PASSWORD: &str = "pass";

/// (username, display name, sport, minutes, message, days ago)
const DEMO_DATA: &[(&str, &str, &str, i64, &str, i64)] = &[
    ("alice", "Alice", "running", 30, "Morning run", 1),
    ("bob", "Bob", "swimming", 45, "Pool practice", 2),
    ("carol", "Carol", "cycling", 60, "Long ride", 3),
];

/// Create the demo users and a workout each. Does nothing if any user exists.
/// Returns whether anything was written.
pub fn seed_demo_data(db: &Database) -> Result<bool> {
    let users = UserRepository::new(db.pool.clone());
    if !users.list_all()?.is_empty() {
        tracing::info!("Database already has users; skipping seed");
        return Ok(false);
    }

    let posts = PostRepository::new(db.pool.clone());
    let now = Utc::now();

    for (username, display_name, sport, minutes, message, days_ago) in DEMO_DATA {
        let password_hash = hash_password(DEMO_PASSWORD)?;
        let user = users
            .create(username, &password_hash, display_name)?
            .with_context(|| format!("Demo user {} already exists", username))?;
        posts.create(&NewPost {
            user_id: user.id,
            sport: *sport,
            minutes: *minutes,
            message: Some(*message),
            image: None,
            visibility: Visibility::Public,
            created_at: now - Duration::days(*days_ago),
        })?;
        refresh_progress(db, &user.id)?;
    }

    tracing::info!("Seeded {} demo users", DEMO_DATA.len());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_db;
    use crate::password::verify_password;

    #[test]
    fn test_seed_once() {
        let db = setup_db();
        assert!(seed_demo_data(&db).unwrap());
        assert!(!seed_demo_data(&db).unwrap());

        let users = UserRepository::new(db.pool.clone());
        let all = users.list_all().unwrap();
        assert_eq!(all.len(), 3);

        let alice = users.get_credentials("alice").unwrap().unwrap();
        let bob = users.get_credentials("bob").unwrap().unwrap();
        assert!(verify_password(DEMO_PASSWORD, &alice.password_hash));
        assert!(verify_password(DEMO_PASSWORD, &bob.password_hash));
        // Each account gets its own salt
        assert_ne!(alice.password_hash, bob.password_hash);

        let feed = PostRepository::new(db.pool.clone()).feed(None, None, 10, 0).unwrap();
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].username, "alice");
    }
}
