pub mod auth;
pub mod badges;
pub mod error;
pub mod friends;
pub mod leaderboard;
pub mod media;
pub mod notifications;
pub mod posts;
pub mod profile;
pub mod stats;

pub use error::{ApiError, ApiResult};
