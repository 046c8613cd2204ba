// Library exports for fitlog-server
// The binary, the migrate CLI and the integration tests all build on these modules

pub mod activity;
pub mod api;
pub mod badges;
pub mod config;
pub mod db;
pub mod middleware;
pub mod password;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod web;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Room for multipart framing and text fields on top of the image itself
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Build the full router: JSON API, media, and browser pages
pub fn app(state: AppState) -> Router {
    let body_limit = state.settings.uploads.max_bytes + BODY_LIMIT_SLACK;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Authentication routes
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/logout", post(api::auth::logout))
        .route("/auth/me", get(api::auth::me))
        // Check-in routes
        .route("/posts", get(api::posts::get_posts))
        .route("/checkin", post(api::posts::checkin))
        .route(
            "/posts/:id",
            get(api::posts::get_post)
                .put(api::posts::update_post)
                .delete(api::posts::delete_post),
        )
        .route("/posts/:id/like", post(api::posts::toggle_like))
        .route("/posts/:id/likes", get(api::posts::list_likes))
        .route(
            "/posts/:id/comments",
            get(api::posts::list_comments).post(api::posts::create_comment),
        )
        .route("/comments/:id", delete(api::posts::delete_comment))
        // Friend routes
        .route("/friends", get(api::friends::list_friends))
        .route("/friends/:user_id", delete(api::friends::remove_friend))
        .route(
            "/friends/requests",
            get(api::friends::list_requests).post(api::friends::create_request),
        )
        .route("/friends/requests/:id", delete(api::friends::cancel_request))
        .route("/friends/requests/:id/accept", post(api::friends::accept_request))
        .route("/friends/requests/:id/decline", post(api::friends::decline_request))
        // Progress routes
        .route("/leaderboard", get(api::leaderboard::get_leaderboard))
        .route("/stats", get(api::stats::get_stats))
        .route("/badges", get(api::badges::list_badges))
        // User routes
        .route("/users/search", get(api::profile::search_users))
        .route("/users/:id/profile", get(api::profile::get_profile))
        .route("/users/:id/badges", get(api::badges::user_badges))
        .route("/profile", axum::routing::put(api::profile::update_profile))
        .route("/profile/avatar", post(api::profile::upload_avatar))
        // Notification routes
        .route("/notifications", get(api::notifications::list_notifications))
        .route("/notifications/unread-count", get(api::notifications::unread_count))
        .route("/notifications/read-all", post(api::notifications::mark_all_read))
        .route("/notifications/:id/read", post(api::notifications::mark_read));

    let page_routes = Router::new()
        .route("/", get(web::pages::home))
        .route("/login", get(web::pages::login_page).post(web::pages::login_submit))
        .route("/register", get(web::pages::register_page).post(web::pages::register_submit))
        .route("/logout", post(web::pages::logout))
        .route("/checkin", get(web::pages::checkin_page).post(web::pages::checkin_submit))
        .route("/leaderboard", get(web::pages::leaderboard_page))
        .route("/stats", get(web::pages::stats_page));

    Router::new()
        .route("/health", get(api::media::health))
        .route("/media/:key", get(api::media::get_media))
        .nest("/api", api_routes)
        .merge(page_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
