use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Form,
};
use chrono::Utc;
use serde::Deserialize;

use fitlog_types::{LeaderboardPeriod, LeaderboardScope, LoginRequest, RegisterRequest};

use super::templates::{
    day_views, BadgeView, CheckinTemplate, IndexTemplate, LeaderboardTemplate, LoginTemplate,
    RankView, RegisterTemplate, StatsTemplate,
};
use super::{render, PageResult, PageUser};
use crate::activity::{self, CheckinForm};
use crate::api::auth::{login_user, register_user};
use crate::api::leaderboard::{self, DEFAULT_LIMIT};
use crate::api::posts::DEFAULT_FEED_LIMIT;
use crate::badges;
use crate::db::repositories::{BadgeRepository, PostRepository};
use crate::middleware::{clear_session_cookie, session_cookie, session_token};
use crate::state::AppState;
use crate::stats::{self, DEFAULT_DAYS};

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    username: String,
    password: String,
    #[serde(default)]
    display_name: String,
}

fn with_status(status: StatusCode, page: PageResult) -> PageResult {
    page.map(|response| (status, response).into_response())
}

/// Set the session cookie and go home
fn signed_in(state: &AppState, token: &str) -> PageResult {
    Ok((
        [(header::SET_COOKIE, session_cookie(token, state.settings.sessions.ttl_days))],
        Redirect::to("/"),
    )
        .into_response())
}

/// GET / - Today's goal, streak and the feed
pub async fn home(State(state): State<AppState>, PageUser(user): PageUser) -> PageResult {
    let stats = stats::compute(
        &state.db,
        &user.id,
        1,
        state.settings.goals.daily_minutes,
        Utc::now().date_naive(),
    )?;
    let posts = PostRepository::new(state.db.pool.clone()).feed(Some(&user.id), None, DEFAULT_FEED_LIMIT, 0)?;
    render(&IndexTemplate::new(user.display_name, &stats, posts))
}

/// GET /login
pub async fn login_page() -> PageResult {
    render(&LoginTemplate {
        nav_user: String::new(),
        error: None,
        username: String::new(),
    })
}

/// POST /login
pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> PageResult {
    let request = LoginRequest {
        username: form.username,
        password: form.password,
    };
    match login_user(&state, &request) {
        Ok(response) => signed_in(&state, &response.session_token),
        Err(e) => with_status(
            e.status(),
            render(&LoginTemplate {
                nav_user: String::new(),
                error: Some(e.user_message()),
                username: request.username,
            }),
        ),
    }
}

/// GET /register
pub async fn register_page() -> PageResult {
    render(&RegisterTemplate {
        nav_user: String::new(),
        error: None,
        username: String::new(),
        display_name: String::new(),
    })
}

/// POST /register - Creates the account and logs it in
pub async fn register_submit(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> PageResult {
    let request = RegisterRequest {
        username: form.username,
        password: form.password,
        display_name: Some(form.display_name),
    };
    match register_user(&state, &request) {
        Ok(user) => {
            let token = state.session_manager.create_session(user.id)?;
            signed_in(&state, &token)
        }
        Err(e) => with_status(
            e.status(),
            render(&RegisterTemplate {
                nav_user: String::new(),
                error: Some(e.user_message()),
                username: request.username,
                display_name: request.display_name.unwrap_or_default(),
            }),
        ),
    }
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> PageResult {
    if let Some(token) = session_token(&headers) {
        state.session_manager.delete_session(&token)?;
    }
    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response())
}

/// GET /checkin
pub async fn checkin_page(PageUser(user): PageUser) -> PageResult {
    render(&CheckinTemplate {
        nav_user: user.display_name,
        error: None,
        confirmation: None,
        new_badges: Vec::new(),
        streak_days: user.streak_days,
    })
}

/// POST /checkin - Re-renders the form with a confirmation or the error
pub async fn checkin_submit(
    State(state): State<AppState>,
    PageUser(user): PageUser,
    multipart: Multipart,
) -> PageResult {
    let result = match CheckinForm::from_multipart(multipart, state.settings.uploads.max_bytes).await {
        Ok(form) => activity::checkin(&state, user.id, form).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => render(&CheckinTemplate {
            nav_user: user.display_name,
            error: None,
            confirmation: Some("Checked in!".to_string()),
            new_badges: response.new_badges.into_iter().map(|b| b.title).collect(),
            streak_days: response.streak_days,
        }),
        Err(e) => with_status(
            e.status(),
            render(&CheckinTemplate {
                nav_user: user.display_name,
                error: Some(e.user_message()),
                confirmation: None,
                new_badges: Vec::new(),
                streak_days: user.streak_days,
            }),
        ),
    }
}

/// GET /leaderboard - Weekly standings plus the viewer's badges
pub async fn leaderboard_page(State(state): State<AppState>, PageUser(user): PageUser) -> PageResult {
    let entries = leaderboard::standings(
        &state,
        LeaderboardPeriod::Week,
        LeaderboardScope::Global,
        Some(user.id),
        DEFAULT_LIMIT,
    )?;

    let badge_repo = BadgeRepository::new(state.db.pool.clone());
    let awarded = badge_repo.awarded(&user.id)?;
    let badges = badges::statuses(badge_repo.catalog()?, &awarded);

    render(&LeaderboardTemplate {
        nav_user: user.display_name,
        entries: entries.into_iter().map(RankView::from).collect(),
        badges: badges.into_iter().map(BadgeView::from).collect(),
    })
}

/// GET /stats - Last seven days
pub async fn stats_page(State(state): State<AppState>, PageUser(user): PageUser) -> PageResult {
    let stats = stats::compute(
        &state.db,
        &user.id,
        DEFAULT_DAYS,
        state.settings.goals.daily_minutes,
        Utc::now().date_naive(),
    )?;

    render(&StatsTemplate {
        nav_user: user.display_name,
        days: day_views(&stats.days),
        total_minutes: stats.total_minutes,
        total_checkins: stats.total_checkins,
        current_streak: stats.current_streak,
        longest_streak: stats.longest_streak,
    })
}
