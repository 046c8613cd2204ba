use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use fitlog_types::{LeaderboardEntry, LeaderboardPeriod, LeaderboardScope};

use crate::{
    api::{ApiError, ApiResult},
    db::repositories::LeaderboardRepository,
    middleware::OptionalUser,
    state::AppState,
};

pub const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Ranked standings for a period and scope. The friends scope needs a viewer.
pub fn standings(
    state: &AppState,
    period: LeaderboardPeriod,
    scope: LeaderboardScope,
    viewer: Option<Uuid>,
    limit: i64,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let circle_of = match scope {
        LeaderboardScope::Global => None,
        LeaderboardScope::Friends => Some(viewer.ok_or_else(|| {
            ApiError::Unauthorized("Log in to see the friends leaderboard".to_string())
        })?),
    };
    let since = period.window_days().map(|days| Utc::now() - Duration::days(days));

    let entries = LeaderboardRepository::new(state.db.pool.clone()).standings(
        since,
        circle_of.as_ref(),
        viewer.as_ref(),
        limit.clamp(1, MAX_LIMIT),
    )?;
    Ok(entries)
}

/// GET /api/leaderboard?period=week|month|all&scope=global|friends
pub async fn get_leaderboard(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let period = match query.period.as_deref() {
        None => LeaderboardPeriod::default(),
        Some(raw) => LeaderboardPeriod::parse(raw)
            .ok_or_else(|| ApiError::BadRequest("period must be one of week, month, all".to_string()))?,
    };
    let scope = match query.scope.as_deref() {
        None => LeaderboardScope::default(),
        Some(raw) => LeaderboardScope::parse(raw)
            .ok_or_else(|| ApiError::BadRequest("scope must be one of global, friends".to_string()))?,
    };

    standings(&state, period, scope, viewer, query.limit).map(Json)
}
