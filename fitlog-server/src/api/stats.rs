use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use fitlog_types::Stats;

use crate::{
    api::{ApiError, ApiResult},
    middleware::CurrentUser,
    state::AppState,
    stats::{self, DEFAULT_DAYS, MAX_DAYS},
};

#[derive(Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_days")]
    days: i64,
}

fn default_days() -> i64 {
    DEFAULT_DAYS
}

/// GET /api/stats?days=N
pub async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<Stats>> {
    if !(1..=MAX_DAYS).contains(&query.days) {
        return Err(ApiError::BadRequest(format!("days must be between 1 and {}", MAX_DAYS)));
    }

    let stats = stats::compute(
        &state.db,
        &user_id,
        query.days,
        state.settings.goals.daily_minutes,
        Utc::now().date_naive(),
    )?;
    Ok(Json(stats))
}
