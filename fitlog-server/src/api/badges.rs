use axum::{
    extract::{Path, State},
    Json,
};
use std::collections::HashMap;
use uuid::Uuid;

use fitlog_types::BadgeStatus;

use crate::{
    api::{ApiError, ApiResult},
    badges,
    db::repositories::{BadgeRepository, UserRepository},
    middleware::OptionalUser,
    state::AppState,
};

/// GET /api/badges - The catalog, flagged for the viewer
pub async fn list_badges(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
) -> ApiResult<Json<Vec<BadgeStatus>>> {
    let repo = BadgeRepository::new(state.db.pool.clone());
    let awarded = match viewer {
        Some(user_id) => repo.awarded(&user_id)?,
        None => HashMap::new(),
    };
    Ok(Json(badges::statuses(repo.catalog()?, &awarded)))
}

/// GET /api/users/:id/badges - Badges a user has earned
pub async fn user_badges(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<BadgeStatus>>> {
    if UserRepository::new(state.db.pool.clone()).get_by_id(&user_id)?.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let repo = BadgeRepository::new(state.db.pool.clone());
    let awarded = repo.awarded(&user_id)?;
    let earned = badges::statuses(repo.catalog()?, &awarded)
        .into_iter()
        .filter(|status| status.achieved)
        .collect();
    Ok(Json(earned))
}
