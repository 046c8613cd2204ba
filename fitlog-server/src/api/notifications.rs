use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use fitlog_types::{Notification, UnreadCount};

use crate::{
    api::{ApiError, ApiResult},
    db::repositories::NotificationRepository,
    middleware::CurrentUser,
    state::AppState,
};

const MAX_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct NotificationsQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    unread_only: bool,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/notifications - Newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = NotificationRepository::new(state.db.pool.clone()).list(
        &user_id,
        query.limit.clamp(1, MAX_LIMIT),
        query.unread_only,
    )?;
    Ok(Json(notifications))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<UnreadCount>> {
    let unread = NotificationRepository::new(state.db.pool.clone()).unread_count(&user_id)?;
    Ok(Json(UnreadCount { unread }))
}

/// POST /api/notifications/:id/read - Only the recipient may mark it
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let updated = NotificationRepository::new(state.db.pool.clone()).mark_read(&notification_id, &user_id)?;
    if !updated {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let updated = NotificationRepository::new(state.db.pool.clone()).mark_all_read(&user_id)?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
