use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::{
    api::{ApiError, ApiResult},
    state::AppState,
    storage::validate_key,
};

/// GET /media/:key - Serve a stored image with its content type
pub async fn get_media(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Response> {
    if validate_key(&key).is_err() {
        return Err(ApiError::BadRequest("Invalid media key".to_string()));
    }

    let media = state
        .media
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound("Media not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, media.mime),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        media.data,
    )
        .into_response())
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}
