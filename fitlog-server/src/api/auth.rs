use axum::{extract::State, http::HeaderMap, Json};

use fitlog_types::{
    normalize_display_name, validate_password, validate_username, LoginRequest, LoginResponse,
    RegisterRequest, User,
};

use super::{ApiError, ApiResult};
use crate::db::repositories::UserRepository;
use crate::middleware::{session_token, CurrentUser};
use crate::password::{hash_password, verify_password};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Create an account. Shared by the JSON endpoint and the register page.
pub fn register_user(state: &AppState, payload: &RegisterRequest) -> ApiResult<User> {
    let username = payload.username.trim();
    validate_username(username)?;
    validate_password(&payload.password)?;
    let display_name = match payload.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => normalize_display_name(name)?,
        _ => username.to_string(),
    };

    let repo = UserRepository::new(state.db.pool.clone());
    if repo.get_by_username(username)?.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let hash = hash_password(&payload.password)?;
    let user = repo
        .create(username, &hash, &display_name)?
        .ok_or_else(|| ApiError::Conflict("Username already taken".to_string()))?;

    tracing::info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// Check credentials and open a session. Unknown users and wrong passwords
/// get the same answer.
pub fn login_user(state: &AppState, payload: &LoginRequest) -> ApiResult<LoginResponse> {
    let repo = UserRepository::new(state.db.pool.clone());
    let credentials = repo
        .get_credentials(payload.username.trim())?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&payload.password, &credentials.password_hash) {
        tracing::debug!("Failed login for {}", payload.username);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let user = repo
        .get_by_id(&credentials.user_id)?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;
    let session_token = state.session_manager.create_session(user.id)?;

    Ok(LoginResponse { user, session_token })
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    register_user(&state, &payload).map(Json)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    login_user(&state, &payload).map(Json)
}

/// POST /api/auth/logout - Idempotent; a missing token is not an error
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(token) = session_token(&headers) {
        state.session_manager.delete_session(&token)?;
    }

    Ok(Json(serde_json::json!({
        "message": "Logged out successfully"
    })))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<User>> {
    let repo = UserRepository::new(state.db.pool.clone());
    let user = repo
        .get_by_id(&user_id)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid session token".to_string()))?;
    Ok(Json(user))
}
