use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::api::ApiError;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "X-Session-Token";
pub const SESSION_COOKIE: &str = "fitlog_session";

/// Session token from the `X-Session-Token` header, else the session cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value that stores a session token
pub fn session_cookie(token: &str, ttl_days: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_days * 24 * 60 * 60
    )
}

/// `Set-Cookie` value that clears the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

fn resolve_user(state: &AppState, headers: &HeaderMap) -> Option<Uuid> {
    let token = session_token(headers)?;
    state.get_authenticated_user_id_from_token(&token)
}

/// The logged-in user; rejects the request with 401 otherwise
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if session_token(&parts.headers).is_none() {
            return Err(ApiError::Unauthorized("Missing session token".to_string()));
        }
        resolve_user(state, &parts.headers)
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Invalid session token".to_string()))
    }
}

/// The logged-in user if there is one; anonymous requests are allowed
#[derive(Debug, Clone, Copy)]
pub struct OptionalUser(pub Option<Uuid>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(resolve_user(state, &parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("fitlog_session=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; fitlog_session=abc-123; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_missing_or_empty_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("fitlog_session="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_cookie_strings() {
        assert_eq!(
            session_cookie("tok", 1),
            "fitlog_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=86400"
        );
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
