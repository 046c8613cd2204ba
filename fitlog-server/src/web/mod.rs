//! Server-rendered pages for browsers. Authentication uses the session cookie.

pub mod pages;
pub mod templates;

use askama::Template;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{Html, IntoResponse, Redirect, Response},
};

use fitlog_types::User;

use crate::api::ApiResult;
use crate::db::repositories::UserRepository;
use crate::middleware::session_token;
use crate::state::AppState;

pub type PageResult = ApiResult<Response>;

/// Render a template into an HTML response
pub fn render<T: Template>(template: &T) -> PageResult {
    Ok(Html(template.render()?).into_response())
}

/// The logged-in user for a page; anonymous visitors are sent to `/login`
pub struct PageUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for PageUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = session_token(&parts.headers)
            .and_then(|token| state.get_authenticated_user_id_from_token(&token))
            .ok_or_else(|| Redirect::to("/login").into_response())?;

        match UserRepository::new(state.db.pool.clone()).get_by_id(&user_id) {
            Ok(Some(user)) => Ok(PageUser(user)),
            Ok(None) => Err(Redirect::to("/login").into_response()),
            Err(e) => Err(crate::api::ApiError::from(e).into_response()),
        }
    }
}
