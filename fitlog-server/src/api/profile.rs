use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use fitlog_types::{
    normalize_bio, normalize_display_name, Profile, Relationship, UpdateProfileRequest, User,
    UserSummary,
};

use crate::{
    activity::read_image_field,
    api::{ApiError, ApiResult},
    db::repositories::{BadgeRepository, FriendRepository, InviteRepository, PostRepository, UserRepository},
    middleware::{CurrentUser, OptionalUser},
    state::AppState,
    storage,
};

const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// How `viewer` relates to the owner of a profile
pub fn relationship(state: &AppState, viewer: Option<&Uuid>, owner: &Uuid) -> ApiResult<Relationship> {
    let Some(viewer) = viewer else {
        return Ok(Relationship::None);
    };
    if viewer == owner {
        return Ok(Relationship::Self_);
    }
    if FriendRepository::new(state.db.pool.clone()).are_friends(viewer, owner)? {
        return Ok(Relationship::Friends);
    }

    let invites = InviteRepository::new(state.db.pool.clone());
    if invites.find_between(viewer, owner)?.is_some() {
        Ok(Relationship::RequestSent)
    } else if invites.find_between(owner, viewer)?.is_some() {
        Ok(Relationship::RequestReceived)
    } else {
        Ok(Relationship::None)
    }
}

/// GET /api/users/:id/profile
pub async fn get_profile(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Profile>> {
    let pool = state.db.pool.clone();
    let user = UserRepository::new(pool.clone())
        .get_by_id(&user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let (total_checkins, total_minutes) = PostRepository::new(pool.clone()).totals(&user_id)?;
    let badge_count = BadgeRepository::new(pool.clone()).count(&user_id)?;
    let friend_count = FriendRepository::new(pool).count(&user_id)?;
    let relationship = relationship(&state, viewer.as_ref(), &user_id)?;

    Ok(Json(Profile {
        user,
        total_checkins,
        total_minutes,
        badge_count,
        friend_count,
        relationship,
    }))
}

/// PUT /api/profile - Update display name and/or bio
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let display_name = payload
        .display_name
        .as_deref()
        .map(normalize_display_name)
        .transpose()?;
    let bio = payload.bio.as_deref().map(normalize_bio).transpose()?;

    let repo = UserRepository::new(state.db.pool.clone());
    repo.update_profile(
        &user_id,
        display_name.as_deref(),
        bio.as_ref().map(|b| b.as_deref()),
    )?;

    let user = repo
        .get_by_id(&user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// POST /api/profile/avatar - Multipart `avatar` image; replaces the previous one
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    multipart: Multipart,
) -> ApiResult<Json<User>> {
    let upload = read_image_field(multipart, "avatar", state.settings.uploads.max_bytes)
        .await?
        .ok_or_else(|| ApiError::BadRequest("An avatar image is required".to_string()))?;

    state.media.put(&upload.key, upload.data, upload.mime).await?;

    let repo = UserRepository::new(state.db.pool.clone());
    let previous = match repo.set_avatar(&user_id, &upload.key, upload.mime) {
        Ok(previous) => previous,
        Err(e) => {
            storage::discard(state.media.as_ref(), &upload.key).await;
            return Err(e.into());
        }
    };
    if let Some(old_key) = previous {
        storage::discard(state.media.as_ref(), &old_key).await;
    }

    let user = repo
        .get_by_id(&user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// GET /api/users/search?q=query
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let users = UserRepository::new(state.db.pool.clone()).search(q, SEARCH_LIMIT)?;
    Ok(Json(users))
}
