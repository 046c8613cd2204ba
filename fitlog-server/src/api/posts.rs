use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use fitlog_types::{
    normalize_comment, normalize_message, CheckinResponse, Comment, CreateCommentRequest,
    LikeResponse, NotificationKind, Post, UpdatePostRequest, UserSummary, ValidationError,
    Visibility,
};

use crate::{
    activity::{self, CheckinForm},
    api::{ApiError, ApiResult},
    db::repositories::{
        CommentRepository, LikeRepository, NewNotification, NotificationRepository, PostRepository,
        UserRepository,
    },
    middleware::{CurrentUser, OptionalUser},
    state::AppState,
};

pub const DEFAULT_FEED_LIMIT: i64 = 20;
const MAX_FEED_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    #[serde(default)]
    username: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_FEED_LIMIT
}

/// Load a post the viewer may see, or 404
fn visible_post(state: &AppState, post_id: &Uuid, viewer: Option<&Uuid>) -> ApiResult<Post> {
    PostRepository::new(state.db.pool.clone())
        .get_visible(post_id, viewer)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

/// Display name of a user for notification text
fn actor_name(state: &AppState, user_id: &Uuid) -> ApiResult<String> {
    let user = UserRepository::new(state.db.pool.clone())
        .get_by_id(user_id)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid session token".to_string()))?;
    Ok(user.username)
}

/// GET /api/posts - Newest-first feed, optionally for one author
pub async fn get_posts(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    let limit = query.limit.clamp(1, MAX_FEED_LIMIT);
    let offset = query.offset.max(0);

    let author = match query.username.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(username) => Some(
            UserRepository::new(state.db.pool.clone())
                .get_by_username(username)?
                .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", username)))?
                .id,
        ),
        None => None,
    };

    let posts = PostRepository::new(state.db.pool.clone()).feed(
        viewer.as_ref(),
        author.as_ref(),
        limit,
        offset,
    )?;
    Ok(Json(posts))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Post>> {
    visible_post(&state, &post_id, viewer.as_ref()).map(Json)
}

/// POST /api/checkin - Multipart check-in with optional image
pub async fn checkin(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CheckinResponse>)> {
    let form = CheckinForm::from_multipart(multipart, state.settings.uploads.max_bytes).await?;
    let response = activity::checkin(&state, user_id, form).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// PUT /api/posts/:id - Edit message or visibility (author only)
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let post_repo = PostRepository::new(state.db.pool.clone());
    let record = post_repo
        .get_record(&post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if record.user_id != user_id {
        return Err(ApiError::Forbidden("You can only edit your own posts".to_string()));
    }

    let message = payload
        .message
        .as_deref()
        .map(|m| normalize_message(Some(m)))
        .transpose()?;
    let visibility = payload
        .visibility
        .as_deref()
        .map(|v| Visibility::parse(v).ok_or(ValidationError::InvalidVisibility))
        .transpose()?;
    post_repo.update(&post_id, message.as_ref().map(|m| m.as_deref()), visibility)?;

    visible_post(&state, &post_id, Some(&user_id)).map(Json)
}

/// DELETE /api/posts/:id (author only)
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    activity::delete_post(&state, user_id, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/posts/:id/like - Toggle the viewer's like
pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    let post = visible_post(&state, &post_id, Some(&user_id))?;
    let (liked, like_count) = LikeRepository::new(state.db.pool.clone()).toggle(&user_id, &post_id)?;

    if liked && post.user_id != user_id {
        let name = actor_name(&state, &user_id)?;
        NotificationRepository::new(state.db.pool.clone()).create(&NewNotification {
            user_id: &post.user_id,
            actor_id: Some(&user_id),
            kind: NotificationKind::Like,
            post_id: Some(&post_id),
            message: &format!("{} liked your check-in", name),
        })?;
    }

    Ok(Json(LikeResponse { liked, like_count }))
}

/// GET /api/posts/:id/likes
pub async fn list_likes(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    visible_post(&state, &post_id, viewer.as_ref())?;
    let likers = LikeRepository::new(state.db.pool.clone()).likers(&post_id)?;
    Ok(Json(likers))
}

/// GET /api/posts/:id/comments - Oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    visible_post(&state, &post_id, viewer.as_ref())?;
    let comments = CommentRepository::new(state.db.pool.clone()).list_for_post(&post_id)?;
    Ok(Json(comments))
}

/// POST /api/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let content = normalize_comment(&payload.content)?;
    let post = visible_post(&state, &post_id, Some(&user_id))?;

    let comment = CommentRepository::new(state.db.pool.clone()).create(&post_id, &user_id, &content)?;

    if post.user_id != user_id {
        NotificationRepository::new(state.db.pool.clone()).create(&NewNotification {
            user_id: &post.user_id,
            actor_id: Some(&user_id),
            kind: NotificationKind::Comment,
            post_id: Some(&post_id),
            message: &format!("{} commented on your check-in", comment.username),
        })?;
    }

    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comments/:id - Comment author or post author
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let repo = CommentRepository::new(state.db.pool.clone());
    let ownership = repo
        .ownership(&comment_id)?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    if ownership.comment_author != user_id && ownership.post_author != user_id {
        return Err(ApiError::Forbidden(
            "Only the comment author or the post author can delete this comment".to_string(),
        ));
    }

    repo.delete(&comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}
