use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use fitlog_types::{
    Friend, FriendRequestOutcome, FriendRequestPayload, FriendRequests, NotificationKind,
    PendingInvite, UserSummary,
};

use crate::{
    api::{ApiError, ApiResult},
    db::repositories::{
        FriendRepository, InviteRepository, NewNotification, NotificationRepository, UserRepository,
    },
    middleware::CurrentUser,
    state::AppState,
};

fn notify(
    state: &AppState,
    recipient: &Uuid,
    actor: &Uuid,
    kind: NotificationKind,
    message: &str,
) -> ApiResult<()> {
    NotificationRepository::new(state.db.pool.clone()).create(&NewNotification {
        user_id: recipient,
        actor_id: Some(actor),
        kind,
        post_id: None,
        message,
    })?;
    Ok(())
}

fn load_invite(state: &AppState, invite_id: &Uuid) -> ApiResult<PendingInvite> {
    InviteRepository::new(state.db.pool.clone())
        .get(invite_id)?
        .ok_or_else(|| ApiError::NotFound("Friend request not found".to_string()))
}

fn send_request(state: &AppState, sender_id: Uuid, username: &str) -> ApiResult<FriendRequestOutcome> {
    let pool = state.db.pool.clone();
    let user_repo = UserRepository::new(pool.clone());
    let friend_repo = FriendRepository::new(pool.clone());
    let invite_repo = InviteRepository::new(pool);

    let target = user_repo
        .get_by_username(username.trim())?
        .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", username.trim())))?;

    if target.id == sender_id {
        return Err(ApiError::BadRequest("You cannot add yourself as a friend".to_string()));
    }
    if friend_repo.are_friends(&sender_id, &target.id)? {
        return Err(ApiError::Conflict(format!("You are already friends with {}", target.username)));
    }
    if invite_repo.find_between(&sender_id, &target.id)?.is_some() {
        return Err(ApiError::Conflict(format!(
            "A friend request to {} is already pending",
            target.username
        )));
    }

    // The target already asked: accept their request instead of creating a new one
    if let Some(reverse) = invite_repo.find_between(&target.id, &sender_id)? {
        invite_repo.accept(&reverse)?;
        notify(
            state,
            &target.id,
            &sender_id,
            NotificationKind::FriendAccept,
            &format!("{} accepted your friend request", reverse.to_user.username),
        )?;
        tracing::info!("Users {} and {} are now friends", sender_id, target.id);
        return Ok(FriendRequestOutcome::Accepted {
            friend: UserSummary::from(&target),
        });
    }

    let invite = invite_repo
        .create(&sender_id, &target.id)?
        .ok_or_else(|| ApiError::Conflict("A friend request is already pending".to_string()))?;
    notify(
        state,
        &target.id,
        &sender_id,
        NotificationKind::FriendRequest,
        &format!("{} sent you a friend request", invite.from_user.username),
    )?;

    Ok(FriendRequestOutcome::Pending { invite })
}

/// GET /api/friends
pub async fn list_friends(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<Friend>>> {
    let friends = FriendRepository::new(state.db.pool.clone()).list(&user_id)?;
    Ok(Json(friends))
}

/// DELETE /api/friends/:user_id
pub async fn remove_friend(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(friend_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let removed = FriendRepository::new(state.db.pool.clone()).remove(&user_id, &friend_id)?;
    if !removed {
        return Err(ApiError::NotFound("You are not friends with this user".to_string()));
    }
    tracing::info!("User {} removed friend {}", user_id, friend_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/friends/requests
pub async fn list_requests(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<FriendRequests>> {
    let repo = InviteRepository::new(state.db.pool.clone());
    Ok(Json(FriendRequests {
        incoming: repo.incoming(&user_id)?,
        outgoing: repo.outgoing(&user_id)?,
    }))
}

/// POST /api/friends/requests
pub async fn create_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<FriendRequestPayload>,
) -> ApiResult<(StatusCode, Json<FriendRequestOutcome>)> {
    let outcome = send_request(&state, user_id, &payload.username)?;
    let status = match outcome {
        FriendRequestOutcome::Pending { .. } => StatusCode::CREATED,
        FriendRequestOutcome::Accepted { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

/// POST /api/friends/requests/:id/accept (receiver only)
pub async fn accept_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(invite_id): Path<Uuid>,
) -> ApiResult<Json<UserSummary>> {
    let invite = load_invite(&state, &invite_id)?;
    if invite.to_user.id != user_id {
        return Err(ApiError::Forbidden("Only the recipient can accept this request".to_string()));
    }

    InviteRepository::new(state.db.pool.clone()).accept(&invite)?;
    notify(
        &state,
        &invite.from_user.id,
        &user_id,
        NotificationKind::FriendAccept,
        &format!("{} accepted your friend request", invite.to_user.username),
    )?;

    tracing::info!("Users {} and {} are now friends", invite.from_user.id, user_id);
    Ok(Json(invite.from_user))
}

/// POST /api/friends/requests/:id/decline (receiver only)
pub async fn decline_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(invite_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let invite = load_invite(&state, &invite_id)?;
    if invite.to_user.id != user_id {
        return Err(ApiError::Forbidden("Only the recipient can decline this request".to_string()));
    }
    InviteRepository::new(state.db.pool.clone()).delete(&invite_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/friends/requests/:id (sender only)
pub async fn cancel_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(invite_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let invite = load_invite(&state, &invite_id)?;
    if invite.from_user.id != user_id {
        return Err(ApiError::Forbidden("Only the sender can cancel this request".to_string()));
    }
    InviteRepository::new(state.db.pool.clone()).delete(&invite_id)?;
    Ok(StatusCode::NO_CONTENT)
}
