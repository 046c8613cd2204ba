//! Check-in workflow shared by the JSON API and the browser pages.

use anyhow::Result;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use chrono::Utc;
use uuid::Uuid;

use fitlog_types::{
    normalize_message, normalize_sport, parse_minutes, Badge, CheckinResponse, NotificationKind,
    ValidationError, Visibility,
};

use crate::api::{ApiError, ApiResult};
use crate::badges::{self, Progress};
use crate::db::repositories::{
    BadgeRepository, NewNotification, NewPost, NotificationRepository, PostRepository,
};
use crate::db::Database;
use crate::state::AppState;
use crate::storage::{self, accept_image, ImageUpload};

/// Raw check-in form fields as submitted
#[derive(Debug, Default)]
pub struct CheckinForm {
    pub sport: String,
    pub minutes: String,
    pub message: Option<String>,
    pub visibility: Option<String>,
    pub image: Option<ImageUpload>,
}

pub(crate) fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Read the single image part named `field_name` from a multipart body
pub async fn read_image_field(
    mut multipart: Multipart,
    field_name: &str,
    max_bytes: usize,
) -> ApiResult<Option<ImageUpload>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(accept_image(data.to_vec(), content_type.as_deref(), filename.as_deref(), max_bytes)?);
    }
    Ok(None)
}

impl CheckinForm {
    /// Collect the known fields from a multipart body; unknown parts are ignored
    pub async fn from_multipart(mut multipart: Multipart, max_bytes: usize) -> ApiResult<Self> {
        let mut form = CheckinForm::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "sport" => form.sport = field.text().await.map_err(multipart_error)?,
                "minutes" => form.minutes = field.text().await.map_err(multipart_error)?,
                "message" => form.message = Some(field.text().await.map_err(multipart_error)?),
                "visibility" => form.visibility = Some(field.text().await.map_err(multipart_error)?),
                "image" => {
                    let content_type = field.content_type().map(str::to_string);
                    let filename = field.file_name().map(str::to_string);
                    let data = field.bytes().await.map_err(multipart_error)?;
                    form.image = accept_image(
                        data.to_vec(),
                        content_type.as_deref(),
                        filename.as_deref(),
                        max_bytes,
                    )?;
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

/// Blank visibility means the default; anything else must name a level
pub fn parse_visibility(raw: Option<&str>) -> Result<Visibility, ValidationError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(Visibility::default()),
        Some(value) => Visibility::parse(value).ok_or(ValidationError::InvalidVisibility),
    }
}

/// Validate and store a check-in, then bring the author's streak and badges up to date
pub async fn checkin(state: &AppState, user_id: Uuid, form: CheckinForm) -> ApiResult<CheckinResponse> {
    let sport = normalize_sport(&form.sport)?;
    let minutes = parse_minutes(&form.minutes)?;
    let message = normalize_message(form.message.as_deref())?;
    let visibility = parse_visibility(form.visibility.as_deref())?;

    if let Some(image) = &form.image {
        state.media.put(&image.key, image.data.clone(), image.mime).await?;
    }

    let post_repo = PostRepository::new(state.db.pool.clone());
    let created = post_repo.create(&NewPost {
        user_id,
        sport: &sport,
        minutes,
        message: message.as_deref(),
        image: form.image.as_ref().map(|i| (i.key.as_str(), i.mime)),
        visibility,
        created_at: Utc::now(),
    });
    let post_id = match created {
        Ok(id) => id,
        Err(e) => {
            if let Some(image) = &form.image {
                storage::discard(state.media.as_ref(), &image.key).await;
            }
            return Err(e.into());
        }
    };

    let (streak_days, new_badges) = refresh_progress(&state.db, &user_id)?;
    let post = post_repo
        .get_visible(&post_id, Some(&user_id))?
        .ok_or_else(|| ApiError::InternalError("Created post could not be read back".to_string()))?;

    tracing::info!(
        "User {} checked in {} minutes of {} (streak {})",
        user_id,
        minutes,
        sport,
        streak_days
    );

    Ok(CheckinResponse {
        post,
        streak_days,
        new_badges,
    })
}

/// Delete a post owned by `user_id` along with its media
pub async fn delete_post(state: &AppState, user_id: Uuid, post_id: Uuid) -> ApiResult<()> {
    let post_repo = PostRepository::new(state.db.pool.clone());
    let record = post_repo
        .get_record(&post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if record.user_id != user_id {
        return Err(ApiError::Forbidden("You can only delete your own posts".to_string()));
    }

    post_repo.delete(&post_id)?;
    if let Some(key) = &record.image_key {
        storage::discard(state.media.as_ref(), key).await;
    }

    tracing::info!("User {} deleted post {}", user_id, post_id);
    Ok(())
}

/// Award any badges now earned.
/// Returns the current streak and the badges awarded by this call.
pub fn refresh_progress(db: &Database, user_id: &Uuid) -> Result<(i64, Vec<Badge>)> {
    let post_repo = PostRepository::new(db.pool.clone());
    let badge_repo = BadgeRepository::new(db.pool.clone());
    let notifications = NotificationRepository::new(db.pool.clone());

    let today = Utc::now().date_naive();
    let streak_days = crate::streak::current_streak(&post_repo.checkin_days(user_id)?, today);

    let (checkins, total_minutes) = post_repo.totals(user_id)?;
    let progress = Progress {
        streak_days,
        total_minutes,
        checkins,
    };

    let catalog = badge_repo.catalog()?;
    let awarded = badge_repo.awarded(user_id)?;
    let mut new_badges = Vec::new();
    for badge in badges::newly_earned(&catalog, &progress, &awarded) {
        if badge_repo.award(user_id, &badge.id)? {
            notifications.create(&NewNotification {
                user_id,
                actor_id: None,
                kind: NotificationKind::Badge,
                post_id: None,
                message: &format!("You earned the {} badge", badge.title),
            })?;
            tracing::info!("User {} earned badge {}", user_id, badge.id);
            new_badges.push(badge.clone());
        }
    }

    Ok((streak_days, new_badges))
}
