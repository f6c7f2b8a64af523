use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::auth::AuthUser;
use crate::error::DaybookResult;
use crate::extract::{IdPath, JsonBody};
use crate::models::tag::{Tag, TagForm};
use crate::AppState;

pub async fn list(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
) -> DaybookResult<Json<Vec<Tag>>> {
    Tag::for_user(auth.user.id, &state.pool).await.map(Json)
}

pub async fn create(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    JsonBody(form): JsonBody<TagForm>,
) -> DaybookResult<(StatusCode, Json<Tag>)> {
    let new_tag = form.validate(auth.user.id, None, &state.pool).await?;
    let tag = Tag::create(auth.user.id, new_tag, &state.pool).await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
    JsonBody(form): JsonBody<TagForm>,
) -> DaybookResult<Json<Tag>> {
    let tag = Tag::with_id(auth.user.id, id, &state.pool).await?;
    let new_tag = form.validate(auth.user.id, Some(tag.id), &state.pool).await?;

    tag.update(new_tag, &state.pool).await.map(Json)
}

/// Events and occurrences that used the tag keep existing, untagged.
pub async fn delete(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<StatusCode> {
    let tag = Tag::with_id(auth.user.id, id, &state.pool).await?;
    tag.delete(&state.pool).await?;

    Ok(StatusCode::NO_CONTENT)
}
