use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::auth::AuthUser;
use crate::error::DaybookResult;
use crate::extract::{IdPath, JsonBody};
use crate::models::achievement::{Achievement, AchievementForm};
use crate::AppState;

pub async fn list(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
) -> DaybookResult<Json<Vec<Achievement>>> {
    Achievement::for_user(auth.user.id, &state.pool).await.map(Json)
}

pub async fn record(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    JsonBody(form): JsonBody<AchievementForm>,
) -> DaybookResult<Json<Achievement>> {
    let new_achievement = form.validate()?;
    Achievement::record(auth.user.id, new_achievement, &state.pool)
        .await
        .map(Json)
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<StatusCode> {
    let achievement = Achievement::with_id(auth.user.id, id, &state.pool).await?;
    achievement.delete(&state.pool).await?;

    Ok(StatusCode::NO_CONTENT)
}
