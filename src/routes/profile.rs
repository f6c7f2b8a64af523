use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::auth::AuthUser;
use crate::error::DaybookResult;
use crate::extract::JsonBody;
use crate::models::user::{PasswordChangeForm, ProfileForm, User};
use crate::AppState;

pub async fn show(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

pub async fn update(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    JsonBody(form): JsonBody<ProfileForm>,
) -> DaybookResult<Json<User>> {
    let update = form.validate(&auth.user, &state.pool).await?;
    let user = auth.user.update_profile(update, &state.pool).await?;

    Ok(Json(user))
}

/// Changing the password signs the user out everywhere, including this
/// request's token.
pub async fn change_password(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    JsonBody(form): JsonBody<PasswordChangeForm>,
) -> DaybookResult<StatusCode> {
    let password = form.validate(&auth.user)?;
    auth.user
        .change_password(&password, state.config.bcrypt_cost, &state.pool)
        .await?;
    tracing::info!(user_id = auth.user.id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
) -> DaybookResult<StatusCode> {
    auth.user.mark_deleted(&state.pool).await?;
    tracing::info!(user_id = auth.user.id, "account deleted");

    Ok(StatusCode::NO_CONTENT)
}
