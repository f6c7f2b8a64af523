use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::DaybookResult;
use crate::extract::JsonBody;
use crate::models::user::password_reset::{ForgotPasswordForm, PasswordReset, ResetPasswordForm};
use crate::models::user::token::UserToken;
use crate::models::user::{LoginForm, RegisterForm, User};
use crate::AppState;

/// A freshly issued token and who it belongs to.
#[derive(Serialize)]
pub struct Session {
    #[serde(flatten)]
    pub token: UserToken,
    pub user: User,
}

pub async fn register(
    Extension(state): Extension<AppState>,
    JsonBody(form): JsonBody<RegisterForm>,
) -> DaybookResult<(StatusCode, Json<Session>)> {
    let new_user = form.validate(&state.pool).await?;
    let user = User::register(new_user, state.config.bcrypt_cost, &state.pool).await?;
    let token = UserToken::issue(user.id, state.config.token_lifetime, &state.pool).await?;
    tracing::info!(user_id = user.id, "registered new user");

    Ok((StatusCode::CREATED, Json(Session { token, user })))
}

pub async fn login(
    Extension(state): Extension<AppState>,
    JsonBody(form): JsonBody<LoginForm>,
) -> DaybookResult<Json<Session>> {
    let (login_id, password) = form.validate()?;
    let user = User::verify_login(&login_id, &password, &state.pool).await?;
    let token = UserToken::issue(user.id, state.config.token_lifetime, &state.pool).await?;
    tracing::info!(user_id = user.id, "logged in");

    Ok(Json(Session { token, user }))
}

pub async fn logout(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
) -> DaybookResult<StatusCode> {
    UserToken::revoke(&auth.token, &state.pool).await?;
    tracing::info!(user_id = auth.user.id, "logged out");

    Ok(StatusCode::NO_CONTENT)
}

/// Always accepted, so the response never reveals whether an email is
/// registered.
pub async fn forgot_password(
    Extension(state): Extension<AppState>,
    JsonBody(form): JsonBody<ForgotPasswordForm>,
) -> DaybookResult<(StatusCode, Json<Value>)> {
    let email = form.validate()?;
    if let Some(reset) =
        PasswordReset::generate(&email, state.config.password_reset_lifetime, &state.pool).await?
    {
        tracing::info!(user_id = reset.user_id, "password reset requested");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "パスワード再設定の手順をメールで送信しました。" })),
    ))
}

pub async fn reset_password(
    Extension(state): Extension<AppState>,
    JsonBody(form): JsonBody<ResetPasswordForm>,
) -> DaybookResult<StatusCode> {
    let user_id = PasswordReset::reset_from_form(form, state.config.bcrypt_cost, &state.pool).await?;
    tracing::info!(user_id, "password reset");

    Ok(StatusCode::NO_CONTENT)
}
