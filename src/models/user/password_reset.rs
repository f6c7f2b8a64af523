use serde::Deserialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{DaybookError, DaybookResult};
use crate::models::user::token::UserToken;
use crate::models::user::{validate_password, User};
use crate::util::current_time;
use crate::validation::Validator;

#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub user_id: i64,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub token: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: Option<String>,
}

impl ForgotPasswordForm {
    pub fn validate(self) -> DaybookResult<String> {
        let mut validator = Validator::new();
        let email = validator
            .required("email", self.email.as_deref())
            .map(str::to_owned);
        validator.finish()?;

        email.ok_or_else(|| DaybookError::BadRequest("invalid email".to_owned()))
    }
}

impl PasswordReset {
    /// Creates a reset token for the user with the given email, replacing
    /// any earlier one. Returns `None` when no active user has that email.
    pub async fn generate(
        email: &str,
        lifetime: Duration,
        pool: &SqlitePool,
    ) -> DaybookResult<Option<Self>> {
        let user = match User::active_with_email_opt(email, pool).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        let reset = Self {
            user_id: user.id,
            token: Uuid::new_v4().to_simple().to_string(),
            expires_at: current_time() + lifetime,
        };

        let mut transaction = pool.begin().await?;
        Self::remove_for_user(user.id, &mut transaction).await?;
        sqlx::query("INSERT INTO password_resets (user_id, token, expires_at) VALUES (?, ?, ?)")
            .bind(reset.user_id)
            .bind(&reset.token)
            .bind(reset.expires_at)
            .execute(&mut transaction)
            .await?;
        transaction.commit().await?;

        Ok(Some(reset))
    }

    pub async fn with_token_opt(token: &str, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT user_id, token, expires_at FROM password_resets WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= current_time()
    }

    /// Sets a new password from a reset token. The reset token and every
    /// bearer token of the user are revoked on success.
    pub async fn reset_from_form(
        form: ResetPasswordForm,
        cost: u32,
        pool: &SqlitePool,
    ) -> DaybookResult<i64> {
        let mut validator = Validator::new();

        let token = validator.required("token", form.token.as_deref());
        let reset = match token {
            Some(token) => Self::with_token_opt(token, pool)
                .await?
                .filter(|reset| !reset.is_expired()),
            None => None,
        };
        if token.is_some() && reset.is_none() {
            validator.fail(
                "token",
                "in",
                "パスワード再設定の有効期限が切れているか、トークンが正しくありません。".to_owned(),
            );
        }

        let password = validate_password(
            &mut validator,
            form.password.as_deref(),
            form.password_confirmation.as_deref(),
        );
        validator.finish()?;

        let (reset, password) = reset
            .zip(password)
            .ok_or_else(|| DaybookError::BadRequest("invalid password reset".to_owned()))?;

        let mut transaction = pool.begin().await?;
        User::set_password(reset.user_id, password, cost, &mut transaction).await?;
        Self::remove_for_user(reset.user_id, &mut transaction).await?;
        UserToken::revoke_for_user(reset.user_id, &mut transaction).await?;
        transaction.commit().await?;

        Ok(reset.user_id)
    }

    pub async fn remove_for_user(user_id: i64, conn: &mut SqliteConnection) -> DaybookResult<()> {
        sqlx::query("DELETE FROM password_resets WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
