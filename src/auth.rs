//! Bearer token authentication.
//!
//! Take an [AuthUser] as an endpoint parameter to require a logged-in user.
//! Any request without a live token for a normal account is rejected with
//! a 401 before the handler runs.

use axum::extract::{Extension, FromRequest, RequestParts, TypedHeader};
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;

use crate::error::DaybookError;
use crate::models::user::token::UserToken;
use crate::models::user::{User, UserStatus};
use crate::AppState;

pub struct AuthUser {
    pub user: User,
    /// The token the request was made with
    pub token: String,
}

#[async_trait::async_trait]
impl<B: Send> FromRequest<B> for AuthUser {
    type Rejection = DaybookError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| DaybookError::Unauthorized)?;
        let Extension(state) = Extension::<AppState>::from_request(req)
            .await
            .map_err(|rejection| DaybookError::Internal(anyhow::anyhow!(rejection.to_string())))?;

        let token = UserToken::with_token_opt(bearer.token(), &state.pool)
            .await?
            .filter(|token| !token.is_expired())
            .ok_or(DaybookError::Unauthorized)?;
        let user = User::with_id_opt(token.user_id, &state.pool)
            .await?
            .filter(|user| user.status == UserStatus::Normal)
            .ok_or(DaybookError::Unauthorized)?;

        Ok(Self {
            user,
            token: token.token,
        })
    }
}
