//! Error handling for the API.
//!
//! Every endpoint returns a [DaybookResult], and every error variant maps
//! to a status code and a JSON body. Prefer adding a variant over forcing
//! an error into `BadRequest` or `Internal`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::validation::ValidationErrors;

/// SQLite's extended result code for a violated `UNIQUE` constraint.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// The error enum for all error handling across the API.
#[derive(Debug, Error)]
pub enum DaybookError {
    /// \[422\] One or more fields of the request were invalid.
    ///
    /// ```json
    /// {
    ///     "message": "the given data was invalid",
    ///     "errors": { "<field>": [{ "code": "max", "description": "..." }] }
    /// }
    /// ```
    #[error("the given data was invalid")]
    Validation(ValidationErrors),
    /// \[401\] The endpoint requires a valid, unexpired bearer token.
    #[error("login required")]
    Unauthorized,
    /// \[401\] The login id or password did not match an account.
    #[error("invalid login id or password")]
    InvalidCredentials,
    /// \[403\] The account exists but has been frozen.
    #[error("account is frozen")]
    AccountFrozen,
    /// \[404\] The named resource does not exist for the current user.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// \[409\] A concurrent request claimed the same unique value first.
    #[error("{0}")]
    Conflict(&'static str),
    /// \[400\] The request body or query string could not be read.
    #[error("{0}")]
    BadRequest(String),
    /// \[500\] An error occurred while interacting with the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// \[500\] A password could not be hashed or verified.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    /// \[500\] Anything else that went wrong on our side.
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

/// The return type for all endpoints.
pub type DaybookResult<T> = Result<T, DaybookError>;

impl DaybookError {
    pub fn status(&self) -> StatusCode {
        match self {
            DaybookError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DaybookError::Unauthorized | DaybookError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            DaybookError::AccountFrozen => StatusCode::FORBIDDEN,
            DaybookError::NotFound(_) => StatusCode::NOT_FOUND,
            DaybookError::Conflict(_) => StatusCode::CONFLICT,
            DaybookError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DaybookError::Database(_) | DaybookError::Hash(_) | DaybookError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Maps a unique constraint violation on insert to a [DaybookError::Conflict],
    /// passing any other database error through.
    pub fn unique_violation(reason: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |error| {
            let unique = matches!(
                &error,
                sqlx::Error::Database(db_error)
                    if db_error.code().as_deref() == Some(SQLITE_CONSTRAINT_UNIQUE)
            );
            if unique {
                DaybookError::Conflict(reason)
            } else {
                DaybookError::Database(error)
            }
        }
    }

    pub fn as_response(&self) -> (StatusCode, Value) {
        let body = match self {
            DaybookError::Validation(errors) => json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            DaybookError::Database(_) | DaybookError::Hash(_) | DaybookError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                json!({ "error": "internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (self.status(), body)
    }
}

impl From<ValidationErrors> for DaybookError {
    fn from(errors: ValidationErrors) -> Self {
        DaybookError::Validation(errors)
    }
}

impl IntoResponse for DaybookError {
    fn into_response(self) -> Response {
        let (status, body) = self.as_response();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_detail() {
        let error = DaybookError::Internal(anyhow::anyhow!("disk on fire at /var/lib/daybook"));
        let (status, body) = error.as_response();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "internal server error" }));
    }

    #[test]
    fn not_found_names_the_resource() {
        let (status, body) = DaybookError::NotFound("tag").as_response();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "tag not found" }));
    }

    #[test]
    fn conflicts_return_their_reason() {
        let (status, body) = DaybookError::Conflict("login id already taken").as_response();

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({ "error": "login id already taken" }));
    }

    #[test]
    fn validation_errors_are_unprocessable() {
        let mut errors = ValidationErrors::default();
        errors.add("name", "max", "名前は15文字以内で入力してください。".to_owned());
        let (status, body) = DaybookError::from(errors).as_response();

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["name"][0]["code"], "max");
    }
}
