use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::DaybookResult;
use crate::util::{current_time, timestamp};

/// A bearer token. Each user holds at most one at a time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserToken {
    #[serde(skip)]
    pub user_id: i64,
    pub token: String,
    #[serde(with = "timestamp")]
    pub expires_at: OffsetDateTime,
}

impl UserToken {
    /// Issues a fresh token, replacing any token the user already had.
    pub async fn issue(user_id: i64, lifetime: Duration, pool: &SqlitePool) -> DaybookResult<Self> {
        let token = Self {
            user_id,
            token: Uuid::new_v4().to_simple().to_string(),
            expires_at: current_time() + lifetime,
        };

        let mut transaction = pool.begin().await?;
        Self::revoke_for_user(user_id, &mut transaction).await?;
        sqlx::query("INSERT INTO user_tokens (user_id, token, expires_at) VALUES (?, ?, ?)")
            .bind(token.user_id)
            .bind(&token.token)
            .bind(token.expires_at)
            .execute(&mut transaction)
            .await?;
        transaction.commit().await?;

        Ok(token)
    }

    pub async fn with_token_opt(token: &str, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT user_id, token, expires_at FROM user_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= current_time()
    }

    pub async fn revoke_for_user(user_id: i64, conn: &mut SqliteConnection) -> DaybookResult<()> {
        sqlx::query("DELETE FROM user_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn revoke(token: &str, pool: &SqlitePool) -> DaybookResult<()> {
        sqlx::query("DELETE FROM user_tokens WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;

        Ok(())
    }
}
