use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use time::{Date, OffsetDateTime};

use crate::error::{DaybookError, DaybookResult};
use crate::util::{calendar_date, current_time};
use crate::validation::Validator;

pub mod password_reset;
pub mod token;

const SELECT_USER: &str = "SELECT id, login_id, nickname, email, pass_hash, birthday, status, created_at
     FROM users";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Normal,
    Frozen,
    /// Logically deleted. The row is kept but can no longer log in.
    Deleted,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    /// The unique name the user logs in with
    pub login_id: String,
    pub nickname: String,
    pub email: String,
    #[serde(skip)]
    pub pass_hash: String,
    #[serde(with = "calendar_date::option")]
    pub birthday: Option<Date>,
    pub status: UserStatus,
    #[serde(skip)]
    pub created_at: OffsetDateTime,
}

fn login_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid login id pattern"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

/// Checks a new password and its confirmation.
pub(crate) fn validate_password<'p>(
    validator: &mut Validator,
    password: Option<&'p str>,
    confirmation: Option<&str>,
) -> Option<&'p str> {
    let password = validator.required("password", password);
    validator.min_chars("password", password, 8);
    validator.max_chars("password", password, 72);
    validator.confirmed("password", password, confirmation.map(str::trim));

    password
}

/// The fields shared by registration and profile updates.
fn validate_profile<'f>(
    validator: &mut Validator,
    nickname: Option<&'f str>,
    email: Option<&'f str>,
    birthday: Option<&str>,
) -> (Option<&'f str>, Option<&'f str>, Option<Date>) {
    let nickname = validator.required("nickname", nickname);
    validator.max_chars("nickname", nickname, 30);

    let email = validator.required("email", email);
    validator.max_chars("email", email, 255);
    validator.format("email", email, email_pattern());

    let birthday = validator.date("birthday", birthday.filter(|b| !b.trim().is_empty()));

    (nickname, email, birthday)
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub login_id: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub birthday: Option<String>,
}

pub struct NewUser {
    pub login_id: String,
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub birthday: Option<Date>,
}

impl RegisterForm {
    pub async fn validate(self, pool: &SqlitePool) -> DaybookResult<NewUser> {
        let mut validator = Validator::new();

        let login_id = validator.required("login_id", self.login_id.as_deref());
        validator.min_chars("login_id", login_id, 4);
        validator.max_chars("login_id", login_id, 20);
        validator.format("login_id", login_id, login_id_pattern());
        if let Some(login_id) = login_id {
            validator.unique("login_id", User::login_id_taken(login_id, pool).await?);
        }

        let (nickname, email, birthday) = validate_profile(
            &mut validator,
            self.nickname.as_deref(),
            self.email.as_deref(),
            self.birthday.as_deref(),
        );
        if let Some(email) = email {
            validator.unique("email", User::email_taken(email, None, pool).await?);
        }

        let password = validate_password(
            &mut validator,
            self.password.as_deref(),
            self.password_confirmation.as_deref(),
        );

        let new_user = match (login_id, nickname, email, password) {
            (Some(login_id), Some(nickname), Some(email), Some(password)) => Some(NewUser {
                login_id: login_id.to_owned(),
                nickname: nickname.to_owned(),
                email: email.to_owned(),
                password: password.to_owned(),
                birthday,
            }),
            _ => None,
        };
        validator.finish()?;

        new_user.ok_or_else(|| DaybookError::BadRequest("invalid registration".to_owned()))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub login_id: Option<String>,
    pub password: Option<String>,
}

impl LoginForm {
    /// Returns the login id and password once both are present.
    pub fn validate(self) -> DaybookResult<(String, String)> {
        let mut validator = Validator::new();
        let login_id = validator.required("login_id", self.login_id.as_deref());
        let password = validator.required("password", self.password.as_deref());

        let credentials = login_id
            .zip(password)
            .map(|(login_id, password)| (login_id.to_owned(), password.to_owned()));
        validator.finish()?;

        credentials.ok_or_else(|| DaybookError::BadRequest("invalid login".to_owned()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub birthday: Option<String>,
}

pub struct ProfileUpdate {
    pub nickname: String,
    pub email: String,
    pub birthday: Option<Date>,
}

impl ProfileForm {
    pub async fn validate(self, user: &User, pool: &SqlitePool) -> DaybookResult<ProfileUpdate> {
        let mut validator = Validator::new();
        let (nickname, email, birthday) = validate_profile(
            &mut validator,
            self.nickname.as_deref(),
            self.email.as_deref(),
            self.birthday.as_deref(),
        );
        if let Some(email) = email {
            validator.unique("email", User::email_taken(email, Some(user.id), pool).await?);
        }

        let update = match (nickname, email) {
            (Some(nickname), Some(email)) => Some(ProfileUpdate {
                nickname: nickname.to_owned(),
                email: email.to_owned(),
                birthday,
            }),
            _ => None,
        };
        validator.finish()?;

        update.ok_or_else(|| DaybookError::BadRequest("invalid profile".to_owned()))
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeForm {
    pub current_password: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

impl PasswordChangeForm {
    /// Returns the new password once the current one has been verified.
    pub fn validate(self, user: &User) -> DaybookResult<String> {
        let mut validator = Validator::new();

        let current = validator.required("current_password", self.current_password.as_deref());
        if let Some(current) = current {
            if !user.password_matches(current)? {
                validator.fail(
                    "current_password",
                    "current_password",
                    "現在のパスワードが正しくありません。".to_owned(),
                );
            }
        }

        let password = validate_password(
            &mut validator,
            self.password.as_deref(),
            self.password_confirmation.as_deref(),
        )
        .map(str::to_owned);
        validator.finish()?;

        password.ok_or_else(|| DaybookError::BadRequest("invalid password".to_owned()))
    }
}

impl User {
    pub async fn with_id(id: i64, pool: &SqlitePool) -> DaybookResult<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or(DaybookError::NotFound("user"))
    }

    pub async fn with_id_opt(id: i64, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!("{} WHERE id = ?", SELECT_USER))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_login_id_opt(login_id: &str, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!("{} WHERE login_id = ?", SELECT_USER))
            .bind(login_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Finds a user that can still log in, by email.
    pub async fn active_with_email_opt(email: &str, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE email = ? AND status = 'normal'",
            SELECT_USER
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn login_id_taken(login_id: &str, pool: &SqlitePool) -> DaybookResult<bool> {
        Ok(Self::with_login_id_opt(login_id, pool).await?.is_some())
    }

    pub async fn email_taken(
        email: &str,
        except_user: Option<i64>,
        pool: &SqlitePool,
    ) -> DaybookResult<bool> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(owner.map_or(false, |owner| Some(owner) != except_user))
    }

    pub async fn register(new_user: NewUser, cost: u32, pool: &SqlitePool) -> DaybookResult<Self> {
        let hash = bcrypt::hash(&new_user.password, cost)?;
        let id = sqlx::query(
            "INSERT INTO users (login_id, nickname, email, pass_hash, birthday, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_user.login_id)
        .bind(&new_user.nickname)
        .bind(&new_user.email)
        .bind(hash)
        .bind(new_user.birthday)
        .bind(UserStatus::Normal)
        .bind(current_time())
        .execute(pool)
        .await
        .map_err(DaybookError::unique_violation("login id or email already taken"))?
        .last_insert_rowid();

        Self::with_id(id, pool).await
    }

    /// Checks a login id and password, returning the user they belong to.
    ///
    /// Logically deleted users are indistinguishable from unknown ones.
    pub async fn verify_login(
        login_id: &str,
        password: &str,
        pool: &SqlitePool,
    ) -> DaybookResult<Self> {
        let user = Self::with_login_id_opt(login_id, pool)
            .await?
            .filter(|user| user.status != UserStatus::Deleted)
            .ok_or(DaybookError::InvalidCredentials)?;

        if !user.password_matches(password)? {
            return Err(DaybookError::InvalidCredentials);
        }
        if user.status == UserStatus::Frozen {
            return Err(DaybookError::AccountFrozen);
        }

        Ok(user)
    }

    pub fn password_matches(&self, password: &str) -> DaybookResult<bool> {
        bcrypt::verify(password, &self.pass_hash).map_err(Into::into)
    }

    pub async fn update_profile(&self, update: ProfileUpdate, pool: &SqlitePool) -> DaybookResult<Self> {
        sqlx::query("UPDATE users SET nickname = ?, email = ?, birthday = ? WHERE id = ?")
            .bind(&update.nickname)
            .bind(&update.email)
            .bind(update.birthday)
            .bind(self.id)
            .execute(pool)
            .await
            .map_err(DaybookError::unique_violation("email already taken"))?;

        Self::with_id(self.id, pool).await
    }

    pub async fn set_password(
        user_id: i64,
        password: &str,
        cost: u32,
        conn: &mut SqliteConnection,
    ) -> DaybookResult<()> {
        let hash = bcrypt::hash(password, cost)?;
        sqlx::query("UPDATE users SET pass_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Changes the password and signs the user out everywhere.
    pub async fn change_password(&self, password: &str, cost: u32, pool: &SqlitePool) -> DaybookResult<()> {
        let mut transaction = pool.begin().await?;
        Self::set_password(self.id, password, cost, &mut transaction).await?;
        token::UserToken::revoke_for_user(self.id, &mut transaction).await?;
        transaction.commit().await?;

        Ok(())
    }

    /// Marks the user deleted and revokes every credential they hold.
    pub async fn mark_deleted(&self, pool: &SqlitePool) -> DaybookResult<()> {
        let mut transaction = pool.begin().await?;
        sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(UserStatus::Deleted)
            .bind(self.id)
            .execute(&mut transaction)
            .await?;
        token::UserToken::revoke_for_user(self.id, &mut transaction).await?;
        password_reset::PasswordReset::remove_for_user(self.id, &mut transaction).await?;
        transaction.commit().await?;

        Ok(())
    }
}
