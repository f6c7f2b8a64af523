use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::{DaybookError, DaybookResult};
use crate::validation::Validator;

pub const MAX_NAME_LENGTH: usize = 15;
pub const MAX_COLOR_LENGTH: usize = 7;

/// A user's label for events, shown in the given color.
///
/// Deleting a tag leaves the events and occurrences that used it in place
/// with their `tag_id` set to null.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tag {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub name: String,
    /// A hex color, e.g. `#1e90ff`
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct TagForm {
    pub name: Option<String>,
    pub color: Option<String>,
}

pub struct NewTag {
    pub name: String,
    pub color: String,
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color pattern")
    })
}

impl TagForm {
    /// Validates the form for `user_id`. `existing` is the tag being
    /// updated, which may keep its own name.
    pub async fn validate(
        self,
        user_id: i64,
        existing: Option<i64>,
        pool: &SqlitePool,
    ) -> DaybookResult<NewTag> {
        let mut validator = Validator::new();

        let name = validator.required("name", self.name.as_deref());
        validator.max_chars("name", name, MAX_NAME_LENGTH);
        if let Some(name) = name {
            validator.unique("name", Tag::name_taken(user_id, name, existing, pool).await?);
        }

        let color = validator.required("color", self.color.as_deref());
        validator.max_chars("color", color, MAX_COLOR_LENGTH);
        if !validator.has("color", "max") {
            validator.format("color", color, color_pattern());
        }

        let new_tag = name.zip(color).map(|(name, color)| NewTag {
            name: name.to_owned(),
            color: color.to_owned(),
        });
        validator.finish()?;

        new_tag.ok_or_else(|| DaybookError::BadRequest("invalid tag".to_owned()))
    }
}

impl Tag {
    pub async fn for_user(user_id: i64, pool: &SqlitePool) -> DaybookResult<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tags WHERE user_id = ? ORDER BY name")
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_id(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<Self> {
        Self::with_id_opt(user_id, id, pool)
            .await?
            .ok_or(DaybookError::NotFound("tag"))
    }

    pub async fn with_id_opt(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tags WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Whether `id` names one of `user_id`'s tags.
    pub async fn belongs_to(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<bool> {
        Ok(Self::with_id_opt(user_id, id, pool).await?.is_some())
    }

    pub async fn name_taken(
        user_id: i64,
        name: &str,
        except: Option<i64>,
        pool: &SqlitePool,
    ) -> DaybookResult<bool> {
        let owner: Option<i64> =
            sqlx::query_scalar("SELECT id FROM tags WHERE user_id = ? AND name = ?")
                .bind(user_id)
                .bind(name)
                .fetch_optional(pool)
                .await?;

        Ok(owner.map_or(false, |owner| Some(owner) != except))
    }

    pub async fn create(user_id: i64, new_tag: NewTag, pool: &SqlitePool) -> DaybookResult<Self> {
        let id = sqlx::query("INSERT INTO tags (user_id, name, color) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&new_tag.name)
            .bind(&new_tag.color)
            .execute(pool)
            .await
            .map_err(DaybookError::unique_violation("tag name already taken"))?
            .last_insert_rowid();

        Self::with_id(user_id, id, pool).await
    }

    pub async fn update(&self, new_tag: NewTag, pool: &SqlitePool) -> DaybookResult<Self> {
        sqlx::query("UPDATE tags SET name = ?, color = ? WHERE id = ?")
            .bind(&new_tag.name)
            .bind(&new_tag.color)
            .bind(self.id)
            .execute(pool)
            .await
            .map_err(DaybookError::unique_violation("tag name already taken"))?;

        Self::with_id(self.user_id, self.id, pool).await
    }

    pub async fn delete(&self, pool: &SqlitePool) -> DaybookResult<()> {
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(self.id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
