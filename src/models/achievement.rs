use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::Date;

use crate::error::{DaybookError, DaybookResult};
use crate::util::{calendar_date, current_time};
use crate::validation::Validator;

pub const MAX_TITLE_LENGTH: usize = 50;

/// How many times a user has achieved something, e.g. "Went to the gym".
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Achievement {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub title: String,
    pub count: i64,
    #[serde(with = "calendar_date")]
    pub last_achieved_on: Date,
}

#[derive(Debug, Deserialize)]
pub struct AchievementForm {
    pub title: Option<String>,
    /// Defaults to today
    pub achieved_on: Option<String>,
}

pub struct NewAchievement {
    pub title: String,
    pub achieved_on: Date,
}

impl AchievementForm {
    pub fn validate(self) -> DaybookResult<NewAchievement> {
        let mut validator = Validator::new();

        let title = validator.required("title", self.title.as_deref());
        validator.max_chars("title", title, MAX_TITLE_LENGTH);
        let achieved_on = validator.date(
            "achieved_on",
            self.achieved_on.as_deref().filter(|on| !on.trim().is_empty()),
        );

        let title = title.map(str::to_owned);
        validator.finish()?;

        title
            .map(|title| NewAchievement {
                title,
                achieved_on: achieved_on.unwrap_or_else(|| current_time().date()),
            })
            .ok_or_else(|| DaybookError::BadRequest("invalid achievement".to_owned()))
    }
}

impl Achievement {
    pub async fn for_user(user_id: i64, pool: &SqlitePool) -> DaybookResult<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM achievements WHERE user_id = ? ORDER BY title")
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_id(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<Self> {
        sqlx::query_as::<_, Self>("SELECT * FROM achievements WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(DaybookError::NotFound("achievement"))
    }

    /// Counts one more achievement of `title`, starting a new counter if
    /// this is the first.
    pub async fn record(
        user_id: i64,
        new_achievement: NewAchievement,
        pool: &SqlitePool,
    ) -> DaybookResult<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO achievements (user_id, title, count, last_achieved_on)
             VALUES (?, ?, 1, ?)
             ON CONFLICT (user_id, title) DO UPDATE SET
                 count = count + 1,
                 last_achieved_on = MAX(last_achieved_on, excluded.last_achieved_on)
             RETURNING *",
        )
        .bind(user_id)
        .bind(&new_achievement.title)
        .bind(new_achievement.achieved_on)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn delete(&self, pool: &SqlitePool) -> DaybookResult<()> {
        sqlx::query("DELETE FROM achievements WHERE id = ?")
            .bind(self.id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn achieved_on_is_optional() {
        let achievement = AchievementForm {
            title: Some(" Gym ".to_owned()),
            achieved_on: Some("2024-06-03".to_owned()),
        }
        .validate()
        .unwrap();
        assert_eq!(achievement.title, "Gym");
        assert_eq!(achievement.achieved_on, date!(2024 - 06 - 03));

        let achievement = AchievementForm {
            title: Some("Gym".to_owned()),
            achieved_on: None,
        }
        .validate()
        .unwrap();
        assert_eq!(achievement.achieved_on, current_time().date());
    }

    #[test]
    fn long_titles_are_rejected() {
        let result = AchievementForm {
            title: Some("x".repeat(MAX_TITLE_LENGTH + 1)),
            achieved_on: None,
        }
        .validate();

        match result {
            Err(DaybookError::Validation(errors)) => assert!(errors.has("title", "max")),
            other => panic!("expected validation error, got {:?}", other.map(|a| a.title)),
        }
    }
}
