use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use time::{Date, PrimitiveDateTime, Time};

use crate::error::{DaybookError, DaybookResult};
use crate::models::tag::Tag;
use crate::recurrence::RecurrenceType;
use crate::util::{calendar_time, like_pattern};
use crate::validation::Validator;

pub mod occurrence;

/// How long before an event starts its reminder goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Notification {
    #[serde(rename = "none")]
    #[sqlx(rename = "none")]
    None,
    #[serde(rename = "10min")]
    #[sqlx(rename = "10min")]
    TenMinutes,
    #[serde(rename = "1hour")]
    #[sqlx(rename = "1hour")]
    OneHour,
}

impl FromStr for Notification {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Notification::None),
            "10min" => Ok(Notification::TenMinutes),
            "1hour" => Ok(Notification::OneHour),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Event {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub title: String,
    pub note: Option<String>,
    #[serde(with = "calendar_time")]
    pub start_time: PrimitiveDateTime,
    #[serde(with = "calendar_time::option")]
    pub end_time: Option<PrimitiveDateTime>,
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub notification: Notification,
    pub is_recurring: bool,
    pub recurrence_type: RecurrenceType,
    /// Null when the event was never tagged or its tag has been deleted
    pub tag_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EventForm {
    pub title: Option<String>,
    pub note: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub notification: Option<String>,
    pub is_recurring: Option<bool>,
    pub recurrence_type: Option<String>,
    pub tag_id: Option<i64>,
}

pub struct NewEvent {
    pub title: String,
    pub note: Option<String>,
    pub start_time: PrimitiveDateTime,
    pub end_time: Option<PrimitiveDateTime>,
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub notification: Notification,
    pub recurrence_type: RecurrenceType,
    pub tag_id: Option<i64>,
}

/// Drops blank optional strings so they are stored as null.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// The optional text fields shared by events and occurrences.
pub(crate) fn validate_details(
    validator: &mut Validator,
    location: Option<&str>,
    link: Option<&str>,
    note: Option<&str>,
) {
    validator.max_chars("location", location, 255);
    validator.max_chars("link", link, 2048);
    validator.max_chars("note", note, 2000);
}

/// Checks that a tag, if given, is one of the user's own.
pub(crate) async fn validate_tag(
    validator: &mut Validator,
    user_id: i64,
    tag_id: Option<i64>,
    pool: &SqlitePool,
) -> DaybookResult<()> {
    if let Some(tag_id) = tag_id {
        if !Tag::belongs_to(user_id, tag_id, pool).await? {
            validator.not_in("tag_id");
        }
    }

    Ok(())
}

impl EventForm {
    pub async fn validate(self, user_id: i64, pool: &SqlitePool) -> DaybookResult<NewEvent> {
        let mut validator = Validator::new();

        let title = validator.required("title", self.title.as_deref());
        validator.max_chars("title", title, 255);

        let start_time = validator
            .required("start_time", self.start_time.as_deref())
            .and_then(|start| validator.datetime("start_time", Some(start)));
        let end_time = validator.datetime(
            "end_time",
            self.end_time.as_deref().filter(|end| !end.trim().is_empty()),
        );
        validator.after_or_equal("end_time", end_time, "start_time", start_time);

        validate_details(
            &mut validator,
            self.location.as_deref(),
            self.link.as_deref(),
            self.note.as_deref(),
        );

        let notification = validator
            .one_of("notification", self.notification.as_deref())
            .unwrap_or(Notification::None);
        let recurrence_type = validator
            .one_of("recurrence_type", self.recurrence_type.as_deref())
            .unwrap_or(RecurrenceType::None);
        if let Some(is_recurring) = self.is_recurring {
            if is_recurring != recurrence_type.is_recurring() {
                validator.not_in("is_recurring");
            }
        }
        validate_tag(&mut validator, user_id, self.tag_id, pool).await?;

        let title = title.map(str::to_owned);
        validator.finish()?;

        match (title, start_time) {
            (Some(title), Some(start_time)) => Ok(NewEvent {
                title,
                note: non_blank(self.note),
                start_time,
                end_time,
                all_day: self.all_day,
                location: non_blank(self.location),
                link: non_blank(self.link),
                notification,
                recurrence_type,
                tag_id: self.tag_id,
            }),
            _ => Err(DaybookError::BadRequest("invalid event".to_owned())),
        }
    }
}

/// Query-string filters for listing events and occurrences.
#[derive(Debug, Default, Deserialize)]
pub struct CalendarFilterParams {
    pub title: Option<String>,
    /// Comma-separated tag ids
    pub tag_ids: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Whether to include untagged items; defaults to true
    pub untagged: Option<bool>,
    #[serde(rename = "type")]
    pub recurrence_type: Option<String>,
    pub event_id: Option<i64>,
}

#[derive(Debug, Default, PartialEq)]
pub struct CalendarFilter {
    pub title: Option<String>,
    pub tag_ids: Vec<i64>,
    pub from: Option<Date>,
    pub to: Option<Date>,
    pub include_untagged: bool,
    pub recurrence_type: Option<RecurrenceType>,
    pub event_id: Option<i64>,
}

impl CalendarFilterParams {
    pub fn validate(self) -> DaybookResult<CalendarFilter> {
        let mut validator = Validator::new();

        let tag_ids = self
            .tag_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| id.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_else(|_| {
                validator.not_in("tag_id");
                Vec::new()
            });
        let from = validator.date("from", self.from.as_deref());
        let to = validator.date("to", self.to.as_deref());
        validator.after_or_equal("to", to, "from", from);
        let recurrence_type = validator.one_of("type", self.recurrence_type.as_deref());
        validator.finish()?;

        Ok(CalendarFilter {
            title: non_blank(self.title),
            tag_ids,
            from,
            to,
            include_untagged: self.untagged.unwrap_or(true),
            recurrence_type,
            event_id: self.event_id,
        })
    }
}

impl CalendarFilter {
    /// Appends `AND ...` conditions for this filter. `end_column` is the
    /// expression for when a row ends.
    pub(crate) fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>, end_column: &str) {
        if let Some(title) = &self.title {
            query.push(" AND title LIKE ");
            query.push_bind(like_pattern(title));
            query.push(" ESCAPE '\\'");
        }

        if !self.tag_ids.is_empty() {
            query.push(" AND (tag_id IN (");
            let mut ids = query.separated(", ");
            for id in &self.tag_ids {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
            if self.include_untagged {
                query.push(" OR tag_id IS NULL");
            }
            query.push(")");
        } else if !self.include_untagged {
            query.push(" AND tag_id IS NOT NULL");
        }

        if let Some(from) = self.from {
            query.push(format!(" AND {} >= ", end_column));
            query.push_bind(PrimitiveDateTime::new(from, Time::MIDNIGHT));
        }
        if let Some(to) = self.to.and_then(|to| to.next_day()) {
            query.push(" AND start_time < ");
            query.push_bind(PrimitiveDateTime::new(to, Time::MIDNIGHT));
        }

        if let Some(recurrence_type) = self.recurrence_type {
            query.push(" AND recurrence_type = ");
            query.push_bind(recurrence_type);
        }
    }
}

impl Event {
    pub async fn with_id(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<Self> {
        Self::with_id_opt(user_id, id, pool)
            .await?
            .ok_or(DaybookError::NotFound("event"))
    }

    pub async fn with_id_opt(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM events WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn for_user(
        user_id: i64,
        filter: &CalendarFilter,
        pool: &SqlitePool,
    ) -> DaybookResult<Vec<Self>> {
        let mut query = QueryBuilder::new("SELECT * FROM events WHERE user_id = ");
        query.push_bind(user_id);
        filter.push_conditions(&mut query, "COALESCE(end_time, start_time)");
        query.push(" ORDER BY start_time, id");

        query
            .build_query_as::<Self>()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn create(user_id: i64, new_event: NewEvent, pool: &SqlitePool) -> DaybookResult<Self> {
        let id = sqlx::query(
            "INSERT INTO events
                 (user_id, title, note, start_time, end_time, all_day, location, link,
                  notification, is_recurring, recurrence_type, tag_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&new_event.title)
        .bind(&new_event.note)
        .bind(new_event.start_time)
        .bind(new_event.end_time)
        .bind(new_event.all_day)
        .bind(&new_event.location)
        .bind(&new_event.link)
        .bind(new_event.notification)
        .bind(new_event.recurrence_type.is_recurring())
        .bind(new_event.recurrence_type)
        .bind(new_event.tag_id)
        .execute(pool)
        .await?
        .last_insert_rowid();

        Self::with_id(user_id, id, pool).await
    }

    pub async fn update(&self, new_event: NewEvent, pool: &SqlitePool) -> DaybookResult<Self> {
        sqlx::query(
            "UPDATE events SET
                 title = ?, note = ?, start_time = ?, end_time = ?, all_day = ?, location = ?,
                 link = ?, notification = ?, is_recurring = ?, recurrence_type = ?, tag_id = ?
             WHERE id = ?",
        )
        .bind(&new_event.title)
        .bind(&new_event.note)
        .bind(new_event.start_time)
        .bind(new_event.end_time)
        .bind(new_event.all_day)
        .bind(&new_event.location)
        .bind(&new_event.link)
        .bind(new_event.notification)
        .bind(new_event.recurrence_type.is_recurring())
        .bind(new_event.recurrence_type)
        .bind(new_event.tag_id)
        .bind(self.id)
        .execute(pool)
        .await?;

        Self::with_id(self.user_id, self.id, pool).await
    }

    /// Deletes the event. Its occurrences are removed with it.
    pub async fn delete(&self, pool: &SqlitePool) -> DaybookResult<()> {
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(self.id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Deletes every occurrence of the event and then the event itself, as
    /// one unit. Returns how many occurrences were removed.
    pub async fn delete_with_occurrences(&self, pool: &SqlitePool) -> DaybookResult<u64> {
        let mut transaction = pool.begin().await?;

        let removed = occurrence::Occurrence::delete_for_event(self.id, &mut transaction).await?;
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM occurrences WHERE event_id = ?")
            .bind(self.id)
            .fetch_one(&mut transaction)
            .await?;
        if remaining != 0 {
            return Err(DaybookError::Internal(anyhow::anyhow!(
                "{} occurrences of event {} survived deletion",
                remaining,
                self.id
            )));
        }

        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(self.id)
            .execute(&mut transaction)
            .await?;
        transaction.commit().await?;

        Ok(removed)
    }
}
