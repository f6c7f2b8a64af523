use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, SqliteConnection, SqlitePool};
use time::{Duration, PrimitiveDateTime};

use crate::error::{DaybookError, DaybookResult};
use crate::models::event::{non_blank, validate_details, validate_tag, CalendarFilter, Event};
use crate::recurrence::{RecurrenceRule, RecurrenceType};
use crate::util::calendar_time;
use crate::validation::Validator;

/// The longest window a single expansion may cover, about ten years.
pub const MAX_EXPANSION_DAYS: i64 = 3660;

/// One dated instance of a recurring event.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Occurrence {
    pub id: i64,
    pub event_id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub title: String,
    pub note: Option<String>,
    #[serde(with = "calendar_time")]
    pub start_time: PrimitiveDateTime,
    #[serde(with = "calendar_time")]
    pub end_time: PrimitiveDateTime,
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub tag_id: Option<i64>,
    pub recurrence_type: RecurrenceType,
    /// `"1,3,5"` for weekly, `"31"` for monthly, `"06-15"` for yearly
    pub recurrence_anchor: Option<String>,
}

/// A request to materialize occurrences of an event over a time window.
#[derive(Debug, Deserialize)]
pub struct ExpansionForm {
    pub event_id: Option<i64>,
    pub title: Option<String>,
    pub note: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub tag_id: Option<i64>,
    /// Weekdays for weekly events, `0` (Sunday) through `6` (Saturday)
    pub recurrence_days: Option<Vec<i64>>,
    /// A day of the month for monthly events, or `MM-DD` for yearly ones
    pub recurrence_date: Option<Value>,
}

pub struct Expansion {
    pub event_id: i64,
    pub title: String,
    pub note: Option<String>,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub tag_id: Option<i64>,
    pub rule: RecurrenceRule,
}

impl Expansion {
    pub fn occurrence_times(&self) -> Vec<(PrimitiveDateTime, PrimitiveDateTime)> {
        self.rule.expand(self.start_time, self.end_time)
    }
}

/// Reads a monthly anchor given either as a number or a numeric string.
fn day_of_month(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64(),
        Value::String(day) => day.trim().parse().ok(),
        _ => None,
    }
}

impl ExpansionForm {
    pub async fn validate(
        self,
        recurrence_type: RecurrenceType,
        user_id: i64,
        pool: &SqlitePool,
    ) -> DaybookResult<Expansion> {
        let mut validator = Validator::new();

        match self.event_id {
            None => validator.fail("event_id", "required", "予定は必須です。".to_owned()),
            Some(event_id) => {
                let event = Event::with_id_opt(user_id, event_id, pool).await?;
                if event.map_or(true, |event| event.recurrence_type != recurrence_type) {
                    validator.not_in("event_id");
                }
            }
        }

        let title = validator.required("title", self.title.as_deref());
        validator.max_chars("title", title, 255);

        let start_time = validator
            .required("start_time", self.start_time.as_deref())
            .and_then(|start| validator.datetime("start_time", Some(start)));
        let end_time = match self.end_time.as_deref().filter(|end| !end.trim().is_empty()) {
            Some(end) => validator.datetime("end_time", Some(end)),
            None => start_time,
        };
        validator.after_or_equal("end_time", end_time, "start_time", start_time);
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end - start > Duration::days(MAX_EXPANSION_DAYS) {
                validator.fail(
                    "end_time",
                    "max",
                    "終了日時は開始日時から10年以内で指定してください。".to_owned(),
                );
            }
        }

        validate_details(
            &mut validator,
            self.location.as_deref(),
            self.link.as_deref(),
            self.note.as_deref(),
        );
        validate_tag(&mut validator, user_id, self.tag_id, pool).await?;

        let rule = match recurrence_type {
            RecurrenceType::None => {
                validator.not_in("recurrence_type");
                None
            }
            RecurrenceType::Weekday => Some(RecurrenceRule::Weekday),
            RecurrenceType::Weekend => Some(RecurrenceRule::Weekend),
            RecurrenceType::Weekly => {
                let days = self.recurrence_days.unwrap_or_default();
                if days.is_empty() {
                    validator.fail(
                        "recurrence_days",
                        "required",
                        "繰り返す曜日は必須です。".to_owned(),
                    );
                }
                let valid = days
                    .iter()
                    .all(|day| validator.between("recurrence_days", *day, 0, 6));
                (valid && !days.is_empty()).then(|| RecurrenceRule::Weekly {
                    days: days.into_iter().map(|day| day as u8).collect(),
                })
            }
            RecurrenceType::Monthly => start_time.map(|start| {
                RecurrenceRule::monthly(day_of_month(self.recurrence_date.as_ref()), start.date())
            }),
            RecurrenceType::Yearly => start_time.map(|start| {
                RecurrenceRule::yearly(
                    self.recurrence_date.as_ref().and_then(Value::as_str),
                    start.date(),
                )
            }),
        };

        let title = title.map(str::to_owned);
        validator.finish()?;

        match (self.event_id, title, start_time, end_time, rule) {
            (Some(event_id), Some(title), Some(start_time), Some(end_time), Some(rule)) => {
                Ok(Expansion {
                    event_id,
                    title,
                    note: non_blank(self.note),
                    start_time,
                    end_time,
                    all_day: self.all_day,
                    location: non_blank(self.location),
                    link: non_blank(self.link),
                    tag_id: self.tag_id,
                    rule,
                })
            }
            _ => Err(DaybookError::BadRequest("invalid recurrence".to_owned())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OccurrenceForm {
    pub title: Option<String>,
    pub note: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub tag_id: Option<i64>,
}

pub struct OccurrenceUpdate {
    pub title: String,
    pub note: Option<String>,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub all_day: bool,
    pub location: Option<String>,
    pub link: Option<String>,
    pub tag_id: Option<i64>,
}

impl OccurrenceForm {
    /// Validates an edit of `occurrence`. The new start date must still
    /// belong to the occurrence's recurrence rule.
    pub async fn validate(
        self,
        occurrence: &Occurrence,
        pool: &SqlitePool,
    ) -> DaybookResult<OccurrenceUpdate> {
        let mut validator = Validator::new();

        let title = validator.required("title", self.title.as_deref());
        validator.max_chars("title", title, 255);

        let start_time = validator
            .required("start_time", self.start_time.as_deref())
            .and_then(|start| validator.datetime("start_time", Some(start)));
        let end_time = validator
            .required("end_time", self.end_time.as_deref())
            .and_then(|end| validator.datetime("end_time", Some(end)));
        validator.after_or_equal("end_time", end_time, "start_time", start_time);

        if let Some(start_time) = start_time {
            let rule = RecurrenceRule::from_stored(
                occurrence.recurrence_type,
                occurrence.recurrence_anchor.as_deref(),
            );
            if !rule.map_or(false, |rule| rule.matches(start_time.date())) {
                validator.not_in("start_time");
            }
        }

        validate_details(
            &mut validator,
            self.location.as_deref(),
            self.link.as_deref(),
            self.note.as_deref(),
        );
        validate_tag(&mut validator, occurrence.user_id, self.tag_id, pool).await?;

        let title = title.map(str::to_owned);
        validator.finish()?;

        match (title, start_time, end_time) {
            (Some(title), Some(start_time), Some(end_time)) => Ok(OccurrenceUpdate {
                title,
                note: non_blank(self.note),
                start_time,
                end_time,
                all_day: self.all_day,
                location: non_blank(self.location),
                link: non_blank(self.link),
                tag_id: self.tag_id,
            }),
            _ => Err(DaybookError::BadRequest("invalid occurrence".to_owned())),
        }
    }
}

impl Occurrence {
    pub async fn with_id(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<Self> {
        Self::with_id_opt(user_id, id, pool)
            .await?
            .ok_or(DaybookError::NotFound("occurrence"))
    }

    pub async fn with_id_opt(user_id: i64, id: i64, pool: &SqlitePool) -> DaybookResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM occurrences WHERE id = ? AND user_id = ?")
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
        let mut query = QueryBuilder::new("SELECT * FROM occurrences WHERE user_id = ");
        query.push_bind(user_id);
        if let Some(event_id) = filter.event_id {
            query.push(" AND event_id = ");
            query.push_bind(event_id);
        }
        filter.push_conditions(&mut query, "end_time");
        query.push(" ORDER BY start_time, id");

        query
            .build_query_as::<Self>()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Stores every occurrence of `expansion`, or none of them if any
    /// insert fails.
    pub async fn create_for_expansion(
        user_id: i64,
        expansion: Expansion,
        pool: &SqlitePool,
    ) -> DaybookResult<Vec<Self>> {
        let recurrence_type = expansion.rule.recurrence_type();
        let recurrence_anchor = expansion.rule.anchor();
        let mut occurrences = Vec::new();

        let mut transaction = pool.begin().await?;
        for (start_time, end_time) in expansion.occurrence_times() {
            let id = sqlx::query(
                "INSERT INTO occurrences
                     (event_id, user_id, title, note, start_time, end_time, all_day, location,
                      link, tag_id, recurrence_type, recurrence_anchor)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(expansion.event_id)
            .bind(user_id)
            .bind(&expansion.title)
            .bind(&expansion.note)
            .bind(start_time)
            .bind(end_time)
            .bind(expansion.all_day)
            .bind(&expansion.location)
            .bind(&expansion.link)
            .bind(expansion.tag_id)
            .bind(recurrence_type)
            .bind(&recurrence_anchor)
            .execute(&mut transaction)
            .await?
            .last_insert_rowid();

            occurrences.push(Self {
                id,
                event_id: expansion.event_id,
                user_id,
                title: expansion.title.clone(),
                note: expansion.note.clone(),
                start_time,
                end_time,
                all_day: expansion.all_day,
                location: expansion.location.clone(),
                link: expansion.link.clone(),
                tag_id: expansion.tag_id,
                recurrence_type,
                recurrence_anchor: recurrence_anchor.clone(),
            });
        }
        transaction.commit().await?;

        tracing::info!(
            user_id,
            event_id = expansion.event_id,
            %recurrence_type,
            count = occurrences.len(),
            "expanded recurring event"
        );

        Ok(occurrences)
    }

    pub async fn update(&self, update: OccurrenceUpdate, pool: &SqlitePool) -> DaybookResult<Self> {
        sqlx::query(
            "UPDATE occurrences SET
                 title = ?, note = ?, start_time = ?, end_time = ?, all_day = ?, location = ?,
                 link = ?, tag_id = ?
             WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.note)
        .bind(update.start_time)
        .bind(update.end_time)
        .bind(update.all_day)
        .bind(&update.location)
        .bind(&update.link)
        .bind(update.tag_id)
        .bind(self.id)
        .execute(pool)
        .await?;

        Self::with_id(self.user_id, self.id, pool).await
    }

    pub async fn delete(&self, pool: &SqlitePool) -> DaybookResult<()> {
        sqlx::query("DELETE FROM occurrences WHERE id = ?")
            .bind(self.id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Deletes every occurrence of an event, returning how many there were.
    pub async fn delete_for_event(event_id: i64, conn: &mut SqliteConnection) -> DaybookResult<u64> {
        let result = sqlx::query("DELETE FROM occurrences WHERE event_id = ?")
            .bind(event_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
