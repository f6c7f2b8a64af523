//! Date and time helpers shared by the models and the routes.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// The wall-clock format used for event times, e.g. `2024-06-03T07:00`.
pub const DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");
const DATETIME_WITH_SECONDS_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(
    pub calendar_time,
    PrimitiveDateTime,
    "[year]-[month]-[day]T[hour]:[minute]"
);
time::serde::format_description!(pub calendar_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(
    pub timestamp,
    OffsetDateTime,
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn parse_datetime(input: &str) -> Option<PrimitiveDateTime> {
    let input = input.trim();
    PrimitiveDateTime::parse(input, DATETIME_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(input, DATETIME_WITH_SECONDS_FORMAT))
        .ok()
}

pub fn parse_date(input: &str) -> Option<Date> {
    Date::parse(input.trim(), DATE_FORMAT).ok()
}

/// Escapes `%`, `_` and `\` so user input can be used inside a `LIKE ... ESCAPE '\'` pattern.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');

    pattern
}
