//! Recurrence rules and their expansion into concrete occurrence times.
//!
//! A rule decides which calendar dates belong to it. Expanding a rule over a
//! `[start, end]` window yields one `(start, end)` pair per member date, with
//! the time of day copied from the window's own start and end.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Month, PrimitiveDateTime, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecurrenceType {
    None,
    Weekday,
    Weekend,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::None => "none",
            RecurrenceType::Weekday => "weekday",
            RecurrenceType::Weekend => "weekend",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Yearly => "yearly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        *self != RecurrenceType::None
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RecurrenceType::None),
            "weekday" => Ok(RecurrenceType::Weekday),
            "weekend" => Ok(RecurrenceType::Weekend),
            "weekly" => Ok(RecurrenceType::Weekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            "yearly" => Ok(RecurrenceType::Yearly),
            _ => Err(()),
        }
    }
}

/// A recurrence rule with its anchor.
///
/// Weekly days are indexed from Sunday (`0`) to Saturday (`6`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceRule {
    Weekday,
    Weekend,
    Weekly { days: BTreeSet<u8> },
    Monthly { day: u8 },
    Yearly { month: Month, day: u8 },
}

impl RecurrenceRule {
    /// A monthly rule, falling back to the start date's day when `day` is
    /// missing or not a day of the month.
    pub fn monthly(day: Option<i64>, start: Date) -> Self {
        let day = day
            .filter(|day| (1..=31).contains(day))
            .map(|day| day as u8)
            .unwrap_or_else(|| start.day());

        RecurrenceRule::Monthly { day }
    }

    /// A yearly rule from an `MM-DD` anchor, falling back to the start date's
    /// month and day when the anchor is missing or names no calendar day.
    pub fn yearly(anchor: Option<&str>, start: Date) -> Self {
        let (month, day) = anchor
            .and_then(parse_month_day)
            .unwrap_or_else(|| (start.month(), start.day()));

        RecurrenceRule::Yearly { month, day }
    }

    /// Rebuilds a rule from the type and anchor stored on an occurrence.
    pub fn from_stored(recurrence_type: RecurrenceType, anchor: Option<&str>) -> Option<Self> {
        match recurrence_type {
            RecurrenceType::None => None,
            RecurrenceType::Weekday => Some(RecurrenceRule::Weekday),
            RecurrenceType::Weekend => Some(RecurrenceRule::Weekend),
            RecurrenceType::Weekly => {
                let days = anchor?
                    .split(',')
                    .map(|day| day.trim().parse::<u8>().ok().filter(|day| *day < 7))
                    .collect::<Option<BTreeSet<u8>>>()?;
                Some(RecurrenceRule::Weekly { days })
            }
            RecurrenceType::Monthly => {
                let day = anchor?
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .filter(|day| (1..=31).contains(day))?;
                Some(RecurrenceRule::Monthly { day })
            }
            RecurrenceType::Yearly => {
                let (month, day) = parse_month_day(anchor?)?;
                Some(RecurrenceRule::Yearly { month, day })
            }
        }
    }

    pub fn recurrence_type(&self) -> RecurrenceType {
        match self {
            RecurrenceRule::Weekday => RecurrenceType::Weekday,
            RecurrenceRule::Weekend => RecurrenceType::Weekend,
            RecurrenceRule::Weekly { .. } => RecurrenceType::Weekly,
            RecurrenceRule::Monthly { .. } => RecurrenceType::Monthly,
            RecurrenceRule::Yearly { .. } => RecurrenceType::Yearly,
        }
    }

    /// The anchor stored alongside each occurrence, if the rule has one.
    pub fn anchor(&self) -> Option<String> {
        match self {
            RecurrenceRule::Weekday | RecurrenceRule::Weekend => None,
            RecurrenceRule::Weekly { days } => Some(
                days.iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            RecurrenceRule::Monthly { day } => Some(day.to_string()),
            RecurrenceRule::Yearly { month, day } => Some(format!("{:02}-{:02}", *month as u8, day)),
        }
    }

    /// Whether `date` belongs to this rule.
    pub fn matches(&self, date: Date) -> bool {
        match self {
            RecurrenceRule::Weekday => !is_weekend(date.weekday()),
            RecurrenceRule::Weekend => is_weekend(date.weekday()),
            RecurrenceRule::Weekly { days } => {
                days.contains(&date.weekday().number_days_from_sunday())
            }
            RecurrenceRule::Monthly { day } => date.day() == *day,
            RecurrenceRule::Yearly { month, day } => date.month() == *month && date.day() == *day,
        }
    }

    /// Every member date in `[first, last]`, in order.
    pub fn dates(&self, first: Date, last: Date) -> Vec<Date> {
        match self {
            RecurrenceRule::Weekday | RecurrenceRule::Weekend | RecurrenceRule::Weekly { .. } => {
                days_between(first, last)
                    .filter(|date| self.matches(*date))
                    .collect()
            }
            RecurrenceRule::Monthly { day } => months_between(first, last)
                .filter_map(|(year, month)| Date::from_calendar_date(year, month, *day).ok())
                .filter(|date| (first..=last).contains(date))
                .collect(),
            RecurrenceRule::Yearly { month, day } => (first.year()..=last.year())
                .filter_map(|year| Date::from_calendar_date(year, *month, *day).ok())
                .filter(|date| (first..=last).contains(date))
                .collect(),
        }
    }

    /// Expands the rule over `[start, end]`.
    ///
    /// Each occurrence starts on its date at `start`'s time of day and ends at
    /// `end`'s time of day, on the next day if that time is earlier. Only
    /// occurrences lying entirely within `[start, end]` are kept.
    pub fn expand(
        &self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Vec<(PrimitiveDateTime, PrimitiveDateTime)> {
        if end < start {
            return Vec::new();
        }

        let overnight = end.time() < start.time();
        self.dates(start.date(), end.date())
            .into_iter()
            .filter_map(|date| {
                let occurrence_start = PrimitiveDateTime::new(date, start.time());
                let end_date = if overnight { date.next_day()? } else { date };
                let occurrence_end = PrimitiveDateTime::new(end_date, end.time());

                (occurrence_start >= start && occurrence_end <= end)
                    .then(|| (occurrence_start, occurrence_end))
            })
            .collect()
    }
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Saturday | Weekday::Sunday)
}

/// Parses an `MM-DD` anchor, accepting any day that exists in a leap year.
pub fn parse_month_day(anchor: &str) -> Option<(Month, u8)> {
    let (month, day) = anchor.trim().split_once('-')?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    let day = day.parse::<u8>().ok()?;
    Date::from_calendar_date(2000, month, day).ok()?;

    Some((month, day))
}

fn days_between(first: Date, last: Date) -> impl Iterator<Item = Date> {
    std::iter::successors(Some(first), |date| date.next_day()).take_while(move |date| *date <= last)
}

fn months_between(first: Date, last: Date) -> impl Iterator<Item = (i32, Month)> {
    std::iter::successors(Some((first.year(), first.month())), |(year, month)| {
        let next_year = if *month == Month::December { year + 1 } else { *year };
        Some((next_year, month.next()))
    })
    .take_while(move |(year, month)| (*year, *month as u8) <= (last.year(), last.month() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn weekly(days: &[u8]) -> RecurrenceRule {
        RecurrenceRule::Weekly {
            days: days.iter().copied().collect(),
        }
    }

    #[test]
    fn weekday_expansion_covers_a_work_week() {
        let occurrences = RecurrenceRule::Weekday.expand(
            datetime!(2024-06-03 07:00),
            datetime!(2024-06-07 08:00),
        );

        assert_eq!(occurrences.len(), 5);
        for (offset, (start, end)) in occurrences.iter().enumerate() {
            let day = date!(2024 - 06 - 03) + time::Duration::days(offset as i64);
            assert_eq!(*start, day.with_hms(7, 0, 0).unwrap());
            assert_eq!(*end, day.with_hms(8, 0, 0).unwrap());
        }
    }

    #[test]
    fn weekday_and_weekend_partition_the_week() {
        let first = date!(2024 - 06 - 01);
        let last = date!(2024 - 06 - 30);
        let weekdays = RecurrenceRule::Weekday.dates(first, last);
        let weekends = RecurrenceRule::Weekend.dates(first, last);

        assert_eq!(weekdays.len() + weekends.len(), 30);
        assert!(weekdays.iter().all(|d| !is_weekend(d.weekday())));
        assert!(weekends.iter().all(|d| is_weekend(d.weekday())));
        assert_eq!(weekends.first(), Some(&date!(2024 - 06 - 01)));
    }

    #[test]
    fn weekly_mon_wed_fri_over_two_weeks() {
        let occurrences = weekly(&[1, 3, 5]).expand(
            datetime!(2024-06-02 18:00),
            datetime!(2024-06-15 19:00),
        );

        assert_eq!(occurrences.len(), 6);
        let weekdays: Vec<Weekday> = occurrences.iter().map(|(s, _)| s.weekday()).collect();
        assert_eq!(
            weekdays,
            vec![
                Weekday::Monday,
                Weekday::Wednesday,
                Weekday::Friday,
                Weekday::Monday,
                Weekday::Wednesday,
                Weekday::Friday,
            ]
        );
    }

    #[test]
    fn weekly_sunday_is_zero() {
        let dates = weekly(&[0]).dates(date!(2024 - 06 - 01), date!(2024 - 06 - 10));
        assert_eq!(dates, vec![date!(2024 - 06 - 02), date!(2024 - 06 - 09)]);
    }

    #[test]
    fn monthly_31st_skips_short_months() {
        let dates = RecurrenceRule::Monthly { day: 31 }
            .dates(date!(2024 - 01 - 15), date!(2024 - 07 - 31));

        assert_eq!(
            dates,
            vec![
                date!(2024 - 01 - 31),
                date!(2024 - 03 - 31),
                date!(2024 - 05 - 31),
                date!(2024 - 07 - 31),
            ]
        );
    }

    #[test]
    fn monthly_respects_range_edges() {
        let dates = RecurrenceRule::Monthly { day: 10 }
            .dates(date!(2024 - 01 - 15), date!(2024 - 03 - 09));
        assert_eq!(dates, vec![date!(2024 - 02 - 10)]);
    }

    #[test]
    fn monthly_crosses_year_boundary() {
        let dates = RecurrenceRule::Monthly { day: 1 }
            .dates(date!(2024 - 11 - 01), date!(2025 - 02 - 01));
        assert_eq!(dates.len(), 4);
        assert_eq!(dates.last(), Some(&date!(2025 - 02 - 01)));
    }

    #[test]
    fn monthly_anchor_falls_back_to_start_day() {
        let start = date!(2024 - 06 - 17);
        assert_eq!(RecurrenceRule::monthly(None, start), RecurrenceRule::Monthly { day: 17 });
        assert_eq!(RecurrenceRule::monthly(Some(0), start), RecurrenceRule::Monthly { day: 17 });
        assert_eq!(RecurrenceRule::monthly(Some(32), start), RecurrenceRule::Monthly { day: 17 });
        assert_eq!(RecurrenceRule::monthly(Some(5), start), RecurrenceRule::Monthly { day: 5 });
    }

    #[test]
    fn yearly_leap_day_only_in_leap_years() {
        let rule = RecurrenceRule::yearly(Some("02-29"), date!(2023 - 01 - 01));
        let dates = rule.dates(date!(2023 - 01 - 01), date!(2029 - 12 - 31));
        assert_eq!(dates, vec![date!(2024 - 02 - 29), date!(2028 - 02 - 29)]);
    }

    #[test]
    fn yearly_anchor_falls_back_to_start_month_day() {
        let start = date!(2024 - 06 - 15);
        let expected = RecurrenceRule::Yearly {
            month: Month::June,
            day: 15,
        };
        assert_eq!(RecurrenceRule::yearly(None, start), expected);
        assert_eq!(RecurrenceRule::yearly(Some("13-01"), start), expected);
        assert_eq!(RecurrenceRule::yearly(Some("02-30"), start), expected);
        assert_eq!(RecurrenceRule::yearly(Some("June 15"), start), expected);
    }

    #[test]
    fn yearly_excludes_anchor_before_start() {
        let rule = RecurrenceRule::Yearly {
            month: Month::March,
            day: 1,
        };
        let dates = rule.dates(date!(2024 - 06 - 01), date!(2026 - 06 - 01));
        assert_eq!(dates, vec![date!(2025 - 03 - 01), date!(2026 - 03 - 01)]);
    }

    #[test]
    fn overnight_window_rolls_end_to_next_day() {
        let occurrences = RecurrenceRule::Weekend.expand(
            datetime!(2024-06-07 22:00),
            datetime!(2024-06-10 02:00),
        );

        assert_eq!(
            occurrences,
            vec![
                (datetime!(2024-06-08 22:00), datetime!(2024-06-09 02:00)),
                (datetime!(2024-06-09 22:00), datetime!(2024-06-10 02:00)),
            ]
        );
    }

    #[test]
    fn end_before_start_expands_to_nothing() {
        let occurrences = RecurrenceRule::Weekday.expand(
            datetime!(2024-06-07 08:00),
            datetime!(2024-06-03 07:00),
        );
        assert!(occurrences.is_empty());
    }

    #[test]
    fn every_occurrence_satisfies_its_rule() {
        let start = datetime!(2024-01-01 09:30);
        let end = datetime!(2025-12-31 10:00);
        let rules = [
            RecurrenceRule::Weekday,
            RecurrenceRule::Weekend,
            weekly(&[0, 6]),
            RecurrenceRule::Monthly { day: 30 },
            RecurrenceRule::Yearly {
                month: Month::December,
                day: 25,
            },
        ];

        for rule in rules {
            let occurrences = rule.expand(start, end);
            assert!(!occurrences.is_empty(), "{:?} produced nothing", rule);
            for (occurrence_start, occurrence_end) in occurrences {
                assert!(rule.matches(occurrence_start.date()), "{:?}", rule);
                assert!(occurrence_start >= start && occurrence_end <= end);
            }
        }
    }

    #[test]
    fn anchors_round_trip_through_storage_format() {
        assert_eq!(weekly(&[5, 1, 3]).anchor().as_deref(), Some("1,3,5"));
        assert_eq!(RecurrenceRule::Monthly { day: 7 }.anchor().as_deref(), Some("7"));
        assert_eq!(
            RecurrenceRule::Yearly {
                month: Month::February,
                day: 9
            }
            .anchor()
            .as_deref(),
            Some("02-09")
        );
        assert_eq!(RecurrenceRule::Weekday.anchor(), None);
    }

    #[test]
    fn stored_anchors_rebuild_their_rule() {
        let rules = [
            RecurrenceRule::Weekend,
            weekly(&[0, 2, 4]),
            RecurrenceRule::Monthly { day: 31 },
            RecurrenceRule::Yearly {
                month: Month::February,
                day: 29,
            },
        ];

        for rule in rules {
            let anchor = rule.anchor();
            assert_eq!(
                RecurrenceRule::from_stored(rule.recurrence_type(), anchor.as_deref()),
                Some(rule)
            );
        }

        assert_eq!(RecurrenceRule::from_stored(RecurrenceType::Weekly, Some("1,9")), None);
        assert_eq!(RecurrenceRule::from_stored(RecurrenceType::Monthly, None), None);
        assert_eq!(RecurrenceRule::from_stored(RecurrenceType::None, None), None);
    }
}
