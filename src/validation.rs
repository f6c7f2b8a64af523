//! Per-field request validation.
//!
//! Validation runs before anything is persisted. Each failure carries a
//! machine-readable rule `code` and a Japanese `description` for display.

use std::collections::BTreeMap;
use std::str::FromStr;

use regex::Regex;
use serde::Serialize;
use time::{Date, PrimitiveDateTime};

use crate::error::{DaybookError, DaybookResult};
use crate::util::{parse_date, parse_datetime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub code: &'static str,
    pub description: String,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<FieldError>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, code: &'static str, description: String) {
        self.0
            .entry(field)
            .or_default()
            .push(FieldError { code, description });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str, code: &str) -> bool {
        self.0
            .get(field)
            .map(|errors| errors.iter().any(|error| error.code == code))
            .unwrap_or(false)
    }
}

/// The display name of a request field.
fn label(field: &str) -> &str {
    match field {
        "login_id" => "ログインID",
        "nickname" => "ニックネーム",
        "email" => "メールアドレス",
        "password" => "パスワード",
        "current_password" => "現在のパスワード",
        "birthday" => "誕生日",
        "token" => "トークン",
        "title" => "タイトル",
        "note" => "メモ",
        "start_time" => "開始日時",
        "end_time" => "終了日時",
        "location" => "場所",
        "link" => "リンク",
        "notification" => "通知",
        "recurrence_type" => "繰り返し",
        "recurrence_days" => "繰り返す曜日",
        "recurrence_date" => "繰り返す日付",
        "is_recurring" => "繰り返しフラグ",
        "event_id" => "予定",
        "tag_id" => "タグ",
        "name" => "名前",
        "color" => "色",
        "achieved_on" => "達成日",
        "from" => "表示開始日",
        "to" => "表示終了日",
        "type" => "繰り返しの種類",
        other => other,
    }
}

/// Collects field errors for one request.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &'static str, code: &'static str, description: String) {
        self.errors.add(field, code, description);
    }

    pub fn required<'v>(&mut self, field: &'static str, value: Option<&'v str>) -> Option<&'v str> {
        match value.map(str::trim) {
            Some(value) if !value.is_empty() => Some(value),
            _ => {
                self.fail(field, "required", format!("{}は必須です。", label(field)));
                None
            }
        }
    }

    pub fn max_chars(&mut self, field: &'static str, value: Option<&str>, max: usize) {
        if value.map_or(false, |value| value.chars().count() > max) {
            self.fail(
                field,
                "max",
                format!("{}は{}文字以内で入力してください。", label(field), max),
            );
        }
    }

    pub fn min_chars(&mut self, field: &'static str, value: Option<&str>, min: usize) {
        if value.map_or(false, |value| value.chars().count() < min) {
            self.fail(
                field,
                "min",
                format!("{}は{}文字以上で入力してください。", label(field), min),
            );
        }
    }

    pub fn format(&mut self, field: &'static str, value: Option<&str>, pattern: &Regex) {
        if value.map_or(false, |value| !pattern.is_match(value)) {
            self.fail(
                field,
                "format",
                format!("{}の形式が正しくありません。", label(field)),
            );
        }
    }

    pub fn datetime(&mut self, field: &'static str, value: Option<&str>) -> Option<PrimitiveDateTime> {
        let value = value?;
        let parsed = parse_datetime(value);
        if parsed.is_none() {
            self.fail(
                field,
                "date",
                format!("{}は正しい日時ではありません。", label(field)),
            );
        }

        parsed
    }

    pub fn date(&mut self, field: &'static str, value: Option<&str>) -> Option<Date> {
        let value = value?;
        let parsed = parse_date(value);
        if parsed.is_none() {
            self.fail(
                field,
                "date",
                format!("{}は正しい日付ではありません。", label(field)),
            );
        }

        parsed
    }

    /// Parses one of a fixed set of values, e.g. an enum with a `FromStr` impl.
    pub fn one_of<T: FromStr>(&mut self, field: &'static str, value: Option<&str>) -> Option<T> {
        let value = value?;
        let parsed = value.parse().ok();
        if parsed.is_none() {
            self.not_in(field);
        }

        parsed
    }

    pub fn not_in(&mut self, field: &'static str) {
        self.fail(
            field,
            "in",
            format!("選択された{}は正しくありません。", label(field)),
        );
    }

    pub fn after_or_equal<T: PartialOrd>(
        &mut self,
        field: &'static str,
        value: Option<T>,
        other_field: &'static str,
        other: Option<T>,
    ) {
        if let (Some(value), Some(other)) = (value, other) {
            if value < other {
                self.fail(
                    field,
                    "after_or_equal",
                    format!(
                        "{}は{}以降の日時を指定してください。",
                        label(field),
                        label(other_field)
                    ),
                );
            }
        }
    }

    pub fn confirmed(&mut self, field: &'static str, value: Option<&str>, confirmation: Option<&str>) {
        if value.is_some() && value != confirmation {
            self.fail(
                field,
                "confirmed",
                format!("{}と確認用の値が一致しません。", label(field)),
            );
        }
    }

    pub fn unique(&mut self, field: &'static str, taken: bool) {
        if taken {
            self.fail(
                field,
                "unique",
                format!("その{}は既に使用されています。", label(field)),
            );
        }
    }

    pub fn between(&mut self, field: &'static str, value: i64, min: i64, max: i64) -> bool {
        let valid = (min..=max).contains(&value);
        if !valid {
            self.fail(
                field,
                "between",
                format!("{}は{}から{}の間で指定してください。", label(field), min, max),
            );
        }

        valid
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has(&self, field: &str, code: &str) -> bool {
        self.errors.has(field, code)
    }

    /// Returns the collected errors, if any, as a 422.
    pub fn finish(self) -> DaybookResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DaybookError::Validation(self.errors))
        }
    }
}
