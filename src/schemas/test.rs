use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime, PrimitiveDateTime};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TestCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    #[serde(alias = "timeLimitMinutes")]
    #[validate(range(min = 1, message = "time_limit_minutes must be positive"))]
    pub(crate) time_limit_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TestResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseTestBindingCreate {
    #[serde(alias = "testId")]
    #[validate(length(min = 1, message = "test_id must not be empty"))]
    pub(crate) test_id: String,
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) deadline: Option<OffsetDateTime>,
    #[serde(default = "default_attempts_allowed")]
    #[serde(alias = "attemptsAllowed")]
    #[validate(range(min = 1, message = "attempts_allowed must be positive"))]
    pub(crate) attempts_allowed: i32,
    #[serde(default = "default_active_true")]
    #[serde(alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseTestBindingResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) test_id: String,
    pub(crate) deadline: Option<String>,
    pub(crate) attempts_allowed: i32,
    pub(crate) is_active: bool,
}

/// One row of the student's per-course test list.
#[derive(Debug, Serialize)]
pub(crate) struct StudentTestItem {
    pub(crate) test_id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) time_limit_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) deadline: Option<String>,
    pub(crate) attempts_allowed: i32,
    pub(crate) attempts_used: i64,
    pub(crate) question_count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AttachQuestionPayload {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) position: Option<i32>,
}

fn default_attempts_allowed() -> i32 {
    1
}

fn default_active_true() -> bool {
    true
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Frontend's datetime-local often sends without timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_payload_fills_defaults() {
        let raw = r#"{"test_id":"t-1"}"#;
        let payload: CourseTestBindingCreate = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.attempts_allowed, 1);
        assert!(payload.is_active);
        assert!(payload.deadline.is_none());
    }

    #[test]
    fn binding_deadline_accepts_datetime_local() {
        let raw = r#"{"testId":"t-1","deadline":"2026-09-01T12:30"}"#;
        let payload: CourseTestBindingCreate = serde_json::from_str(raw).unwrap();
        let deadline = payload.deadline.unwrap();
        assert_eq!(deadline.hour(), 12);
        assert_eq!(deadline.minute(), 30);
    }
}
