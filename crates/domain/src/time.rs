use chrono::{DateTime, Duration, NaiveDate, Utc};

use auditvault_core::{AppError, AppResult};

/// Parses a user-supplied time that is either RFC 3339 or `YYYY-MM-DD`.
///
/// Bare dates mark midnight UTC; when the value closes a range
/// (`is_end_time`) the date expands to the end of that day so the whole
/// day is covered.
pub fn parse_user_time(value: &str, is_end_time: bool) -> AppResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "invalid time format, expected RFC3339 or YYYY-MM-DD, got {value}"
        ))
    })?;

    let mut timestamp = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::Validation(format!("invalid date value: {value}")))?
        .and_utc();

    if is_end_time {
        timestamp += Duration::days(1) - Duration::seconds(1);
    }

    Ok(timestamp)
}
