use chrono::{DateTime, NaiveDate, Utc};

/// Date key format used for day bucketing ("2026-02-20")
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// UTC calendar date of a Unix-millis timestamp.
///
/// Out-of-range timestamps fall back to the Unix epoch date.
pub fn utc_date_of(millis: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

/// Storage key for a calendar date
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date key
pub fn parse_date_key(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}
