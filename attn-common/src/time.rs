//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Today's local calendar date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Format a date the way the attendance API expects (`YYYY-MM-DD`)
pub fn api_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
