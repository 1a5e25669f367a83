//! Flexible date parsing for sitemap/feed timestamps and CLI bounds.
//!
//! Feeds and sitemaps carry dates in whatever format the publisher felt
//! like: RFC 3339 `<lastmod>`, RFC 2822 `<pubDate>`, bare dates. Everything
//! is normalized to naive UTC for comparison; timezone-aware values are
//! converted, naive values taken as-is. Unparsable input is `None` — a
//! document with a bad date must never be filtered out because of it.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::PipelineError;

/// Naive datetime formats tried after the timezone-aware ones.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Bare date formats, parsed to midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%d.%m.%Y", "%m/%d/%Y"];

/// Parse a date string of unknown format to naive UTC.
pub fn parse_flexible(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).naive_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc).naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse a `--since` argument: relative (`7d`, `2w`) or any date
/// [`parse_flexible`] accepts. Invalid input is a fatal argument error.
pub fn parse_since(value: &str) -> Result<NaiveDateTime, PipelineError> {
    let value = value.trim();
    if let Some(days) = value.strip_suffix('d').and_then(|v| v.parse::<i64>().ok()) {
        return Ok(Utc::now().naive_utc() - Duration::days(days));
    }
    if let Some(weeks) = value.strip_suffix('w').and_then(|v| v.parse::<i64>().ok()) {
        return Ok(Utc::now().naive_utc() - Duration::weeks(weeks));
    }
    parse_flexible(value)
        .ok_or_else(|| PipelineError::InvalidArg(format!("invalid --since value: {value}")))
}
