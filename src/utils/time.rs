//! Timestamp helpers.
//!
//! All timestamps are stored as RFC 3339 strings in UTC with millisecond
//! precision, so lexical order matches chronological order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

pub fn format(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now() -> String {
    format(Utc::now())
}

/// Parse an ISO 8601 date or date-time. Date-only values mean midnight UTC;
/// date-times without an offset are taken as UTC.
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Normalise an ISO 8601 input into the stored representation.
pub fn normalize(value: &str) -> Option<String> {
    parse_iso8601(value).map(format)
}

/// `YYYY-MM-DD` part of a stored timestamp, as used in exports.
pub fn date_part(stored: &str) -> String {
    parse_iso8601(stored)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_iso_shapes() {
        assert_eq!(
            normalize("2026-03-01").as_deref(),
            Some("2026-03-01T00:00:00.000Z")
        );
        assert_eq!(
            normalize("2026-03-01T10:15:00+02:00").as_deref(),
            Some("2026-03-01T08:15:00.000Z")
        );
        assert_eq!(
            normalize("2026-03-01T10:15:00.250").as_deref(),
            Some("2026-03-01T10:15:00.250Z")
        );
        assert!(normalize("next tuesday").is_none());
        assert!(normalize("2026-13-01").is_none());
    }

    #[test]
    fn date_part_strips_time() {
        assert_eq!(date_part("2026-03-01T08:15:00.000Z"), "2026-03-01");
        assert_eq!(date_part("garbage"), "");
    }

    #[test]
    fn stored_format_sorts_chronologically() {
        let earlier = normalize("2026-01-02T09:00:00Z").unwrap();
        let later = normalize("2026-01-10T08:00:00Z").unwrap();
        assert!(earlier < later);
    }
}
