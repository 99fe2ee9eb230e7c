//! Error report vocabulary for the errors service.

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Critical,
}

impl ErrorLevel {
    pub const ALL: [ErrorLevel; 5] = [
        ErrorLevel::Debug,
        ErrorLevel::Info,
        ErrorLevel::Warning,
        ErrorLevel::Error,
        ErrorLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLevel::Debug => "debug",
            ErrorLevel::Info => "info",
            ErrorLevel::Warning => "warning",
            ErrorLevel::Error => "error",
            ErrorLevel::Critical => "critical",
        }
    }

    /// Level a reporting service assigns to a response status.
    pub fn for_status(status: u16) -> Self {
        match status {
            500.. => ErrorLevel::Error,
            400..=499 => ErrorLevel::Warning,
            _ => ErrorLevel::Info,
        }
    }
}

impl FromStr for ErrorLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Level must be one of: {}",
                    ErrorLevel::ALL.map(|l| l.as_str()).join(", ")
                )
            })
    }
}

/// Look-back window accepted by the stats endpoint.
pub fn stats_window(timeframe: Option<&str>) -> Duration {
    match timeframe {
        Some("1h") => Duration::hours(1),
        Some("7d") => Duration::days(7),
        Some("30d") => Duration::days(30),
        _ => Duration::hours(24),
    }
}

/// Age threshold accepted by the cleanup endpoint.
pub fn cleanup_age(older_than: Option<&str>) -> Duration {
    match older_than {
        Some("7d") => Duration::days(7),
        Some("90d") => Duration::days(90),
        _ => Duration::days(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_windows_fall_back_to_defaults() {
        assert_eq!(stats_window(Some("1h")), Duration::hours(1));
        assert_eq!(stats_window(Some("1y")), Duration::hours(24));
        assert_eq!(stats_window(None), Duration::hours(24));
        assert_eq!(cleanup_age(Some("90d")), Duration::days(90));
        assert_eq!(cleanup_age(Some("bogus")), Duration::days(30));
    }

    #[test]
    fn level_from_status() {
        assert_eq!(ErrorLevel::for_status(503), ErrorLevel::Error);
        assert_eq!(ErrorLevel::for_status(404), ErrorLevel::Warning);
        assert_eq!(ErrorLevel::for_status(200), ErrorLevel::Info);
    }
}
