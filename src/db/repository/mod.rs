pub mod message;
pub mod room;

pub use message::*;
pub use room::*;

use chrono::{DateTime, SecondsFormat, Utc};

use super::DatabaseError;

/// Timestamps are stored as fixed-width RFC 3339 UTC text so that
/// lexical order equals chronological order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_text_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn timestamp_parses_back() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(&ts)).unwrap(), ts);
    }

    #[test]
    fn garbage_timestamp_is_an_error() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(DatabaseError::InvalidTimestamp { .. })
        ));
    }
}
