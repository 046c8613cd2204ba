pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod schema;
pub mod seed;

pub use connection::{Database, DbConnection, DbPool};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

/// Timestamps are stored as second-precision RFC 3339 with a `Z` suffix so that
/// lexical order matches chronological order and the first ten characters are
/// the UTC calendar date.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_optional_uuid(idx: usize, value: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    value.map(|v| parse_uuid(idx, &v)).transpose()
}

/// Read column `idx` as a UUID
pub(crate) fn uuid_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    parse_uuid(idx, &row.get::<_, String>(idx)?)
}

/// Read column `idx` as a timestamp
pub(crate) fn timestamp_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    parse_timestamp(idx, &row.get::<_, String>(idx)?)
}

/// Public URL under which a stored media key is served
pub fn media_url(key: &str) -> String {
    format!("/media/{}", key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2025, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let (sa, sb) = (format_timestamp(a), format_timestamp(b));
        assert_eq!(sa, "2025-01-09T23:59:59Z");
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb);
        assert_eq!(&sb[..10], "2025-01-10");
        assert_eq!(parse_timestamp(0, &sb).unwrap(), b);
    }

    #[test]
    fn bad_uuid_is_a_conversion_error() {
        assert!(matches!(
            parse_uuid(3, "not-a-uuid"),
            Err(rusqlite::Error::FromSqlConversionFailure(3, Type::Text, _))
        ));
    }
}
