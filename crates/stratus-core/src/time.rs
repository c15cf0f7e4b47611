//! Timestamp format for persisted documents.
//!
//! Everything written now is RFC 3339 in UTC. Index and report files from
//! earlier tool versions carry offset-free ISO-8601 timestamps; those are
//! read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Serde `default` hook for timestamp fields absent from old documents.
pub(crate) fn default_now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses an RFC 3339 timestamp, or an offset-free ISO-8601 one as UTC.
pub fn parse_iso_datetime(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc()),
    }
}

/// Serde adapter used via `#[serde(with = "crate::time::iso")]`.
pub mod iso {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso_datetime(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_iso_datetime("2017-12-06T21:15:56+02:00").expect("parse");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2017, 12, 6, 19, 15, 56).unwrap());
    }

    #[test]
    fn parses_offset_free_timestamps_as_utc() {
        let parsed = parse_iso_datetime("2017-12-06T21:15:56").expect("parse");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2017, 12, 6, 21, 15, 56).unwrap());
    }

    #[test]
    fn parses_fractional_seconds() {
        let parsed = parse_iso_datetime("2017-12-06T21:15:56.5").expect("parse");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2017, 12, 6, 21, 15, 56).unwrap()
                + chrono::Duration::milliseconds(500)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_iso_datetime("last tuesday").is_err());
    }
}
