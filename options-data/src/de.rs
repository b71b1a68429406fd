//! Serde helpers for the collection API's timestamp format.
//!
//! The API emits ISO-8601 timestamps, sometimes with an explicit offset and sometimes
//! without one. Zone-less timestamps are interpreted as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an API timestamp, accepting RFC 3339 or a zone-less ISO-8601 date-time.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(input) {
        return Some(timestamp.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| naive.and_utc())
}

/// Deserialize a required API timestamp.
pub fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Deserialize an optional API timestamp, where `null` maps to `None`.
pub fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp() {
        struct TestCase {
            input: &'static str,
            expected: Option<DateTime<Utc>>,
        }

        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 15, 0).unwrap();

        let tests = vec![
            TestCase {
                // TC0: RFC 3339 with Z
                input: "2024-03-01T12:15:00Z",
                expected: Some(expected),
            },
            TestCase {
                // TC1: RFC 3339 with offset is normalised to UTC
                input: "2024-03-01T14:15:00+02:00",
                expected: Some(expected),
            },
            TestCase {
                // TC2: zone-less is treated as UTC
                input: "2024-03-01T12:15:00",
                expected: Some(expected),
            },
            TestCase {
                // TC3: zone-less with fractional seconds
                input: "2024-03-01T12:15:00.000000",
                expected: Some(expected),
            },
            TestCase {
                // TC4: space separator
                input: "2024-03-01 12:15:00",
                expected: Some(expected),
            },
            TestCase {
                // TC5: garbage
                input: "yesterday",
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_timestamp(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
