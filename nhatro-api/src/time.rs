//! Serde helpers for backend timestamps, which are sent either as RFC 3339
//! strings or as milliseconds since the Unix epoch.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};

use crate::Time;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Text(String),
    Millis(i64),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Time, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTime::deserialize(deserializer)? {
        RawTime::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("invalid timestamp {s:?}: {e}"))),
        RawTime::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| D::Error::custom(format!("timestamp {ms} is out of range"))),
    }
}
