use crate::event::Level;
use crate::simplify::Object;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Key used by the allow-list and rename-mapping layouts.
pub const AT_TIMESTAMP_KEY: &str = "@timestamp";

/// Key used by the snake_case layout.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// ISO-8601 / RFC 3339 in UTC with nanosecond precision and a `Z` suffix,
/// e.g. `2024-05-01T12:30:00.123456789Z`. Parses back to the same instant.
pub fn iso8601(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// One emitted JSON line.
///
/// Serializes as
/// `{"<timestamp_key>":..,"level":..,"message":..,"fields":{..},"exception":..}`
/// where `exception` is left out entirely when the event carried none.
#[derive(Debug)]
pub struct LogRecord<'a> {
    pub timestamp_key: &'a str,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: Object,
    pub exception: Option<&'a str>,
}

impl Serialize for LogRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.exception.is_some() { 5 } else { 4 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(self.timestamp_key, &iso8601(&self.timestamp))?;
        map.serialize_entry("level", self.level.as_str())?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry("fields", &self.fields)?;
        if let Some(exception) = self.exception {
            map.serialize_entry("exception", exception)?;
        }
        map.end()
    }
}

/// Degraded record written in place of an event that could not be
/// serialized: `{"error":"Failed to serialize log event: <reason>"}`.
#[derive(Debug, Serialize)]
pub struct FallbackRecord {
    pub error: String,
}

impl FallbackRecord {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self {
            error: format!("Failed to serialize log event: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Scalar;
    use crate::simplify::SimplifiedValue;
    use chrono::TimeZone;

    fn record(exception: Option<&str>) -> LogRecord<'_> {
        let mut fields = Object::new();
        fields.insert("RequestId".into(), SimplifiedValue::Scalar(Scalar::Str("12345".into())));
        LogRecord {
            timestamp_key: AT_TIMESTAMP_KEY,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            level: Level::Warning,
            message: "hello".into(),
            fields,
            exception,
        }
    }

    #[test]
    fn record_fields_are_emitted_in_order() {
        let json = serde_json::to_string(&record(None)).unwrap();
        assert_eq!(
            json,
            r#"{"@timestamp":"2024-05-01T12:30:00.000000000Z","level":"Warning","message":"hello","fields":{"RequestId":"12345"}}"#
        );
    }

    #[test]
    fn exception_is_appended_when_present() {
        let json = serde_json::to_string(&record(Some("boom"))).unwrap();
        assert!(json.ends_with(r#","exception":"boom"}"#));
    }

    #[test]
    fn timestamp_round_trips() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let parsed = DateTime::parse_from_rfc3339(&iso8601(&ts)).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), ts);
    }

    #[test]
    fn fallback_record_escapes_reason() {
        let json = serde_json::to_string(&FallbackRecord::new("bad \"value\"")).unwrap();
        assert_eq!(json, r#"{"error":"Failed to serialize log event: bad \"value\""}"#);
    }
}
