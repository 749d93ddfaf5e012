use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor kind observed on an inbound topic
///
/// Temperature and humidity are the kinds the pipeline requires by default;
/// anything else arriving on a mapped topic is carried as `Other` so new
/// sensors can be wired in through configuration alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Other(String),
}

impl SensorKind {
    pub fn as_str(&self) -> &str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Other(name) => name,
        }
    }
}

impl From<String> for SensorKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "temperature" => SensorKind::Temperature,
            "humidity" => SensorKind::Humidity,
            _ => SensorKind::Other(s),
        }
    }
}

impl From<&str> for SensorKind {
    fn from(s: &str) -> Self {
        SensorKind::from(s.to_string())
    }
}

impl From<SensorKind> for String {
    fn from(kind: SensorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observed sensor value
///
/// Immutable once created. `observed_at` is assigned at ingestion when the
/// source payload carries no timestamp. Extra payload fields are preserved
/// in `raw` for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub kind: SensorKind,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug)]
pub enum PayloadError {
    /// Payload is neither a bare numeric string nor a JSON object with `value`
    Unparseable(String),
    /// Payload is not valid UTF-8
    Encoding,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Unparseable(text) => write!(f, "unparseable sensor payload: {}", text),
            PayloadError::Encoding => write!(f, "sensor payload is not valid UTF-8"),
        }
    }
}

impl std::error::Error for PayloadError {}

/// Parse an inbound topic payload into a `Reading`
///
/// Accepted shapes:
/// - a bare numeric string, e.g. `"22.5"`
/// - a JSON object with at least a `value` field; an optional `observed_at`
///   (ISO-8601) is honored, every other field lands in `raw`
///
/// When JSON parsing fails the raw text is retried as a float and wrapped.
pub fn parse_payload(kind: SensorKind, payload: &[u8]) -> Result<Reading, PayloadError> {
    let text = std::str::from_utf8(payload).map_err(|_| PayloadError::Encoding)?;
    let text = text.trim();

    if let Ok(serde_json::Value::Object(mut fields)) = serde_json::from_str(text) {
        let value = fields
            .remove("value")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| PayloadError::Unparseable(text.to_string()))?;

        let observed_at = fields
            .remove("observed_at")
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        return Ok(Reading {
            kind,
            value,
            observed_at,
            raw: fields,
        });
    }

    let value = text
        .parse::<f64>()
        .map_err(|_| PayloadError::Unparseable(text.to_string()))?;

    Ok(Reading {
        kind,
        value,
        observed_at: Utc::now(),
        raw: serde_json::Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_numeric_payload() {
        let reading = parse_payload(SensorKind::Temperature, b"22.5").unwrap();
        assert_eq!(reading.kind, SensorKind::Temperature);
        assert_eq!(reading.value, 22.5);
        assert!(reading.raw.is_empty());
    }

    #[test]
    fn test_parse_json_payload_with_extras() {
        let reading = parse_payload(
            SensorKind::Humidity,
            br#"{"value": 45.2, "unit": "%", "sensor_id": "dht22-1"}"#,
        )
        .unwrap();
        assert_eq!(reading.value, 45.2);
        assert_eq!(reading.raw.get("unit").unwrap(), "%");
        assert_eq!(reading.raw.get("sensor_id").unwrap(), "dht22-1");
    }

    #[test]
    fn test_parse_json_payload_with_timestamp() {
        let reading = parse_payload(
            SensorKind::Temperature,
            br#"{"value": 19.0, "observed_at": "2026-08-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(reading.observed_at.to_rfc3339(), "2026-08-01T12:00:00+00:00");
        // consumed fields must not leak into raw
        assert!(reading.raw.is_empty());
    }

    #[test]
    fn test_parse_invalid_json_falls_back_to_float() {
        // Truncated JSON is retried as a float and fails cleanly
        let err = parse_payload(SensorKind::Temperature, b"{\"value\":").unwrap_err();
        assert!(matches!(err, PayloadError::Unparseable(_)));

        // Whitespace-padded floats still parse
        let reading = parse_payload(SensorKind::Humidity, b"  51.0\n").unwrap();
        assert_eq!(reading.value, 51.0);
    }

    #[test]
    fn test_parse_json_object_without_value_fails() {
        let err = parse_payload(SensorKind::Temperature, br#"{"val": 3}"#).unwrap_err();
        assert!(matches!(err, PayloadError::Unparseable(_)));
    }

    #[test]
    fn test_sensor_kind_round_trip() {
        assert_eq!(SensorKind::from("temperature"), SensorKind::Temperature);
        assert_eq!(SensorKind::from("co2"), SensorKind::Other("co2".to_string()));
        assert_eq!(SensorKind::from("co2").as_str(), "co2");
    }
}
