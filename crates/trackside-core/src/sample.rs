//! Telemetry samples
//!
//! Raw decoded records as they arrive from a source, and the canonical
//! [`Sample`] produced from them by enrichment.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw record key for the source timestamp
pub const KEY_TIMESTAMP: &str = "t";
/// Raw record key for the lap number
pub const KEY_LAP: &str = "lap";
/// Raw record key for pack voltage
pub const KEY_VOLTAGE: &str = "V";
/// Raw record key for motor current
pub const KEY_CURRENT: &str = "A";
/// Raw record key for consumed amp-hours
pub const KEY_AMP_HOURS: &str = "Ah";
/// Raw record key for speed
pub const KEY_SPEED: &str = "mph";
/// Raw record key for torque
pub const KEY_TORQUE: &str = "torque";
/// Raw record key for latitude
pub const KEY_LATITUDE: &str = "lat";
/// Raw record key for longitude
pub const KEY_LONGITUDE: &str = "lon";

/// A decoded but not yet validated telemetry record.
///
/// Every field is optional and may hold any JSON value; enrichment decides
/// what is usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one line of source output.
    ///
    /// Returns `None` for anything that is not a JSON object.
    pub fn parse(line: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(fields)) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Set a field, returning the record for chaining
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Get a field if present and not `null`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// One canonical telemetry reading.
///
/// Serialized with the short field names observers and the database use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the Unix epoch (source or server assigned)
    #[serde(rename = "t_ms")]
    pub timestamp_ms: i64,
    /// Lap number, 0 when unassigned
    pub lap: u32,
    /// Pack voltage (V)
    #[serde(rename = "V")]
    pub voltage: Option<f64>,
    /// Motor current (A)
    #[serde(rename = "A")]
    pub current: Option<f64>,
    /// Consumed charge (Ah)
    #[serde(rename = "Ah")]
    pub amp_hours: Option<f64>,
    /// Vehicle speed (mph)
    #[serde(rename = "mph")]
    pub speed: Option<f64>,
    /// Wheel torque (Nm), supplied or derived
    pub torque: Option<f64>,
    /// GPS latitude
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    /// GPS longitude
    #[serde(rename = "lon")]
    pub longitude: Option<f64>,
}

impl Sample {
    /// Position fix, only when both coordinates are present
    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Per-lap time series row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Milliseconds since the Unix epoch
    #[serde(rename = "t_ms")]
    pub timestamp_ms: i64,
    /// Pack voltage (V)
    #[serde(rename = "V")]
    pub voltage: Option<f64>,
    /// Motor current (A)
    #[serde(rename = "A")]
    pub current: Option<f64>,
    /// Vehicle speed (mph)
    #[serde(rename = "mph")]
    pub speed: Option<f64>,
    /// Wheel torque (Nm)
    pub torque: Option<f64>,
}

/// Per-lap GPS track row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPoint {
    /// Milliseconds since the Unix epoch
    #[serde(rename = "t_ms")]
    pub timestamp_ms: i64,
    /// GPS latitude
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// GPS longitude
    #[serde(rename = "lon")]
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let raw = RawRecord::parse(r#"{"A": 50, "lap": 3}"#).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get(KEY_CURRENT), Some(&Value::from(50)));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(RawRecord::parse("garbage{{").is_none());
        assert!(RawRecord::parse("[1, 2, 3]").is_none());
        assert!(RawRecord::parse("42").is_none());
        assert!(RawRecord::parse("").is_none());
    }

    #[test]
    fn test_null_is_absent() {
        let raw = RawRecord::parse(r#"{"torque": null}"#).unwrap();
        assert!(raw.get(KEY_TORQUE).is_none());
    }

    #[test]
    fn test_sample_wire_names() {
        let sample = Sample {
            timestamp_ms: 1_000,
            lap: 2,
            voltage: Some(47.5),
            current: None,
            amp_hours: None,
            speed: Some(20.0),
            torque: None,
            latitude: None,
            longitude: None,
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["t_ms"], 1_000);
        assert_eq!(json["V"], 47.5);
        assert_eq!(json["mph"], 20.0);
        assert!(json["A"].is_null());
        assert!(sample.position().is_none());
    }
}
