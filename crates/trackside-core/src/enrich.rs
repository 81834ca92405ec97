//! Sample enrichment
//!
//! Turns a [`RawRecord`] into a canonical [`Sample`]. Enrichment never fails:
//! anything unusable becomes an absent field rather than a zero that could be
//! mistaken for a real reading.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sample::{
    RawRecord, Sample, KEY_AMP_HOURS, KEY_CURRENT, KEY_LAP, KEY_LATITUDE, KEY_LONGITUDE,
    KEY_SPEED, KEY_TIMESTAMP, KEY_TORQUE, KEY_VOLTAGE,
};

/// Current-to-torque model used when the source does not report torque.
///
/// torque (Nm) = I × k_t × gear_ratio × efficiency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorqueModel {
    /// Motor torque constant (Nm per amp)
    pub motor_torque_constant: f64,
    /// Motor-to-wheel gear ratio
    pub gear_ratio: f64,
    /// Drivetrain efficiency (0..1)
    pub drivetrain_efficiency: f64,
}

impl Default for TorqueModel {
    fn default() -> Self {
        Self {
            motor_torque_constant: 0.06,
            gear_ratio: 10.0,
            drivetrain_efficiency: 0.9,
        }
    }
}

impl TorqueModel {
    /// Estimate torque from motor current
    pub fn torque_from_current(&self, current: f64) -> f64 {
        current * self.motor_torque_constant * self.gear_ratio * self.drivetrain_efficiency
    }
}

/// Converts raw records into canonical samples
#[derive(Debug, Clone, Copy, Default)]
pub struct Enricher {
    torque_model: TorqueModel,
}

impl Enricher {
    /// Create an enricher with the given torque model
    pub fn new(torque_model: TorqueModel) -> Self {
        Self { torque_model }
    }

    /// The torque model in use
    pub fn torque_model(&self) -> &TorqueModel {
        &self.torque_model
    }

    /// Enrich a raw record, substituting the current wall-clock time when the
    /// record carries no usable timestamp.
    pub fn enrich(&self, raw: &RawRecord) -> Sample {
        self.enrich_at(raw, chrono::Utc::now().timestamp_millis())
    }

    /// Enrich a raw record with an explicit fallback timestamp
    pub fn enrich_at(&self, raw: &RawRecord, now_ms: i64) -> Sample {
        let timestamp_ms = raw.get(KEY_TIMESTAMP).and_then(as_integer).unwrap_or(now_ms);

        let lap = raw
            .get(KEY_LAP)
            .and_then(as_integer)
            .and_then(|lap| u32::try_from(lap).ok())
            .unwrap_or(0);

        let current = raw.get(KEY_CURRENT).and_then(as_real);

        // Source torque wins; derive only when it is missing
        let torque = raw
            .get(KEY_TORQUE)
            .and_then(as_real)
            .or_else(|| current.map(|a| self.torque_model.torque_from_current(a)))
            .filter(|t| t.is_finite());

        Sample {
            timestamp_ms,
            lap,
            voltage: raw.get(KEY_VOLTAGE).and_then(as_real),
            current,
            amp_hours: raw.get(KEY_AMP_HOURS).and_then(as_real),
            speed: raw.get(KEY_SPEED).and_then(as_real),
            torque,
            latitude: raw.get(KEY_LATITUDE).and_then(as_real),
            longitude: raw.get(KEY_LONGITUDE).and_then(as_real),
        }
    }
}

/// Interpret a JSON value as a finite real number.
///
/// Accepts numbers and strings holding a number.
fn as_real(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Interpret a JSON value as an integer.
///
/// Floats are truncated toward zero; strings must hold an integer.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
