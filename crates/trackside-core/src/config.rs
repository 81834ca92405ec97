//! Startup configuration
//!
//! Everything is supplied through environment variables, validated once at
//! startup and immutable afterwards. A bad value stops the process before any
//! task is spawned.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::enrich::TorqueModel;
use crate::simulation::SimulationConfig;

/// Serial port path
pub const ENV_PORT: &str = "TELEM_PORT";
/// Serial baud rate
pub const ENV_BAUD: &str = "TELEM_BAUD";
/// Motor torque constant
pub const ENV_TORQUE_CONSTANT: &str = "K_T";
/// Gear ratio
pub const ENV_GEAR_RATIO: &str = "GEAR_RATIO";
/// Drivetrain efficiency
pub const ENV_EFFICIENCY: &str = "EFF";
/// Database file
pub const ENV_DATABASE: &str = "TELEM_DB";
/// Simulation run length in seconds
pub const ENV_SIMULATION_SECS: &str = "TELEM_SIM_SECS";

/// Default serial port
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
/// Default baud rate for the telemetry radio
pub const DEFAULT_BAUD_RATE: u32 = 115200;
/// Default database file
pub const DEFAULT_DATABASE: &str = "telemetry.db";

/// Configuration errors
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be set to a non-empty value")]
    Empty { var: &'static str },

    #[error("{var} is not a valid number: '{value}'")]
    NotANumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero, got '{value}'")]
    NotPositive { var: &'static str, value: String },

    #[error("{var} is out of range: '{value}'")]
    OutOfRange { var: &'static str, value: String },
}

/// Live transport settings
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Serial port name (e.g., "/dev/ttyUSB0" or "COM5")
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_name: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Live source
    pub transport: TransportConfig,
    /// Torque derivation constants
    pub torque: TorqueModel,
    /// SQLite database path
    pub database_path: PathBuf,
    /// Simulation schedule
    pub simulation: SimulationConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            torque: TorqueModel::default(),
            database_path: PathBuf::from(DEFAULT_DATABASE),
            simulation: SimulationConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to resolve variables; unset variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup(ENV_PORT) {
            let port = port.trim();
            if port.is_empty() {
                return Err(ConfigError::Empty { var: ENV_PORT });
            }
            config.transport.port_name = port.to_string();
        }

        if let Some(baud) = lookup(ENV_BAUD) {
            let rate: u32 = parse(ENV_BAUD, &baud)?;
            if rate == 0 {
                return Err(ConfigError::NotPositive {
                    var: ENV_BAUD,
                    value: baud,
                });
            }
            config.transport.baud_rate = rate;
        }

        if let Some(v) = lookup(ENV_TORQUE_CONSTANT) {
            config.torque.motor_torque_constant = parse_finite(ENV_TORQUE_CONSTANT, &v)?;
        }
        if let Some(v) = lookup(ENV_GEAR_RATIO) {
            config.torque.gear_ratio = parse_finite(ENV_GEAR_RATIO, &v)?;
        }
        if let Some(v) = lookup(ENV_EFFICIENCY) {
            config.torque.drivetrain_efficiency = parse_finite(ENV_EFFICIENCY, &v)?;
        }

        if let Some(path) = lookup(ENV_DATABASE) {
            if path.trim().is_empty() {
                return Err(ConfigError::Empty { var: ENV_DATABASE });
            }
            config.database_path = PathBuf::from(path);
        }

        if let Some(secs) = lookup(ENV_SIMULATION_SECS) {
            let value = parse_finite(ENV_SIMULATION_SECS, &secs)?;
            if value <= 0.0 {
                return Err(ConfigError::NotPositive {
                    var: ENV_SIMULATION_SECS,
                    value: secs,
                });
            }
            config.simulation.duration =
                Duration::try_from_secs_f64(value).map_err(|_| ConfigError::OutOfRange {
                    var: ENV_SIMULATION_SECS,
                    value: secs.clone(),
                })?;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::NotANumber {
        var,
        value: value.to_string(),
    })
}

fn parse_finite(var: &'static str, value: &str) -> Result<f64, ConfigError> {
    let v: f64 = parse(var, value)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ConfigError::NotANumber {
            var,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<TelemetryConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TelemetryConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(load(&[]).unwrap(), TelemetryConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TELEM_PORT", "COM5"),
            ("TELEM_BAUD", "57600"),
            ("K_T", "0.08"),
            ("GEAR_RATIO", "8"),
            ("EFF", "0.95"),
            ("TELEM_DB", "/tmp/car.db"),
            ("TELEM_SIM_SECS", "2.5"),
        ])
        .unwrap();

        assert_eq!(config.transport.port_name, "COM5");
        assert_eq!(config.transport.baud_rate, 57600);
        assert_eq!(config.torque.motor_torque_constant, 0.08);
        assert_eq!(config.torque.gear_ratio, 8.0);
        assert_eq!(config.torque.drivetrain_efficiency, 0.95);
        assert_eq!(config.database_path, PathBuf::from("/tmp/car.db"));
        assert_eq!(config.simulation.duration, Duration::from_millis(2500));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert_eq!(
            load(&[("TELEM_PORT", "  ")]),
            Err(ConfigError::Empty { var: ENV_PORT })
        );
        assert_eq!(
            load(&[("K_T", "fast")]),
            Err(ConfigError::NotANumber {
                var: ENV_TORQUE_CONSTANT,
                value: "fast".into()
            })
        );
        assert!(matches!(
            load(&[("EFF", "NaN")]),
            Err(ConfigError::NotANumber { .. })
        ));
        assert!(matches!(
            load(&[("TELEM_BAUD", "0")]),
            Err(ConfigError::NotPositive { .. })
        ));
        assert!(matches!(
            load(&[("TELEM_BAUD", "-9600")]),
            Err(ConfigError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_rejects_unrepresentable_duration() {
        assert_eq!(
            load(&[("TELEM_SIM_SECS", "1e300")]),
            Err(ConfigError::OutOfRange {
                var: ENV_SIMULATION_SECS,
                value: "1e300".into()
            })
        );
        assert!(matches!(
            load(&[("TELEM_SIM_SECS", "-1")]),
            Err(ConfigError::NotPositive { .. })
        ));
    }
}
