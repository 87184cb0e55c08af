//! Error types for the fan controller.
//!
//! Three families mirror the three ways a cycle can go wrong:
//! configuration (fatal, startup only), sensor reads and fan actuation
//! (both recoverable, handled by the control loop).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid or unreadable configuration. Fatal: detected before the loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// TEMP_HIGH must be strictly above TEMP_LOW.
    #[error("Invalid temperature range: temp_low={low}°C must be below temp_high={high}°C")]
    InvalidTemperatureRange { low: f32, high: f32 },

    /// MIN_SPEED must not exceed MAX_SPEED.
    #[error("Invalid speed range: min_speed={min}% exceeds max_speed={max}%")]
    InvalidSpeedRange { min: u8, max: u8 },

    /// A speed bound outside 0-100%.
    #[error("{name}={value}% is outside 0-100%")]
    SpeedOutOfRange { name: &'static str, value: u8 },

    #[error("smoothing_samples must be at least 1 (got {0})")]
    InvalidSmoothingWindow(usize),

    #[error("exponential_factor must be a positive finite number (got {0})")]
    InvalidExponent(f32),

    #[error("hysteresis must be a non-negative finite number (got {0})")]
    InvalidHysteresis(f32),

    #[error("check_interval_secs must be between 0 and 86400 seconds")]
    InvalidInterval,

    #[error("{name} must be between 0 and 86400 seconds")]
    InvalidTimeout { name: &'static str },

    #[error("sensor_failure_threshold must be at least 1")]
    InvalidFailureThreshold,

    #[error("No IPMI fan zones configured")]
    NoFanZones,

    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// GPU telemetry could not be obtained this cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Tool missing, failed to start, or exited non-zero.
    #[error("{tool} unavailable: {reason}")]
    Unavailable { tool: String, reason: String },

    /// Tool ran but its output held no usable temperatures.
    #[error("{tool} output could not be parsed: {detail}")]
    ParseError { tool: String, detail: String },

    #[error("{tool} did not respond within {after:?}")]
    Timeout { tool: String, after: Duration },
}

/// The fan controller rejected or never acknowledged a duty cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuationError {
    #[error("`{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("`{command}` did not complete within {after:?}")]
    Timeout { command: String, after: Duration },
}

/// Umbrella error for library entry points.
#[derive(Error, Debug)]
pub enum FanControlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Actuation(#[from] ActuationError),

    /// Generic invalid input error.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for fan controller operations.
pub type Result<T> = std::result::Result<T, FanControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message_names_both_bounds() {
        let err = ConfigError::InvalidTemperatureRange {
            low: 70.0,
            high: 60.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("70"));
        assert!(msg.contains("60"));
    }

    #[test]
    fn test_sensor_error_names_tool() {
        let err = SensorError::Timeout {
            tool: "rocm-smi".into(),
            after: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("rocm-smi"));
    }

    #[test]
    fn test_umbrella_from_conversion() {
        let err: FanControlError = ActuationError::CommandFailed {
            command: "ipmitool raw".into(),
            detail: "exit status 1".into(),
        }
        .into();
        assert!(matches!(err, FanControlError::Actuation(_)));
    }
}
