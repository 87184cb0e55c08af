//! Controller configuration.
//!
//! Every tunable of the control loop lives in [`FanConfig`]. The struct is
//! loaded once at startup, validated, and never mutated afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Aggregation
// =============================================================================

/// How per-device smoothed temperatures collapse into one driving temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Hottest GPU governs the fans. Under-cooling any single card is the
    /// failure mode to avoid, so this is the default.
    #[default]
    Max,
    /// Mean across GPUs.
    Mean,
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Max => write!(f, "max"),
            Aggregation::Mean => write!(f, "mean"),
        }
    }
}

// =============================================================================
// Telemetry
// =============================================================================

/// Where GPU temperatures come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryBackend {
    /// AMD `rocm-smi --showtemp --json`.
    #[default]
    RocmSmi,
    /// NVIDIA `nvidia-smi --query-gpu=...`.
    NvidiaSmi,
    /// hwmon sensors via sysinfo, no subprocess.
    Sysinfo,
}

impl TelemetryBackend {
    /// Executable name used when `telemetry.program` is not set.
    pub fn default_program(&self) -> &'static str {
        match self {
            TelemetryBackend::RocmSmi => "rocm-smi",
            TelemetryBackend::NvidiaSmi => "nvidia-smi",
            TelemetryBackend::Sysinfo => "sysinfo",
        }
    }
}

impl std::fmt::Display for TelemetryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.default_program())
    }
}

/// GPU telemetry source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub backend: TelemetryBackend,

    /// Override for the tool path. Defaults to the backend's tool name on PATH.
    #[serde(default)]
    pub program: Option<String>,

    /// Upper bound on one temperature read. For `rocm-smi` this budget
    /// covers the JSON attempt plus the text fallback.
    #[serde(default = "default_telemetry_timeout")]
    pub timeout_secs: f64,

    /// JSON key holding the temperature in `rocm-smi --json` output.
    #[serde(default = "default_temperature_key")]
    pub temperature_key: String,
}

fn default_telemetry_timeout() -> f64 {
    5.0
}

fn default_temperature_key() -> String {
    "Temperature (Sensor edge) (C)".to_string()
}

impl TelemetryConfig {
    /// Resolved executable for the configured backend.
    pub fn program(&self) -> &str {
        self.program
            .as_deref()
            .unwrap_or_else(|| self.backend.default_program())
    }

    pub fn timeout(&self) -> Duration {
        bounded_duration(self.timeout_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            backend: TelemetryBackend::default(),
            program: None,
            timeout_secs: default_telemetry_timeout(),
            temperature_key: default_temperature_key(),
        }
    }
}

// =============================================================================
// IPMI
// =============================================================================

/// Chassis fan controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpmiConfig {
    #[serde(default = "default_ipmi_program")]
    pub program: String,

    /// Arguments placed before `raw`, e.g. `["-I", "open"]`.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Fan zones that all receive the same duty cycle.
    #[serde(default = "default_zones")]
    pub zones: Vec<u8>,

    /// Upper bound on one `ipmitool` call.
    #[serde(default = "default_ipmi_timeout")]
    pub timeout_secs: f64,
}

fn default_ipmi_program() -> String {
    "ipmitool".to_string()
}

fn default_zones() -> Vec<u8> {
    vec![0x02]
}

fn default_ipmi_timeout() -> f64 {
    10.0
}

impl IpmiConfig {
    pub fn timeout(&self) -> Duration {
        bounded_duration(self.timeout_secs)
    }
}

impl Default for IpmiConfig {
    fn default() -> Self {
        Self {
            program: default_ipmi_program(),
            extra_args: Vec::new(),
            zones: default_zones(),
            timeout_secs: default_ipmi_timeout(),
        }
    }
}

// =============================================================================
// FanConfig
// =============================================================================

/// Full controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanConfig {
    /// Floor duty cycle (%), applied at and below `temp_low`.
    #[serde(default = "default_min_speed")]
    pub min_speed: u8,

    /// Ceiling duty cycle (%), applied at and above `temp_high`.
    #[serde(default = "default_max_speed")]
    pub max_speed: u8,

    /// Temperature (°C) where the fans start ramping.
    #[serde(default = "default_temp_low")]
    pub temp_low: f32,

    /// Temperature (°C) where the fans reach `max_speed`.
    #[serde(default = "default_temp_high")]
    pub temp_high: f32,

    /// Seconds between cycle starts.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: f64,

    /// Rolling window length per GPU.
    #[serde(default = "default_smoothing_samples")]
    pub smoothing_samples: usize,

    /// Curve exponent. Above 1.0 stays quiet at moderate temps and ramps hard near `temp_high`.
    #[serde(default = "default_exponential_factor")]
    pub exponential_factor: f32,

    /// Minimum duty change (percentage points) worth sending to the fans.
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f32,

    /// Consecutive sensor failures before forcing `max_speed`.
    #[serde(default = "default_failure_threshold")]
    pub sensor_failure_threshold: u32,

    #[serde(default)]
    pub aggregation: Aggregation,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub ipmi: IpmiConfig,
}

fn default_min_speed() -> u8 {
    18
}

fn default_max_speed() -> u8 {
    100
}

fn default_temp_low() -> f32 {
    70.0
}

fn default_temp_high() -> f32 {
    90.0
}

fn default_check_interval() -> f64 {
    2.0
}

fn default_smoothing_samples() -> usize {
    10
}

fn default_exponential_factor() -> f32 {
    2.5
}

fn default_hysteresis() -> f32 {
    2.0
}

fn default_failure_threshold() -> u32 {
    3
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            temp_low: default_temp_low(),
            temp_high: default_temp_high(),
            check_interval_secs: default_check_interval(),
            smoothing_samples: default_smoothing_samples(),
            exponential_factor: default_exponential_factor(),
            hysteresis: default_hysteresis(),
            sensor_failure_threshold: default_failure_threshold(),
            aggregation: Aggregation::default(),
            telemetry: TelemetryConfig::default(),
            ipmi: IpmiConfig::default(),
        }
    }
}

impl FanConfig {
    /// Check every bound. Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_speed > 100 {
            return Err(ConfigError::SpeedOutOfRange {
                name: "max_speed",
                value: self.max_speed,
            });
        }
        if self.min_speed > self.max_speed {
            return Err(ConfigError::InvalidSpeedRange {
                min: self.min_speed,
                max: self.max_speed,
            });
        }
        if !(self.temp_low.is_finite() && self.temp_high.is_finite())
            || self.temp_low >= self.temp_high
        {
            return Err(ConfigError::InvalidTemperatureRange {
                low: self.temp_low,
                high: self.temp_high,
            });
        }
        if !is_positive_secs(self.check_interval_secs) {
            return Err(ConfigError::InvalidInterval);
        }
        if self.smoothing_samples < 1 {
            return Err(ConfigError::InvalidSmoothingWindow(self.smoothing_samples));
        }
        if !(self.exponential_factor.is_finite() && self.exponential_factor > 0.0) {
            return Err(ConfigError::InvalidExponent(self.exponential_factor));
        }
        if !(self.hysteresis.is_finite() && self.hysteresis >= 0.0) {
            return Err(ConfigError::InvalidHysteresis(self.hysteresis));
        }
        if self.sensor_failure_threshold < 1 {
            return Err(ConfigError::InvalidFailureThreshold);
        }
        if !is_positive_secs(self.telemetry.timeout_secs) {
            return Err(ConfigError::InvalidTimeout {
                name: "telemetry.timeout_secs",
            });
        }
        if !is_positive_secs(self.ipmi.timeout_secs) {
            return Err(ConfigError::InvalidTimeout {
                name: "ipmi.timeout_secs",
            });
        }
        if self.ipmi.zones.is_empty() {
            return Err(ConfigError::NoFanZones);
        }
        Ok(())
    }

    /// Time between cycle starts. Only meaningful on a validated config.
    pub fn check_interval(&self) -> Duration {
        bounded_duration(self.check_interval_secs)
    }
}

/// Longest accepted interval or timeout: one day.
pub const MAX_DURATION_SECS: f64 = 86_400.0;

fn is_positive_secs(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_DURATION_SECS
}

/// Never exceeds [`MAX_DURATION_SECS`], so adding it to an `Instant` cannot overflow.
fn bounded_duration(secs: f64) -> Duration {
    let max = Duration::from_secs_f64(MAX_DURATION_SECS);
    Duration::try_from_secs_f64(secs.min(MAX_DURATION_SECS)).unwrap_or(max)
}

// =============================================================================
// Presets
// =============================================================================

/// Named tuning presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Low floor, fast polling, 10-sample smoothing, exponential curve.
    Quiet,
    /// Higher floor, slow polling, no smoothing, linear curve.
    Conservative,
}

impl Preset {
    pub fn to_config(&self) -> FanConfig {
        match self {
            Preset::Quiet => FanConfig::default(),
            Preset::Conservative => FanConfig {
                min_speed: 25,
                check_interval_secs: 10.0,
                smoothing_samples: 1,
                exponential_factor: 1.0,
                ..FanConfig::default()
            },
        }
    }

    /// Get preset name for display.
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Quiet => "quiet",
            Preset::Conservative => "conservative",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FanConfig::default().validate().is_ok());
        assert!(Preset::Conservative.to_config().validate().is_ok());
    }

    #[test]
    fn test_inverted_temperature_range_rejected() {
        let config = FanConfig {
            temp_low: 70.0,
            temp_high: 60.0,
            ..FanConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTemperatureRange { .. })
        ));
    }

    #[test]
    fn test_equal_temperature_bounds_rejected() {
        let config = FanConfig {
            temp_low: 80.0,
            temp_high: 80.0,
            ..FanConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_temperature_rejected() {
        let config = FanConfig {
            temp_high: f32::NAN,
            ..FanConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTemperatureRange { .. })
        ));
    }

    #[test]
    fn test_speed_bounds_rejected() {
        let inverted = FanConfig {
            min_speed: 60,
            max_speed: 40,
            ..FanConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::InvalidSpeedRange { min: 60, max: 40 })
        ));

        let too_high = FanConfig {
            max_speed: 120,
            ..FanConfig::default()
        };
        assert!(matches!(
            too_high.validate(),
            Err(ConfigError::SpeedOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_smoothing_window_rejected() {
        let config = FanConfig {
            smoothing_samples: 0,
            ..FanConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSmoothingWindow(0))
        ));
    }

    #[test]
    fn test_bad_interval_and_timeouts_rejected() {
        let zero_interval = FanConfig {
            check_interval_secs: 0.0,
            ..FanConfig::default()
        };
        assert!(matches!(
            zero_interval.validate(),
            Err(ConfigError::InvalidInterval)
        ));

        let mut bad_timeout = FanConfig::default();
        bad_timeout.ipmi.timeout_secs = -1.0;
        assert!(matches!(
            bad_timeout.validate(),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_huge_interval_and_timeouts_rejected() {
        let huge_interval = FanConfig {
            check_interval_secs: 1.0e19,
            ..FanConfig::default()
        };
        assert!(matches!(
            huge_interval.validate(),
            Err(ConfigError::InvalidInterval)
        ));

        let mut huge_timeout = FanConfig::default();
        huge_timeout.telemetry.timeout_secs = 1.0e19;
        assert!(matches!(
            huge_timeout.validate(),
            Err(ConfigError::InvalidTimeout {
                name: "telemetry.timeout_secs"
            })
        ));

        let one_day = FanConfig {
            check_interval_secs: MAX_DURATION_SECS,
            ..FanConfig::default()
        };
        assert!(one_day.validate().is_ok());
    }

    #[test]
    fn test_durations_are_bounded_without_validation() {
        let config = FanConfig {
            check_interval_secs: 1.0e19,
            ..FanConfig::default()
        };
        let max = Duration::from_secs(86_400);
        assert_eq!(config.check_interval(), max);
        assert_eq!(
            IpmiConfig {
                timeout_secs: f64::NAN,
                ..IpmiConfig::default()
            }
            .timeout(),
            max
        );
        // Adding the bounded interval to now must not overflow
        let _ = std::time::Instant::now() + config.check_interval();
    }

    #[test]
    fn test_empty_zone_list_rejected() {
        let mut config = FanConfig::default();
        config.ipmi.zones.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoFanZones)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FanConfig =
            serde_json::from_str(r#"{"min_speed": 25, "aggregation": "mean"}"#).unwrap();
        assert_eq!(config.min_speed, 25);
        assert_eq!(config.max_speed, 100);
        assert_eq!(config.aggregation, Aggregation::Mean);
        assert_eq!(config.telemetry.program(), "rocm-smi");
        assert_eq!(config.ipmi.zones, vec![0x02]);
    }

    #[test]
    fn test_backend_names() {
        let telemetry: TelemetryConfig =
            serde_json::from_str(r#"{"backend": "nvidia-smi"}"#).unwrap();
        assert_eq!(telemetry.backend, TelemetryBackend::NvidiaSmi);
        assert_eq!(telemetry.program(), "nvidia-smi");
    }
}
