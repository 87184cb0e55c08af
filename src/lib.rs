//! GPU Fan Control Library
//!
//! Closed-loop chassis fan control for GPU servers: GPU temperatures from
//! `rocm-smi`, `nvidia-smi` or hwmon drive Supermicro BMC fan zones
//! through `ipmitool`.
//!
//! # Features
//!
//! - Per-GPU moving-average smoothing, hottest GPU drives the fans
//! - Exponential temperature-to-duty curve with configurable floor and ceiling
//! - Hysteresis to avoid fan hunting
//! - Fail-safe to full speed after repeated sensor failures
//!
//! # Example
//!
//! ```no_run
//! use gpu_fan_control::config::FanConfig;
//! use gpu_fan_control::cooling::{ControlLoop, Shutdown};
//! use gpu_fan_control::device::{IpmiTool, open_temperature_source};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FanConfig::default();
//!     config.validate()?;
//!
//!     let source = open_temperature_source(&config.telemetry);
//!     let sink = IpmiTool::from_config(&config.ipmi);
//!     let mut control = ControlLoop::new(&config, source, sink);
//!
//!     // Trigger from a signal handler to stop the loop
//!     let shutdown = Shutdown::new();
//!     control.run(&shutdown);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cooling;
pub mod device;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod utils;

// Re-exports for convenience
pub use config::{FanConfig, Preset};
pub use cooling::{ControlLoop, CycleOutcome, ExponentialCurve, FanDutyCycle, Shutdown};
pub use device::{FanSink, TemperatureSample, TemperatureSource};
pub use error::{FanControlError, Result};
