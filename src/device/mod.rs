//! Hardware access behind two narrow capabilities.
//!
//! The control loop only sees [`TemperatureSource`] and [`FanSink`].
//! Concrete adapters shell out to `rocm-smi`, `nvidia-smi` and
//! `ipmitool`; tests substitute in-memory fakes.

pub mod command;
pub mod gpu;
pub mod ipmi;

use std::time::Instant;

use crate::config::{TelemetryBackend, TelemetryConfig};
use crate::cooling::FanDutyCycle;
use crate::error::{ActuationError, SensorError};
use crate::utils::sensors::SystemSensors;

pub use command::{
    CommandError, CommandOutput, locate_program, run_with_timeout, running_as_root,
};
pub use gpu::{NvidiaSmi, RocmSmi};
pub use ipmi::{DryRunSink, IpmiTool};

// =============================================================================
// Samples
// =============================================================================

/// One GPU temperature reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSample {
    pub device_id: String,
    pub celsius: f32,
    pub timestamp: Instant,
}

impl TemperatureSample {
    pub fn new(device_id: impl Into<String>, celsius: f32) -> Self {
        Self {
            device_id: device_id.into(),
            celsius,
            timestamp: Instant::now(),
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Anything that can report GPU temperatures.
pub trait TemperatureSource {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// One sample per detected GPU. Implementations must bound their own
    /// runtime and must not return an empty `Ok`.
    fn read(&mut self) -> Result<Vec<TemperatureSample>, SensorError>;
}

/// Anything that can set the chassis fan duty cycle.
pub trait FanSink {
    fn name(&self) -> &str;

    /// Set every fan zone to `duty`. `Ok` means the controller accepted it.
    fn apply(&mut self, duty: FanDutyCycle) -> Result<(), ActuationError>;
}

impl<T: TemperatureSource + ?Sized> TemperatureSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&mut self) -> Result<Vec<TemperatureSample>, SensorError> {
        (**self).read()
    }
}

impl<T: FanSink + ?Sized> FanSink for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply(&mut self, duty: FanDutyCycle) -> Result<(), ActuationError> {
        (**self).apply(duty)
    }
}

/// Build the temperature source selected in the configuration.
pub fn open_temperature_source(config: &TelemetryConfig) -> Box<dyn TemperatureSource> {
    match config.backend {
        TelemetryBackend::RocmSmi => Box::new(RocmSmi::from_config(config)),
        TelemetryBackend::NvidiaSmi => Box::new(NvidiaSmi::from_config(config)),
        TelemetryBackend::Sysinfo => Box::new(SystemSensors::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_temperature_source_by_backend() {
        let rocm = open_temperature_source(&TelemetryConfig::default());
        assert_eq!(rocm.name(), "rocm-smi");

        let nvidia = open_temperature_source(&TelemetryConfig {
            backend: TelemetryBackend::NvidiaSmi,
            program: Some("/opt/nvidia/bin/nvidia-smi".into()),
            ..TelemetryConfig::default()
        });
        assert_eq!(nvidia.name(), "/opt/nvidia/bin/nvidia-smi");
    }
}
