//! GPU telemetry adapters for the vendor SMI tools.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::TelemetryConfig;
use crate::device::command::{CommandError, run_with_timeout};
use crate::device::{TemperatureSample, TemperatureSource};
use crate::error::SensorError;
use crate::protocol::GpuReading;
use crate::protocol::telemetry::{
    NVIDIA_ARGS, ROCM_JSON_ARGS, ROCM_TEXT_ARGS, parse_nvidia_csv, parse_rocm_json,
    parse_rocm_text,
};

/// Run a telemetry tool and return its stdout, mapping every failure
/// mode onto [`SensorError`].
fn query(program: &str, args: &[&str], timeout: Duration) -> Result<String, SensorError> {
    let output = run_with_timeout(program, args, timeout).map_err(|e| match e {
        CommandError::TimedOut { after, .. } => SensorError::Timeout {
            tool: program.to_string(),
            after,
        },
        other => SensorError::Unavailable {
            tool: program.to_string(),
            reason: other.to_string(),
        },
    })?;

    if !output.success() {
        return Err(SensorError::Unavailable {
            tool: program.to_string(),
            reason: output.failure_detail(),
        });
    }
    Ok(output.stdout)
}

fn to_samples(readings: Vec<GpuReading>) -> Vec<TemperatureSample> {
    readings
        .into_iter()
        .map(|r| TemperatureSample::new(r.device_id, r.celsius))
        .collect()
}

// =============================================================================
// rocm-smi
// =============================================================================

/// AMD GPUs via `rocm-smi`.
///
/// Prefers the JSON listing. When `--json` exits non-zero or yields no
/// temperatures, falls back to the plain-text listing.
#[derive(Debug, Clone)]
pub struct RocmSmi {
    program: String,
    timeout: Duration,
    temperature_key: String,
}

impl RocmSmi {
    pub fn new(program: impl Into<String>, timeout: Duration, temperature_key: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout,
            temperature_key: temperature_key.into(),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.program(), config.timeout(), &config.temperature_key)
    }
}

impl TemperatureSource for RocmSmi {
    fn name(&self) -> &str {
        &self.program
    }

    /// Both listings share one `timeout` budget.
    fn read(&mut self) -> Result<Vec<TemperatureSample>, SensorError> {
        let started = Instant::now();
        let json = query(&self.program, &ROCM_JSON_ARGS, self.timeout)
            .and_then(|out| parse_rocm_json(&out, &self.temperature_key));

        match json {
            Ok(readings) => Ok(to_samples(readings)),
            // A hung tool will hang again
            Err(e @ SensorError::Timeout { .. }) => Err(e),
            Err(e) => {
                debug!("{}; retrying with the text listing", e);
                let remaining = self.timeout.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(SensorError::Timeout {
                        tool: self.program.clone(),
                        after: self.timeout,
                    });
                }
                let text = query(&self.program, &ROCM_TEXT_ARGS, remaining)?;
                parse_rocm_text(&text).map(to_samples)
            }
        }
    }
}

// =============================================================================
// nvidia-smi
// =============================================================================

/// NVIDIA GPUs via `nvidia-smi --query-gpu`.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: String,
    timeout: Duration,
}

impl NvidiaSmi {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.program(), config.timeout())
    }
}

impl TemperatureSource for NvidiaSmi {
    fn name(&self) -> &str {
        &self.program
    }

    fn read(&mut self) -> Result<Vec<TemperatureSample>, SensorError> {
        let csv = query(&self.program, &NVIDIA_ARGS, self.timeout)?;
        parse_nvidia_csv(&csv).map(to_samples)
    }
}
