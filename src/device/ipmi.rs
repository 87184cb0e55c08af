//! Chassis fan actuation through `ipmitool`.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::IpmiConfig;
use crate::cooling::FanDutyCycle;
use crate::device::FanSink;
use crate::device::command::{CommandError, CommandOutput, run_with_timeout};
use crate::error::ActuationError;
use crate::protocol::ipmi::{build_get_duty_cmd, build_set_duty_cmd, parse_duty_response, raw_args};

/// Supermicro BMC fan zones driven with `ipmitool raw`.
#[derive(Debug, Clone)]
pub struct IpmiTool {
    program: String,
    extra_args: Vec<String>,
    zones: Vec<u8>,
    timeout: Duration,
}

impl IpmiTool {
    pub fn new(program: impl Into<String>, zones: Vec<u8>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            zones,
            timeout,
        }
    }

    pub fn from_config(config: &IpmiConfig) -> Self {
        Self {
            program: config.program.clone(),
            extra_args: config.extra_args.clone(),
            zones: config.zones.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn zones(&self) -> &[u8] {
        &self.zones
    }

    fn args_for(&self, request: &[u8]) -> Vec<String> {
        self.extra_args
            .iter()
            .cloned()
            .chain(raw_args(request))
            .collect()
    }

    /// Run one raw request. Non-zero exit and timeouts become [`ActuationError`].
    fn send_raw(&self, request: &[u8]) -> Result<CommandOutput, ActuationError> {
        let args = self.args_for(request);
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("{}", command);

        let output = run_with_timeout(&self.program, &args, self.timeout).map_err(|e| match e {
            CommandError::TimedOut { after, .. } => ActuationError::Timeout {
                command: command.clone(),
                after,
            },
            other => ActuationError::CommandFailed {
                command: command.clone(),
                detail: other.to_string(),
            },
        })?;

        if !output.success() {
            return Err(ActuationError::CommandFailed {
                command,
                detail: output.failure_detail(),
            });
        }
        Ok(output)
    }

    /// Read one zone's current duty cycle back from the BMC.
    pub fn read_duty(&self, zone: u8) -> Result<u8, ActuationError> {
        let request = build_get_duty_cmd(zone);
        let output = self.send_raw(&request)?;
        parse_duty_response(&output.stdout).ok_or_else(|| ActuationError::CommandFailed {
            command: format!("{} {}", self.program, self.args_for(&request).join(" ")),
            detail: format!("unexpected response {:?}", output.stdout.trim()),
        })
    }
}

impl FanSink for IpmiTool {
    fn name(&self) -> &str {
        &self.program
    }

    /// Zones are written in order; the first failing zone aborts the rest.
    fn apply(&mut self, duty: FanDutyCycle) -> Result<(), ActuationError> {
        let raw = duty.raw();
        for &zone in &self.zones {
            self.send_raw(&build_set_duty_cmd(zone, raw))?;
        }
        Ok(())
    }
}

// =============================================================================
// Dry run
// =============================================================================

/// Logs duty cycles instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct DryRunSink {
    last: Option<FanDutyCycle>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<FanDutyCycle> {
        self.last
    }
}

impl FanSink for DryRunSink {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn apply(&mut self, duty: FanDutyCycle) -> Result<(), ActuationError> {
        info!("[dry-run] fan duty -> {} (0x{:02x})", duty, duty.raw());
        self.last = Some(duty);
        Ok(())
    }
}
