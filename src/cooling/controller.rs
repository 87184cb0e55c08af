//! The closed control loop.
//!
//! Every cycle reads the GPUs, smooths, maps through the curve, gates
//! through hysteresis and, if warranted, sets the fans:
//!
//! ```text
//! Idle -> Polling -> Deciding -> Actuating -> Idle
//! ```
//!
//! Failures of either external tool never stop the loop. Repeated
//! sensor failures escalate to full speed; actuation failures are
//! retried on the next cycle.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::config::FanConfig;
use crate::cooling::{
    ExponentialCurve, FanDutyCycle, HysteresisGate, Shutdown, SmoothedTemperature, Smoother,
};
use crate::device::{FanSink, TemperatureSource};
use crate::error::{ActuationError, SensorError};

// =============================================================================
// State
// =============================================================================

/// Where the loop is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Polling,
    Deciding,
    Actuating,
}

/// All mutable controller state. Owned by [`ControlLoop`], mutated once
/// per cycle, never persisted.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub smoother: Smoother,
    /// Duty most recently accepted by the fans (MIN_SPEED before the first).
    pub last_applied: FanDutyCycle,
    /// The last actuation failed, so the next proposal bypasses hysteresis.
    pub actuation_pending: bool,
    pub sensor_failures: u32,
    pub actuation_failures: u32,
    /// Fans forced to maximum after repeated sensor failures.
    pub in_fail_safe: bool,
    pub phase: LoopPhase,
    pub cycles: u64,
}

impl ControllerState {
    pub fn new(config: &FanConfig) -> Self {
        Self {
            smoother: Smoother::new(config.smoothing_samples, config.aggregation),
            last_applied: ExponentialCurve::from_config(config).min_duty(),
            actuation_pending: true,
            sensor_failures: 0,
            actuation_failures: 0,
            in_fail_safe: false,
            phase: LoopPhase::Idle,
            cycles: 0,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A new duty was accepted by the fans.
    Applied { temperature: f32, duty: FanDutyCycle },
    /// The curve moved less than the hysteresis threshold.
    Held {
        temperature: f32,
        proposed: FanDutyCycle,
        current: FanDutyCycle,
    },
    /// Sensor read failed, still below the fail-safe threshold.
    SensorFailed { consecutive: u32 },
    /// Sensor failures reached the threshold; fans are (being) forced to maximum.
    FailSafe { consecutive: u32, applied: bool },
    /// The fans rejected the duty; retried next cycle.
    ActuationFailed { duty: FanDutyCycle },
    /// Shutdown arrived before actuation; nothing was sent.
    Interrupted,
}

// =============================================================================
// ControlLoop
// =============================================================================

/// Fixed-rate GPU temperature to fan duty controller.
pub struct ControlLoop<S, F> {
    source: S,
    sink: F,
    curve: ExponentialCurve,
    gate: HysteresisGate,
    interval: Duration,
    failure_threshold: u32,
    state: ControllerState,
}

impl<S: TemperatureSource, F: FanSink> ControlLoop<S, F> {
    /// `config` is expected to have passed [`FanConfig::validate`].
    pub fn new(config: &FanConfig, source: S, sink: F) -> Self {
        let curve = ExponentialCurve::from_config(config);
        let gate = HysteresisGate::new(config.hysteresis, curve.min_duty(), curve.max_duty());
        Self {
            source,
            sink,
            gate,
            interval: config.check_interval(),
            failure_threshold: config.sensor_failure_threshold.max(1),
            state: ControllerState::new(config),
            curve,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn curve(&self) -> &ExponentialCurve {
        &self.curve
    }

    pub fn sink(&self) -> &F {
        &self.sink
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn enter(&mut self, phase: LoopPhase) {
        trace!("{:?} -> {:?}", self.state.phase, phase);
        self.state.phase = phase;
    }

    /// Send `duty` to the fans and record the result.
    fn actuate(&mut self, duty: FanDutyCycle) -> Result<(), ActuationError> {
        self.enter(LoopPhase::Actuating);
        match self.sink.apply(duty) {
            Ok(()) => {
                if self.state.actuation_failures > 0 {
                    info!(
                        "Fan control recovered after {} failed attempt(s)",
                        self.state.actuation_failures
                    );
                }
                self.state.actuation_failures = 0;
                self.state.actuation_pending = false;
                self.state.last_applied = duty;
                Ok(())
            }
            Err(e) => {
                self.state.actuation_failures += 1;
                self.state.actuation_pending = true;
                if self.state.actuation_failures >= self.failure_threshold {
                    error!(
                        "Failed to set fan duty {} ({} consecutive): {}",
                        duty, self.state.actuation_failures, e
                    );
                } else {
                    warn!(
                        "Failed to set fan duty {} ({} consecutive): {}; retrying next cycle",
                        duty, self.state.actuation_failures, e
                    );
                }
                Err(e)
            }
        }
    }

    /// Apply MIN_SPEED once so the fans never start from an unknown state.
    pub fn start(&mut self) -> Result<(), ActuationError> {
        let floor = self.curve.min_duty();
        info!("Applying initial fan duty {}", floor);
        let result = self.actuate(floor);
        self.enter(LoopPhase::Idle);
        result
    }

    fn read_smoothed(&mut self) -> Result<SmoothedTemperature, SensorError> {
        let samples = self.source.read()?;
        self.state
            .smoother
            .update(&samples)
            .ok_or_else(|| SensorError::ParseError {
                tool: self.source.name().to_string(),
                detail: "reading contained no GPUs".into(),
            })
    }

    fn on_sensor_failure(&mut self, err: SensorError, shutdown: &Shutdown) -> CycleOutcome {
        self.state.sensor_failures += 1;
        let consecutive = self.state.sensor_failures;

        if consecutive < self.failure_threshold {
            warn!(
                "GPU temperature read failed ({}/{}): {}",
                consecutive, self.failure_threshold, err
            );
            return CycleOutcome::SensorFailed { consecutive };
        }

        if !self.state.in_fail_safe {
            error!(
                "GPU temperature read failed {} times in a row ({}); forcing fans to maximum",
                consecutive, err
            );
            self.state.in_fail_safe = true;
            self.state.smoother.clear();
        } else {
            warn!(
                "GPU temperature still unavailable ({} consecutive): {}",
                consecutive, err
            );
        }

        let max = self.curve.max_duty();
        if self.state.last_applied == max && !self.state.actuation_pending {
            return CycleOutcome::FailSafe {
                consecutive,
                applied: false,
            };
        }
        if shutdown.is_triggered() {
            return CycleOutcome::Interrupted;
        }
        let applied = self.actuate(max).is_ok();
        CycleOutcome::FailSafe {
            consecutive,
            applied,
        }
    }

    /// Run steps Polling through Actuating once.
    pub fn run_cycle(&mut self, shutdown: &Shutdown) -> CycleOutcome {
        self.state.cycles += 1;
        self.enter(LoopPhase::Polling);

        let outcome = match self.read_smoothed() {
            Err(e) => self.on_sensor_failure(e, shutdown),
            Ok(smoothed) => {
                if self.state.in_fail_safe {
                    info!(
                        "GPU temperatures available again after {} failed read(s)",
                        self.state.sensor_failures
                    );
                    self.state.in_fail_safe = false;
                }
                self.state.sensor_failures = 0;
                self.decide_and_actuate(smoothed, shutdown)
            }
        };

        self.enter(LoopPhase::Idle);
        outcome
    }

    fn decide_and_actuate(
        &mut self,
        smoothed: SmoothedTemperature,
        shutdown: &Shutdown,
    ) -> CycleOutcome {
        self.enter(LoopPhase::Deciding);
        let temperature = smoothed.driving;
        let proposed = self.curve.speed(temperature);
        let current = self.state.last_applied;

        let decision = if self.state.actuation_pending {
            Some(proposed)
        } else {
            self.gate.decide(proposed, current)
        };

        let Some(duty) = decision else {
            debug!(
                "GPU {:.1}°C ({} of {} GPUs) -> {} held at {}",
                temperature,
                smoothed.aggregation,
                smoothed.per_device.len(),
                proposed,
                current
            );
            return CycleOutcome::Held {
                temperature,
                proposed,
                current,
            };
        };

        if shutdown.is_triggered() {
            debug!("Shutdown requested; skipping fan update to {}", duty);
            return CycleOutcome::Interrupted;
        }

        match self.actuate(duty) {
            Ok(()) => {
                info!(
                    "GPU {:.1}°C ({} of {} GPUs) -> fan {} (was {})",
                    temperature,
                    smoothed.aggregation,
                    smoothed.per_device.len(),
                    duty,
                    current
                );
                CycleOutcome::Applied { temperature, duty }
            }
            Err(_) => CycleOutcome::ActuationFailed { duty },
        }
    }

    /// Run until `shutdown` is triggered.
    ///
    /// Cycles start every `check_interval` measured from the previous
    /// cycle start. A cycle that overruns the interval is followed
    /// immediately by the next one, without trying to catch up on
    /// missed ticks.
    pub fn run(&mut self, shutdown: &Shutdown) {
        info!(
            "Fan control loop started: {} -> {}, every {:?}",
            self.source.name(),
            self.sink.name(),
            self.interval
        );

        // Failure is logged and retried by the first cycle
        let _ = self.start();

        let mut next_cycle = Instant::now();
        loop {
            let wait = next_cycle.saturating_duration_since(Instant::now());
            if shutdown.wait_timeout(wait) {
                break;
            }

            let cycle_start = Instant::now();
            self.run_cycle(shutdown);

            next_cycle = cycle_start + self.interval;
            let now = Instant::now();
            if now > next_cycle {
                warn!(
                    "Cycle took {:?}, longer than the {:?} interval",
                    now - cycle_start,
                    self.interval
                );
            }
        }

        info!(
            "Fan control loop stopped after {} cycles (last duty {})",
            self.state.cycles, self.state.last_applied
        );
    }
}
