//! Cooling control.
//!
//! The numeric pipeline ([`Smoother`] -> [`ExponentialCurve`] ->
//! [`HysteresisGate`]) and the [`ControlLoop`] that drives it.

mod controller;
mod curve;
mod duty;
mod hysteresis;
mod shutdown;
mod smoothing;

pub use controller::{ControlLoop, ControllerState, CycleOutcome, LoopPhase};
pub use curve::ExponentialCurve;
pub use duty::FanDutyCycle;
pub use hysteresis::HysteresisGate;
pub use shutdown::Shutdown;
pub use smoothing::{SmoothedTemperature, Smoother};
