//! Duty cycle hysteresis.
//!
//! Sensor jitter moves the curve output by a percent or so every poll.
//! The gate only lets a new duty through when it differs enough from
//! the applied one, except that reaching the floor or the ceiling is
//! never held back.

use crate::cooling::FanDutyCycle;

/// Suppresses duty changes smaller than `threshold` percentage points.
#[derive(Debug, Clone, PartialEq)]
pub struct HysteresisGate {
    threshold: f32,
    min: FanDutyCycle,
    max: FanDutyCycle,
}

impl HysteresisGate {
    pub fn new(threshold: f32, min: FanDutyCycle, max: FanDutyCycle) -> Self {
        Self {
            threshold: threshold.max(0.0),
            min,
            max,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn is_boundary(&self, duty: FanDutyCycle) -> bool {
        duty == self.min || duty == self.max
    }

    /// `Some(proposed)` if the fans should change, `None` to keep `last_applied`.
    ///
    /// A proposal equal to `last_applied` is always held, even with a
    /// zero threshold: re-sending the same duty changes nothing.
    pub fn decide(
        &self,
        proposed: FanDutyCycle,
        last_applied: FanDutyCycle,
    ) -> Option<FanDutyCycle> {
        if proposed == last_applied {
            return None;
        }
        if self.is_boundary(proposed) {
            return Some(proposed);
        }
        let delta = (proposed.percent() - last_applied.percent()).abs();
        (delta >= self.threshold).then_some(proposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duty(percent: f32) -> FanDutyCycle {
        FanDutyCycle::new(percent, 18, 100)
    }

    fn gate(threshold: f32) -> HysteresisGate {
        HysteresisGate::new(threshold, duty(18.0), duty(100.0))
    }

    #[test]
    fn test_small_change_suppressed() {
        assert_eq!(gate(3.0).decide(duty(51.0), duty(50.0)), None);
        assert_eq!(gate(3.0).decide(duty(48.5), duty(50.0)), None);
    }

    #[test]
    fn test_large_change_passes() {
        assert_eq!(gate(3.0).decide(duty(54.0), duty(50.0)), Some(duty(54.0)));
        assert_eq!(gate(3.0).decide(duty(47.0), duty(50.0)), Some(duty(47.0)));
    }

    #[test]
    fn test_boundaries_never_suppressed() {
        assert_eq!(gate(3.0).decide(duty(18.0), duty(19.0)), Some(duty(18.0)));
        assert_eq!(gate(3.0).decide(duty(100.0), duty(99.0)), Some(duty(100.0)));
        // even with a threshold wider than the whole range
        assert_eq!(gate(500.0).decide(duty(18.0), duty(50.0)), Some(duty(18.0)));
    }

    #[test]
    fn test_unchanged_boundary_is_held() {
        assert_eq!(gate(3.0).decide(duty(18.0), duty(18.0)), None);
        assert_eq!(gate(3.0).decide(duty(100.0), duty(100.0)), None);
    }

    #[test]
    fn test_zero_threshold_passes_any_change() {
        assert_eq!(gate(0.0).decide(duty(50.1), duty(50.0)), Some(duty(50.1)));
        assert_eq!(gate(0.0).decide(duty(50.0), duty(50.0)), None);
    }
}
