//! Fan duty cycle value type.

use crate::protocol::ipmi::duty_to_raw;

/// A duty cycle percentage, always within the bounds it was built with.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FanDutyCycle(f32);

impl FanDutyCycle {
    /// Build a duty cycle clamped to `[min, max]` percent.
    ///
    /// NaN maps to `max`: an unknown demand is treated as the worst case.
    pub fn new(percent: f32, min: u8, max: u8) -> Self {
        let (min, max) = (min.min(max) as f32, max as f32);
        if percent.is_nan() {
            return Self(max);
        }
        Self(percent.clamp(min, max))
    }

    /// Duty cycle bounded only by the hardware range 0-100%.
    pub fn from_percent(percent: f32) -> Self {
        Self::new(percent, 0, 100)
    }

    pub fn percent(self) -> f32 {
        self.0
    }

    /// Integer percentage sent to the fan controller.
    pub fn raw(self) -> u8 {
        duty_to_raw(self.0)
    }
}

impl std::fmt::Display for FanDutyCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duty_clamped_to_bounds() {
        assert_eq!(FanDutyCycle::new(5.0, 18, 100).percent(), 18.0);
        assert_eq!(FanDutyCycle::new(150.0, 18, 100).percent(), 100.0);
        assert_eq!(FanDutyCycle::new(42.5, 18, 100).percent(), 42.5);
    }

    #[test]
    fn test_nan_duty_is_max() {
        assert_eq!(FanDutyCycle::new(f32::NAN, 18, 90).percent(), 90.0);
    }

    #[test]
    fn test_raw_rounds() {
        assert_eq!(FanDutyCycle::from_percent(32.5).raw(), 33);
        assert_eq!(FanDutyCycle::from_percent(100.0).raw(), 100);
    }

    #[test]
    fn test_display() {
        assert_eq!(FanDutyCycle::from_percent(32.46).to_string(), "32.5%");
    }
}
