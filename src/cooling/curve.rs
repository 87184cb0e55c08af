//! Temperature to duty cycle transfer function.
//!
//! Between `temp_low` and `temp_high` the temperature is normalized to
//! `x` in (0, 1) and shaped as `x ^ factor`. A factor above 1.0 keeps the
//! fans near the floor at moderate load and ramps hard close to
//! `temp_high`; 1.0 is a straight line.

use crate::config::FanConfig;
use crate::cooling::FanDutyCycle;

/// Exponential fan curve with clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialCurve {
    temp_low: f32,
    temp_high: f32,
    min_speed: u8,
    max_speed: u8,
    factor: f32,
}

impl ExponentialCurve {
    pub fn new(temp_low: f32, temp_high: f32, min_speed: u8, max_speed: u8, factor: f32) -> Self {
        Self {
            temp_low,
            temp_high,
            min_speed,
            max_speed,
            factor,
        }
    }

    pub fn from_config(config: &FanConfig) -> Self {
        Self::new(
            config.temp_low,
            config.temp_high,
            config.min_speed,
            config.max_speed,
            config.exponential_factor,
        )
    }

    pub fn min_duty(&self) -> FanDutyCycle {
        self.clamped(self.min_speed as f32)
    }

    pub fn max_duty(&self) -> FanDutyCycle {
        self.clamped(self.max_speed as f32)
    }

    fn clamped(&self, percent: f32) -> FanDutyCycle {
        FanDutyCycle::new(percent, self.min_speed, self.max_speed)
    }

    /// Duty cycle for a temperature in °C.
    ///
    /// Pure and non-decreasing in `temp`. An unreadable (NaN) temperature
    /// yields the maximum.
    pub fn speed(&self, temp: f32) -> FanDutyCycle {
        if temp.is_nan() {
            return self.max_duty();
        }
        if temp <= self.temp_low {
            return self.min_duty();
        }
        if temp >= self.temp_high {
            return self.max_duty();
        }

        let x = (temp - self.temp_low) / (self.temp_high - self.temp_low);
        let y = x.powf(self.factor);
        let span = self.max_speed as f32 - self.min_speed as f32;
        self.clamped(self.min_speed as f32 + y * span)
    }

    /// Sample the curve every `step` degrees, one step either side of the ramp.
    pub fn table(&self, step: f32) -> Vec<(f32, FanDutyCycle)> {
        let step = if step.is_finite() && step > 0.0 { step } else { 1.0 };
        let start = self.temp_low - step;
        let end = self.temp_high + step;

        let mut rows = Vec::new();
        let mut i = 0u32;
        loop {
            let temp = start + step * i as f32;
            if temp > end + f32::EPSILON {
                break;
            }
            rows.push((temp, self.speed(temp)));
            i += 1;
        }
        rows
    }
}
