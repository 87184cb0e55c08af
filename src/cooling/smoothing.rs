//! Rolling-window temperature smoothing.
//!
//! Each GPU gets a FIFO window of its last `capacity` readings; its
//! smoothed temperature is the window mean. A partially filled window
//! is averaged over what it holds, so the first reading already yields a
//! value. The per-GPU means are then collapsed into one driving
//! temperature according to [`Aggregation`], which defaults to the
//! hottest GPU.

use std::collections::{BTreeMap, VecDeque};

use crate::config::Aggregation;
use crate::device::TemperatureSample;

/// Smoothed temperatures for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedTemperature {
    /// Window mean per device, ordered by device id.
    pub per_device: Vec<(String, f32)>,
    /// Temperature that drives the fan curve.
    pub driving: f32,
    pub aggregation: Aggregation,
}

/// Per-device ring buffers plus the aggregation policy.
#[derive(Debug, Clone)]
pub struct Smoother {
    capacity: usize,
    aggregation: Aggregation,
    windows: BTreeMap<String, VecDeque<f32>>,
}

impl Smoother {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, aggregation: Aggregation) -> Self {
        Self {
            capacity: capacity.max(1),
            aggregation,
            windows: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of readings currently held for `device_id`.
    pub fn window_len(&self, device_id: &str) -> usize {
        self.windows.get(device_id).map_or(0, VecDeque::len)
    }

    /// Number of devices being tracked.
    pub fn device_count(&self) -> usize {
        self.windows.len()
    }

    /// Drop every window.
    pub fn clear(&mut self) {
        self.windows.clear();
    }

    /// Push one cycle's readings and return the smoothed result.
    ///
    /// Devices missing from `samples` lose their window so a GPU that
    /// stopped reporting cannot hold the fans on stale data. Samples
    /// sharing a device id count once, at their maximum. Returns
    /// `None` for an empty reading, leaving all windows untouched.
    pub fn update(&mut self, samples: &[TemperatureSample]) -> Option<SmoothedTemperature> {
        if samples.is_empty() {
            return None;
        }

        // One value per device and cycle; duplicate ids keep the hottest
        let mut latest: BTreeMap<&str, f32> = BTreeMap::new();
        for sample in samples {
            latest
                .entry(sample.device_id.as_str())
                .and_modify(|t| *t = t.max(sample.celsius))
                .or_insert(sample.celsius);
        }

        self.windows.retain(|id, _| latest.contains_key(id.as_str()));

        let capacity = self.capacity;
        for (id, celsius) in latest {
            let window = self
                .windows
                .entry(id.to_string())
                .or_insert_with(|| VecDeque::with_capacity(capacity));
            if window.len() == capacity {
                window.pop_front();
            }
            window.push_back(celsius);
        }

        let per_device: Vec<(String, f32)> = self
            .windows
            .iter()
            .map(|(id, window)| (id.clone(), mean(window)))
            .collect();

        let driving = match self.aggregation {
            Aggregation::Max => per_device
                .iter()
                .map(|(_, t)| *t)
                .fold(f32::NEG_INFINITY, f32::max),
            Aggregation::Mean => {
                per_device.iter().map(|(_, t)| *t).sum::<f32>() / per_device.len() as f32
            }
        };

        Some(SmoothedTemperature {
            per_device,
            driving,
            aggregation: self.aggregation,
        })
    }
}

fn mean(window: &VecDeque<f32>) -> f32 {
    window.iter().sum::<f32>() / window.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, celsius: f32) -> TemperatureSample {
        TemperatureSample::new(id, celsius)
    }

    #[test]
    fn test_partial_window_uses_available_samples() {
        let mut smoother = Smoother::new(10, Aggregation::Max);
        let first = smoother.update(&[sample("card0", 60.0)]).unwrap();
        assert_eq!(first.driving, 60.0);

        let second = smoother.update(&[sample("card0", 70.0)]).unwrap();
        assert_eq!(second.driving, 65.0);
        assert_eq!(smoother.window_len("card0"), 2);
    }

    #[test]
    fn test_duplicate_device_ids_keep_hottest() {
        let mut smoother = Smoother::new(10, Aggregation::Max);
        let smoothed = smoother
            .update(&[sample("amdgpu edge", 50.0), sample("amdgpu edge", 90.0)])
            .unwrap();
        assert_eq!(smoothed.driving, 90.0);
        assert_eq!(smoothed.per_device, vec![("amdgpu edge".to_string(), 90.0)]);
        assert_eq!(smoother.window_len("amdgpu edge"), 1);
    }

    #[test]
    fn test_window_depends_only_on_last_n() {
        let n = 4;
        let mut a = Smoother::new(n, Aggregation::Max);
        let mut b = Smoother::new(n, Aggregation::Max);

        // Different histories, same last n readings
        for t in [10.0, 20.0, 30.0] {
            a.update(&[sample("card0", t)]);
        }
        for t in [95.0, 90.0, 85.0, 80.0, 75.0] {
            b.update(&[sample("card0", t)]);
        }

        let mut last_a = None;
        let mut last_b = None;
        for t in [50.0, 52.0, 54.0, 56.0] {
            last_a = a.update(&[sample("card0", t)]);
            last_b = b.update(&[sample("card0", t)]);
        }

        assert_eq!(a.window_len("card0"), n);
        assert_eq!(last_a.unwrap().driving, 53.0);
        assert_eq!(last_b.unwrap().driving, 53.0);
    }

    #[test]
    fn test_max_aggregation_follows_hottest_gpu() {
        let mut smoother = Smoother::new(2, Aggregation::Max);
        smoother.update(&[sample("card0", 50.0), sample("card1", 80.0)]);
        let result = smoother
            .update(&[sample("card0", 52.0), sample("card1", 84.0)])
            .unwrap();
        assert_eq!(result.driving, 82.0);
        assert_eq!(
            result.per_device,
            vec![("card0".to_string(), 51.0), ("card1".to_string(), 82.0)]
        );
    }

    #[test]
    fn test_mean_aggregation() {
        let mut smoother = Smoother::new(3, Aggregation::Mean);
        let result = smoother
            .update(&[sample("card0", 50.0), sample("card1", 70.0)])
            .unwrap();
        assert_eq!(result.driving, 60.0);
        assert_eq!(result.aggregation, Aggregation::Mean);
    }

    #[test]
    fn test_missing_device_is_evicted() {
        let mut smoother = Smoother::new(5, Aggregation::Max);
        smoother.update(&[sample("card0", 50.0), sample("card1", 90.0)]);
        let result = smoother.update(&[sample("card0", 50.0)]).unwrap();
        assert_eq!(smoother.device_count(), 1);
        assert_eq!(result.driving, 50.0);
    }

    #[test]
    fn test_empty_update_keeps_windows() {
        let mut smoother = Smoother::new(5, Aggregation::Max);
        smoother.update(&[sample("card0", 50.0)]);
        assert!(smoother.update(&[]).is_none());
        assert_eq!(smoother.window_len("card0"), 1);
    }

    #[test]
    fn test_zero_capacity_treated_as_one() {
        let mut smoother = Smoother::new(0, Aggregation::Max);
        smoother.update(&[sample("card0", 40.0)]);
        let result = smoother.update(&[sample("card0", 60.0)]).unwrap();
        assert_eq!(smoother.capacity(), 1);
        assert_eq!(result.driving, 60.0);
    }
}
