use serde_derive::Serialize;

use crate::heart_rate::HeartbeatSample;

/// How many trailing samples statistics are taken over by default
pub const DEFAULT_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingStatistics {
    pub mean: f64,
    /// Population standard deviation (divides by the window size, not size - 1)
    pub standard_deviation: f64,
    pub max: u16,
    pub min: u16,
}

impl RollingStatistics {
    /// Statistics over every sample given, `None` if empty.
    pub fn from_window(window: &[HeartbeatSample]) -> Option<Self> {
        let max = window.iter().map(|s| s.value).max()?;
        let min = window.iter().map(|s| s.value).min()?;

        let count = window.len() as f64;
        let mean = window.iter().map(|s| s.value as f64).sum::<f64>() / count;
        let variance = window
            .iter()
            .map(|s| (s.value as f64 - mean).powi(2))
            .sum::<f64>()
            / count;

        Some(Self {
            mean,
            standard_deviation: variance.sqrt(),
            max,
            min,
        })
    }

    /// Statistics over the last `window_size` samples.
    ///
    /// `None` until there are at least `window_size` samples.
    pub fn from_trailing(samples: &[HeartbeatSample], window_size: usize) -> Option<Self> {
        if window_size == 0 || samples.len() < window_size {
            return None;
        }
        Self::from_window(&samples[samples.len() - window_size..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[u16]) -> Vec<HeartbeatSample> {
        values.iter().map(|v| HeartbeatSample::now(*v)).collect()
    }

    #[test]
    fn mixed_window() {
        let window = samples(&[60, 70, 80, 90, 100, 60, 70, 80, 90, 100]);
        let stats = RollingStatistics::from_window(&window).unwrap();
        assert_eq!(stats.mean, 80.0);
        assert!((stats.standard_deviation - 14.142).abs() < 0.001);
        assert_eq!(stats.max, 100);
        assert_eq!(stats.min, 60);
    }

    #[test]
    fn flat_window() {
        let window = samples(&[75; 10]);
        let stats = RollingStatistics::from_window(&window).unwrap();
        assert_eq!(stats.mean, 75.0);
        assert_eq!(stats.standard_deviation, 0.0);
        assert_eq!(stats.max, 75);
        assert_eq!(stats.min, 75);
    }

    #[test]
    fn population_not_sample_deviation() {
        // Sample SD of [60, 80] would be ~14.14, population SD is 10
        let stats = RollingStatistics::from_window(&samples(&[60, 80])).unwrap();
        assert_eq!(stats.standard_deviation, 10.0);
    }

    #[test]
    fn empty_window() {
        assert_eq!(RollingStatistics::from_window(&[]), None);
    }

    #[test]
    fn trailing_uses_only_the_tail() {
        let mut values = vec![200; 15];
        values.extend_from_slice(&[60, 70, 80, 90, 100, 60, 70, 80, 90, 100]);
        let stats = RollingStatistics::from_trailing(&samples(&values), DEFAULT_WINDOW).unwrap();
        assert_eq!(stats.mean, 80.0);
        assert_eq!(stats.max, 100);

        assert_eq!(RollingStatistics::from_trailing(&samples(&[70; 9]), 10), None);
        assert_eq!(RollingStatistics::from_trailing(&samples(&[70; 9]), 0), None);
    }
}
