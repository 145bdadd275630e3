// Controller configuration

use std::time::Duration;

/// Default playhead polling interval (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Playback controller settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Interval between progress notifications while playing
    pub poll_interval: Duration,
}

impl ControllerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        // A zero interval would spin the polling thread
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(ControllerConfig::default().poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = ControllerConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }
}
