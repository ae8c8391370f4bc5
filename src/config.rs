//! # Runtime configuration.
//!
//! [`Config`] tunes the lifecycle service: event bus capacity and the
//! shutdown grace window. Values are clamped at the point of use, never
//! at construction, so a `Config` round-trips unchanged.

use std::time::Duration;

/// Tuning knobs for [`LifecycleService`](crate::LifecycleService).
#[derive(Debug, Clone)]
pub struct Config {
    /// Broadcast bus capacity (events). Clamped to at least 1.
    pub bus_capacity: usize,
    /// How long shutdown waits for registered join operations before
    /// giving up. `None` waits forever.
    pub grace: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            grace: Some(Duration::from_secs(60)),
        }
    }
}

impl Config {
    /// Sets the bus capacity.
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Sets the shutdown grace window. `None` waits forever.
    pub fn with_grace(mut self, grace: Option<Duration>) -> Self {
        self.grace = grace;
        self
    }

    /// Bus capacity with the lower bound applied.
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Effective grace window. `None` and a zero duration both mean "wait
    /// forever".
    pub fn grace_limit(&self) -> Option<Duration> {
        match self.grace {
            Some(grace) if !grace.is_zero() => Some(grace),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bus_capacity, 1024);
        assert_eq!(config.grace, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = Config::default().with_bus_capacity(0);
        assert_eq!(config.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_zero_grace_means_wait_forever() {
        let config = Config::default().with_grace(Some(Duration::ZERO));
        assert_eq!(config.grace_limit(), None);
        assert_eq!(Config::default().with_grace(None).grace_limit(), None);
        assert_eq!(
            Config::default().grace_limit(),
            Some(Duration::from_secs(60))
        );
    }
}
