//! Runtime-adjustable dispatch rate

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cycles per second, shared between the scheduler and the control route
#[derive(Debug, Clone)]
pub struct RateHandle(Arc<AtomicU64>);

impl RateHandle {
    pub fn new(rate: NonZeroU64) -> Self {
        Self(Arc::new(AtomicU64::new(rate.get())))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, rate: NonZeroU64) {
        self.0.store(rate.get(), Ordering::Relaxed);
    }

    /// Gap between two launches at the current rate
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.get().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_follows_rate() {
        let rate = RateHandle::new(NonZeroU64::new(4).unwrap());
        assert_eq!(rate.interval(), Duration::from_millis(250));

        let shared = rate.clone();
        shared.set(NonZeroU64::new(1000).unwrap());
        assert_eq!(rate.get(), 1000);
        assert_eq!(rate.interval(), Duration::from_millis(1));
    }
}
