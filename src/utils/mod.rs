//! Small shared utilities.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Rate limiter for repeated warnings.
///
/// `allow()` returns true at most once per period, so a hot drop path can
/// log without flooding the output.
#[derive(Debug)]
pub struct WarnThrottle {
    period: Duration,
    last: Mutex<Option<Instant>>,
}

impl WarnThrottle {
    /// Create a throttle with the given minimum period between hits.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(None),
        }
    }

    /// Whether a message may be emitted now.
    pub fn allow(&self) -> bool {
        let mut last = self.last.lock();
        let now = Instant::now();
        match *last {
            Some(t) if now.duration_since(t) < self.period => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_hit_allowed() {
        let throttle = WarnThrottle::new(Duration::from_secs(5));
        assert!(throttle.allow());
    }

    #[test]
    fn test_second_hit_suppressed() {
        let throttle = WarnThrottle::new(Duration::from_secs(5));
        assert!(throttle.allow());
        assert!(!throttle.allow());
    }

    #[test]
    fn test_allows_after_period() {
        let throttle = WarnThrottle::new(Duration::from_millis(10));
        assert!(throttle.allow());
        std::thread::sleep(Duration::from_millis(20));
        assert!(throttle.allow());
    }
}
