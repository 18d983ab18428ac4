//! Flush timing: how long a scheduled flush waits before touching the URL.
//!
//! Browsers rate-limit history updates, so consecutive flushes are spaced by
//! a throttle. The wait is the remainder of the throttle window since the
//! previous flush, scaled by the adapter's
//! [`rate_limit_factor`](crate::adapter::Adapter::rate_limit_factor):
//!
//! ```rust
//! use query_state::throttle::flush_delay;
//! use std::time::Duration;
//!
//! let throttle = Duration::from_millis(50);
//!
//! // First flush ever: no wait.
//! assert_eq!(flush_delay(throttle, None, 1.0), Duration::ZERO);
//! // 20ms after the previous flush: wait out the remaining 30ms.
//! assert_eq!(
//!     flush_delay(throttle, Some(Duration::from_millis(20)), 1.0),
//!     Duration::from_millis(30)
//! );
//! // Test adapters use a factor of zero.
//! assert_eq!(
//!     flush_delay(throttle, Some(Duration::from_millis(20)), 0.0),
//!     Duration::ZERO
//! );
//! ```

use std::time::Duration;

/// Throttle used when no update asks for one.
pub const DEFAULT_THROTTLE_MS: u64 = 50;

/// Lower bound for a requested throttle.
pub const MIN_THROTTLE_MS: u64 = 50;

/// Timing configuration of an [`UpdateQueue`](crate::queue::UpdateQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Spacing between flushes when no entry sets `throttle_ms`.
    pub default_throttle: Duration,
    /// Requested throttles below this are raised to it.
    pub min_throttle: Duration,
    /// Minimum time a scheduled flush waits for more writes before it
    /// drains the queue.
    ///
    /// With the default of zero a batch is whatever was written before the
    /// flush task gets to run, which on a current-thread runtime is the rest
    /// of the caller's synchronous code. On a multi-thread runtime the task
    /// can start on another worker right away, so set a window there.
    pub batch_window: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
            min_throttle: Duration::from_millis(MIN_THROTTLE_MS),
            batch_window: Duration::ZERO,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn with_default_throttle(mut self, throttle: Duration) -> Self {
        self.default_throttle = throttle;
        self
    }

    #[must_use]
    pub fn with_min_throttle(mut self, min: Duration) -> Self {
        self.min_throttle = min;
        self
    }

    #[must_use]
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }
}

/// Throttle of a batch: the requested value raised to the minimum, or the
/// configured default when nothing was requested.
#[must_use]
pub fn effective_throttle(requested_ms: Option<u64>, config: &QueueConfig) -> Duration {
    let Some(ms) = requested_ms else {
        return config.default_throttle;
    };
    let requested = Duration::from_millis(ms);
    if requested < config.min_throttle {
        tracing::warn!(
            requested_ms = ms,
            min_ms = u64::try_from(config.min_throttle.as_millis()).unwrap_or(u64::MAX),
            "throttle below the minimum, clamping"
        );
        return config.min_throttle;
    }
    requested
}

/// `factor × clamp(throttle − since_last, 0, throttle)`.
///
/// A non-finite or non-positive factor means no wait.
#[must_use]
pub fn flush_delay(throttle: Duration, since_last: Option<Duration>, factor: f64) -> Duration {
    let Some(since_last) = since_last else {
        return Duration::ZERO;
    };
    if !factor.is_finite() || factor <= 0.0 {
        return Duration::ZERO;
    }
    let remaining = throttle.saturating_sub(since_last);
    Duration::try_from_secs_f64(remaining.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn no_previous_flush_means_no_wait() {
        assert_eq!(flush_delay(ms(500), None, 1.0), Duration::ZERO);
    }

    #[test]
    fn waits_out_remaining_window() {
        assert_eq!(flush_delay(ms(50), Some(ms(10)), 1.0), ms(40));
        assert_eq!(flush_delay(ms(50), Some(ms(50)), 1.0), Duration::ZERO);
        assert_eq!(flush_delay(ms(50), Some(ms(900)), 1.0), Duration::ZERO);
    }

    #[test]
    fn factor_scales_delay() {
        assert_eq!(flush_delay(ms(100), Some(ms(0)), 2.0), ms(200));
        assert_eq!(flush_delay(ms(100), Some(ms(50)), 0.5), ms(25));
        assert_eq!(flush_delay(ms(100), Some(ms(0)), 0.0), Duration::ZERO);
        assert_eq!(flush_delay(ms(100), Some(ms(0)), -1.0), Duration::ZERO);
        assert_eq!(flush_delay(ms(100), Some(ms(0)), f64::NAN), Duration::ZERO);
    }

    #[test]
    fn unit_factor_keeps_exact_remainder() {
        assert_eq!(flush_delay(ms(50), Some(ms(17)), 1.0), ms(33));
        assert_eq!(
            flush_delay(ms(50), Some(Duration::from_nanos(1)), 1.0),
            Duration::from_nanos(49_999_999)
        );
    }

    #[test]
    fn effective_throttle_clamps_to_minimum() {
        let config = QueueConfig::default();
        assert_eq!(effective_throttle(None, &config), ms(DEFAULT_THROTTLE_MS));
        assert_eq!(effective_throttle(Some(10), &config), ms(MIN_THROTTLE_MS));
        assert_eq!(effective_throttle(Some(300), &config), ms(300));

        let relaxed = config
            .with_min_throttle(Duration::ZERO)
            .with_default_throttle(ms(5));
        assert_eq!(effective_throttle(Some(10), &relaxed), ms(10));
        assert_eq!(effective_throttle(None, &relaxed), ms(5));
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_scaled_throttle(
            throttle in 0u64..10_000,
            since in 0u64..20_000,
            factor in 0.0f64..4.0,
        ) {
            let delay = flush_delay(ms(throttle), Some(ms(since)), factor);
            let bound = ms(throttle).as_secs_f64() * factor;
            prop_assert!(delay.as_secs_f64() <= bound + 1e-9);
        }
    }
}
