//! Adaptive request pacing and retry backoff.
//!
//! [`AdaptiveRateLimiter`] picks the wait before the next request from the
//! recent request rate, the recent error history, and a pressure factor fed
//! back from the blocking monitor. It never fails and never waits longer than
//! its cap.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;

/// Hard cap on any single delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);

const RATE_WINDOW: Duration = Duration::from_secs(60);
const ERROR_WINDOW: Duration = Duration::from_secs(300);
const ERROR_DECAY_AFTER: Duration = Duration::from_secs(600);
const HISTORY_RETENTION: Duration = Duration::from_secs(600);

#[derive(Debug, Default)]
struct LimiterState {
    request_times: VecDeque<Instant>,
    error_count: u32,
    last_error: Option<Instant>,
}

#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    base_delay: Duration,
    max_delay: Duration,
    state: Mutex<LimiterState>,
    /// Multiplier set from monitor alerts, `1.0` when healthy.
    pressure: Mutex<f64>,
}

impl AdaptiveRateLimiter {
    #[must_use]
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: MAX_DELAY,
            state: Mutex::new(LimiterState::default()),
            pressure: Mutex::new(1.0),
        }
    }

    #[must_use]
    pub fn from_millis(base_delay_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_delay_ms))
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Records a completed request attempt.
    pub fn record_request(&self, success: bool) {
        self.record_request_at(Instant::now(), success);
    }

    pub fn record_request_at(&self, now: Instant, success: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.request_times.push_back(now);
        while state
            .request_times
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > HISTORY_RETENTION)
        {
            state.request_times.pop_front();
        }

        if !success {
            state.error_count = state.error_count.saturating_add(1);
            state.last_error = Some(now);
        }
    }

    /// Sets the monitor-driven pressure multiplier, clamped to `[1.0, 4.0]`.
    pub fn set_pressure(&self, pressure: f64) {
        let clamped = if pressure.is_finite() {
            pressure.clamp(1.0, 4.0)
        } else {
            1.0
        };
        *self.pressure.lock().unwrap_or_else(PoisonError::into_inner) = clamped;
    }

    #[must_use]
    pub fn pressure(&self) -> f64 {
        *self.pressure.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .error_count
    }

    /// Computes the delay before the next request, with random jitter.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let jitter = rand::rng().random_range(0.0..=1.0);
        self.delay_at(Instant::now(), jitter)
    }

    /// Computes the delay at `now` for a jitter position in `[0, 1]` across
    /// the `base × 0.8 ..= base × 1.5` band.
    ///
    /// | Condition                          | Effect                       |
    /// |------------------------------------|------------------------------|
    /// | more than 20 requests in last 60 s | × 2.0                        |
    /// | more than 10 requests in last 60 s | × 1.5                        |
    /// | last error within 300 s            | × (1 + 0.5 × error count)    |
    /// | no error for 600 s                 | error count decays by one    |
    /// | monitor pressure                   | × pressure                   |
    ///
    /// The result is capped at [`MAX_DELAY`].
    pub fn delay_at(&self, now: Instant, jitter: f64) -> Duration {
        let pressure = self.pressure();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let mut secs = self.base_delay.as_secs_f64() * (0.8 + 0.7 * jitter);

        let recent = state
            .request_times
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < RATE_WINDOW)
            .count();
        if recent > 20 {
            secs *= 2.0;
        } else if recent > 10 {
            secs *= 1.5;
        }

        match state.last_error {
            Some(at) if now.saturating_duration_since(at) < ERROR_WINDOW => {
                secs *= 1.0 + f64::from(state.error_count) * 0.5;
            }
            Some(at) if now.saturating_duration_since(at) > ERROR_DECAY_AFTER => {
                state.error_count = state.error_count.saturating_sub(1);
            }
            _ => {}
        }

        secs *= pressure;

        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Sleeps for [`Self::next_delay`] and returns how long it waited.
    pub async fn wait(&self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

/// Backoff before retry number `attempt` (0-based): `base × (attempt + 1)`
/// with ±25 % jitter.
///
/// | Attempt | Sleep before next attempt (base = 2 s) |
/// |---------|----------------------------------------|
/// | 0       | 2 s ± 25 %                             |
/// | 1       | 4 s ± 25 %                             |
/// | 2       | 6 s ± 25 %                             |
///
/// Capped at [`MAX_DELAY`].
#[must_use]
pub fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    let jitter = rand::rng().random_range(0.75..=1.25);
    let secs = base.as_secs_f64() * f64::from(attempt.saturating_add(1)) * jitter;
    Duration::try_from_secs_f64(secs.min(MAX_DELAY.as_secs_f64())).unwrap_or(MAX_DELAY)
}
