//! Retry policy for tunnel reconnects: exponential backoff with jitter.
//!
//! A tunnel retries forever. The only way out of the loop is the tunnel's
//! running flag: [`StopAwareBackoff`] reports "stop" as soon as it is
//! cleared, whatever the backoff state says.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Decides how long to wait between reconnect attempts.
pub trait RetryPolicy: Send {
    /// Delay before the next attempt, or `None` to stop retrying.
    fn next_delay(&mut self) -> Option<Duration>;

    /// Go back to the base delay after a successful attempt.
    fn reset(&mut self);
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn next_delay(&mut self) -> Option<Duration> {
        (**self).next_delay()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Backoff tuning, as read from the `retry` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffSettings {
    /// First delay after a failure.
    pub initial_delay_ms: u64,
    /// Upper bound for the un-jittered delay.
    pub max_delay_ms: u64,
    /// Growth factor applied after every failure.
    pub multiplier: f64,
    /// Randomization factor: the delay is scaled by a value in `[1 - j, 1 + j]`.
    pub jitter: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 60_000,
            multiplier: 1.5,
            jitter: 0.5,
        }
    }
}

impl BackoffSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 {
            return Err(Error::InvalidRetry(
                "initialDelayMs must be positive".to_string(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::InvalidRetry(format!(
                "maxDelayMs ({}) must be at least initialDelayMs ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::InvalidRetry(format!(
                "multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(Error::InvalidRetry(format!(
                "jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

/// Exponential backoff: base delay, fixed multiplier, capped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    settings: BackoffSettings,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(settings: BackoffSettings) -> Self {
        let current = settings.initial_delay();
        Self { settings, current }
    }

    /// The delay the next call will be based on, before jitter.
    pub fn current_delay(&self) -> Duration {
        self.current
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        let base = self.current;

        // Exponential growth, capped at max_delay
        self.current = Duration::from_secs_f64(
            (base.as_secs_f64() * self.settings.multiplier)
                .min(self.settings.max_delay().as_secs_f64()),
        );

        if self.settings.jitter <= 0.0 {
            return Some(base);
        }

        let j = self.settings.jitter;
        let factor = rand::rng().random_range((1.0 - j)..=(1.0 + j));
        Some(Duration::from_secs_f64(base.as_secs_f64() * factor))
    }

    fn reset(&mut self) {
        self.current = self.settings.initial_delay();
    }
}

/// Wraps a policy so that it stops as soon as the owning tunnel stops running.
pub struct StopAwareBackoff<P> {
    running: Arc<AtomicBool>,
    inner: P,
}

impl<P: RetryPolicy> StopAwareBackoff<P> {
    pub fn new(running: Arc<AtomicBool>, inner: P) -> Self {
        Self { running, inner }
    }
}

impl<P: RetryPolicy> RetryPolicy for StopAwareBackoff<P> {
    fn next_delay(&mut self) -> Option<Duration> {
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        self.inner.next_delay()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64, multiplier: f64) -> BackoffSettings {
        BackoffSettings {
            initial_delay_ms: initial_ms,
            max_delay_ms: max_ms,
            multiplier,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_grows_until_cap() {
        let mut backoff = ExponentialBackoff::new(no_jitter(100, 1_000, 2.0));
        let delays: Vec<u128> = (0..6)
            .map(|_| backoff.next_delay().unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = ExponentialBackoff::new(no_jitter(100, 1_000, 2.0));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current_delay(), Duration::from_millis(400));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let settings = BackoffSettings {
            initial_delay_ms: 1_000,
            max_delay_ms: 1_000,
            multiplier: 1.0,
            jitter: 0.5,
        };
        let mut backoff = ExponentialBackoff::new(settings);
        for _ in 0..100 {
            let d = backoff.next_delay().unwrap();
            assert!(d >= Duration::from_millis(500), "{:?} too short", d);
            assert!(d <= Duration::from_millis(1_500), "{:?} too long", d);
        }
    }

    #[test]
    fn test_stop_aware_stops_when_not_running() {
        let running = Arc::new(AtomicBool::new(true));
        let mut policy = StopAwareBackoff::new(
            running.clone(),
            ExponentialBackoff::new(no_jitter(100, 1_000, 2.0)),
        );

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));

        running.store(false, Ordering::SeqCst);
        assert_eq!(policy.next_delay(), None);

        // Reset does not revive a stopped tunnel
        policy.reset();
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn test_settings_validation() {
        assert!(BackoffSettings::default().validate().is_ok());
        assert!(no_jitter(0, 100, 2.0).validate().is_err());
        assert!(no_jitter(500, 100, 2.0).validate().is_err());
        assert!(no_jitter(100, 1_000, 0.5).validate().is_err());

        let mut settings = BackoffSettings::default();
        settings.jitter = 1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let settings: BackoffSettings = serde_json::from_str(r#"{"maxDelayMs": 5000}"#).unwrap();
        assert_eq!(settings.max_delay_ms, 5_000);
        assert_eq!(settings.initial_delay_ms, 500);
        assert_eq!(settings.multiplier, 1.5);
    }
}
