use core::time::Duration;

/// Attempts made before giving up on a single participant.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Unit of the linear backoff schedule.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);

/// How long to wait after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait the same interval after every failure.
    Fixed(Duration),
    /// Wait `base * (attempts + 1)` after the `attempts`-th failure.
    Linear { base: Duration },
}

impl Backoff {
    /// Delay after `attempts` failed attempts (1-based).
    pub fn delay(&self, attempts: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Linear { base } => base.saturating_mul(attempts.saturating_add(1)),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Linear {
            base: DEFAULT_BASE_DELAY,
        }
    }
}

/// Retry configuration for one allocation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on attempts. At least one attempt is always made.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Wall-clock budget for the whole call, independent of
    /// `max_attempts * delay`. `None` leaves only the attempt bound.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Total time spent sleeping when every attempt fails.
    ///
    /// No sleep follows the final attempt, so this sums the delays after
    /// failures `1..max_attempts`.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|attempts| self.backoff.delay(attempts))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_delay_grows_with_attempts() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(150));
        assert_eq!(backoff.delay(49), Duration::from_millis(2500));
    }

    #[test]
    fn default_schedule_totals_sixty_three_seconds() {
        // 50ms * (2 + 3 + ... + 50)
        let policy = RetryPolicy::default();
        assert_eq!(policy.total_backoff(), Duration::from_millis(50 * 1274));
    }

    #[test]
    fn single_attempt_never_sleeps() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.total_backoff(), Duration::ZERO);
        assert_eq!(Backoff::None.delay(10), Duration::ZERO);
        assert_eq!(
            Backoff::Fixed(Duration::from_millis(5)).delay(10),
            Duration::from_millis(5)
        );
    }
}
