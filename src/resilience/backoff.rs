//! Fibonacci cool-down sequence for auto-blocking.
//!
//! Each call to [`BackoffSequence::next`] returns the next block window and
//! grows the sequence as `f(n) = f(n-1) + f(n-2)`, seeded so the first two
//! windows both equal the configured minimum:
//!
//! ```text
//! min = 40s → 40s, 40s, 80s, 120s, 200s, 320s, ...
//! ```
//!
//! The sequence is unbounded; callers clamp if they need a ceiling.
//! Not synchronised: the owning guard serialises access.

use std::time::Duration;

/// Default minimum block window.
pub const DEFAULT_MIN_BLOCK: Duration = Duration::from_secs(40);

#[derive(Debug, Clone)]
pub struct BackoffSequence {
    start: Duration,
    current: Duration,
    following: Duration,
}

impl BackoffSequence {
    /// Create a sequence whose first value is `start`.
    pub fn new(start: Duration) -> Self {
        Self {
            start,
            current: start,
            following: start,
        }
    }

    /// Return the next cool-down and advance the sequence.
    pub fn next(&mut self) -> Duration {
        let value = self.current;
        self.current = self.following;
        self.following = value.saturating_add(self.following);
        value
    }

    /// Restore the sequence to its initial state.
    pub fn reset(&mut self) {
        self.current = self.start;
        self.following = self.start;
    }

    /// The configured minimum.
    pub fn start(&self) -> Duration {
        self.start
    }
}

impl Default for BackoffSequence {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BLOCK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_fibonacci_growth_from_minimum() {
        let mut backoff = BackoffSequence::default();
        let produced: Vec<Duration> = (0..7).map(|_| backoff.next()).collect();
        assert_eq!(produced, secs(&[40, 40, 80, 120, 200, 320, 520]));
    }

    #[test]
    fn test_reset_restarts_at_minimum() {
        let mut backoff = BackoffSequence::new(Duration::from_secs(10));
        backoff.next();
        backoff.next();
        assert_eq!(backoff.next(), Duration::from_secs(20));

        backoff.reset();
        assert_eq!(backoff.next(), Duration::from_secs(10));
        assert_eq!(backoff.next(), Duration::from_secs(10));
        assert_eq!(backoff.next(), Duration::from_secs(20));
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let mut backoff = BackoffSequence::new(Duration::MAX / 2);
        for _ in 0..5 {
            backoff.next();
        }
        assert_eq!(backoff.next(), Duration::MAX);
    }
}
