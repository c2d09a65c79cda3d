use crate::types::constants::{DEFAULT_RECONNECT_FALLBACK, RECONNECT_INTERVALS};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Timer for reconnection backoff.
///
/// Walks a fixed ladder of delays, repeating the last entry once the ladder
/// is exhausted, and spreads each delay over a ±25% jitter window so a fleet
/// of clients does not reconnect in lockstep. An optional attempt cap marks
/// the timer exhausted, at which point the caller gives up for good.
pub struct Timer {
    attempts: u32,
    intervals: Vec<u64>,
    max_attempts: Option<u32>,
}

impl Timer {
    pub fn new(intervals: Vec<u64>) -> Self {
        Self {
            attempts: 0,
            intervals,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        let base = self
            .intervals
            .get(self.attempts as usize)
            .copied()
            .unwrap_or_else(|| {
                self.intervals
                    .last()
                    .copied()
                    .unwrap_or(DEFAULT_RECONNECT_FALLBACK)
            });

        self.attempts += 1;

        let span = base / 4;
        let jittered = rand::thread_rng().gen_range(base.saturating_sub(span)..=base + span);
        Duration::from_millis(jittered)
    }

    /// Whether the attempt cap has been reached
    pub fn exhausted(&self) -> bool {
        self.max_attempts
            .map(|max| self.attempts >= max)
            .unwrap_or(false)
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Sleep through the next backoff delay
    pub async fn schedule_timeout(&mut self) {
        let delay = self.next_delay();
        sleep(delay).await;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(RECONNECT_INTERVALS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_follow_the_ladder_within_jitter() {
        let mut timer = Timer::default();

        // Ladder entries, then the last one repeating
        for base in [1000u64, 2000, 5000, 10000, 10000, 10000] {
            let delay = timer.next_delay().as_millis() as u64;
            let span = base / 4;
            assert!(
                delay >= base - span && delay <= base + span,
                "delay {} outside jitter window of base {}",
                delay,
                base
            );
        }
    }

    #[test]
    fn test_reset_restarts_the_ladder() {
        let mut timer = Timer::default();
        timer.next_delay();
        timer.next_delay();
        timer.reset();

        let delay = timer.next_delay().as_millis() as u64;
        assert!((750..=1250).contains(&delay));
    }

    #[test]
    fn test_exhausted_after_attempt_cap() {
        let mut timer = Timer::default().with_max_attempts(Some(2));
        assert!(!timer.exhausted());
        timer.next_delay();
        assert!(!timer.exhausted());
        timer.next_delay();
        assert!(timer.exhausted());
    }

    #[test]
    fn test_unbounded_timer_never_exhausts() {
        let mut timer = Timer::default();
        for _ in 0..50 {
            timer.next_delay();
        }
        assert!(!timer.exhausted());
    }
}
