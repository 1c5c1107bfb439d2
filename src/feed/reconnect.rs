//! Transport-level reconnection delay, matching the Socket.IO client defaults
//! (1s doubling to 5s, ±50% jitter, unlimited attempts).

use rand::Rng;
use std::time::Duration;

#[derive(Debug)]
pub struct ReconnectDelay {
    initial_ms: u64,
    max_ms: u64,
    randomization: f64,
    current_attempt: u32,
}

impl Default for ReconnectDelay {
    fn default() -> Self {
        Self::new(1_000, 5_000, 0.5)
    }
}

impl ReconnectDelay {
    pub fn new(initial_ms: u64, max_ms: u64, randomization: f64) -> Self {
        Self {
            initial_ms,
            max_ms,
            randomization: randomization.clamp(0.0, 1.0),
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let base = self
            .initial_ms
            .saturating_mul(2_u64.saturating_pow(self.current_attempt.min(16)));
        let mut delay = base as f64;

        if self.randomization > 0.0 {
            let deviation = self.randomization * delay;
            delay += rand::thread_rng().gen_range(-deviation..=deviation);
        }

        self.current_attempt = self.current_attempt.saturating_add(1);
        Duration::from_millis((delay.max(0.0) as u64).min(self.max_ms))
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let mut delay = ReconnectDelay::new(1_000, 5_000, 0.0);
        let delays: Vec<u64> = (0..5).map(|_| delay.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
        assert_eq!(delay.attempts(), 5);

        delay.reset();
        assert_eq!(delay.next_delay(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut delay = ReconnectDelay::default();
        for _ in 0..50 {
            let d = delay.next_delay().as_millis() as u64;
            assert!(d <= 5_000);
        }
    }
}
