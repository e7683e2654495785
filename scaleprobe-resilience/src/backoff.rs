//! Backoff delay calculation

use rand::Rng;
use std::time::Duration;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,

    /// delay = initial_delay * base^(attempt-1)
    Exponential { base: f64 },
}

impl BackoffStrategy {
    /// A multiplier of 1.0 or less degenerates to a fixed delay
    pub fn from_multiplier(multiplier: f64) -> Self {
        if multiplier > 1.0 {
            BackoffStrategy::Exponential { base: multiplier }
        } else {
            BackoffStrategy::Fixed
        }
    }
}

/// Backoff delay calculator
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    strategy: BackoffStrategy,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffCalculator {
    pub fn new(
        strategy: BackoffStrategy,
        initial_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> Self {
        Self {
            strategy,
            initial_delay,
            max_delay,
            jitter,
        }
    }

    /// Delay after the given failed attempt (1-indexed), capped at `max_delay`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped = self.base_delay(attempt).min(self.max_delay);
        if self.jitter {
            Self::with_jitter(capped)
        } else {
            capped
        }
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Exponential { base } => {
                if attempt == 0 {
                    return Duration::ZERO;
                }
                let factor = base.powi(attempt as i32 - 1);
                Duration::from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            }
        }
    }

    // +-20%
    fn with_jitter(delay: Duration) -> Duration {
        let factor = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }
}
