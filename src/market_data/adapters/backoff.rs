use std::time::Duration;

use rand::Rng;

/// Reconnect delay: `base * 2^attempt`, capped, plus up to `jitter` of extra
/// delay so several feeds do not reconnect in lockstep.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    cap: Duration,
    jitter: f64,
    attempt: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 0.1)
    }
}

impl ReconnectBackoff {
    /// `jitter` is a fraction of the computed delay, clamped into 0.0..=1.0.
    pub fn new(base: Duration, cap: Duration, jitter: f64) -> Self {
        Self {
            base,
            cap,
            jitter: if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 },
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(31));
        let delay = self.base.saturating_mul(factor).min(self.cap);
        self.attempt = self.attempt.saturating_add(1);

        if self.jitter == 0.0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=delay.as_secs_f64() * self.jitter);
        delay + Duration::from_secs_f64(extra)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
