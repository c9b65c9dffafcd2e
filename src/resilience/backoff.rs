//! Jittered exponential delays between status polls of a gateway update.

use std::time::Duration;

use rand::Rng;

use crate::config::schema::RetryConfig;

/// Delay before poll number `attempt` (1-based).
///
/// Doubles from `base_delay_ms` up to `max_delay_ms`, plus up to 10% jitter.
/// Attempt 0 polls immediately.
pub fn poll_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let Some(exponent) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let delay_ms = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(config.max_delay_ms);

    Duration::from_millis(delay_ms + jitter_ms(delay_ms))
}

fn jitter_ms(delay_ms: u64) -> u64 {
    match delay_ms / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    }
}
