//! Bounded-retry price lookups.

use std::time::Duration;
use tracing::{debug, warn};

use paperdesk_domain::{Price, Symbol};

use crate::error::{ExecError, ExecResult};
use crate::ports::PriceSource;

/// Retry budget for one price lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_backoff,
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn max_wait(&self) -> Duration {
        (0..self.attempts.saturating_sub(1)).fold(Duration::ZERO, |total, i| {
            total + self.initial_backoff.saturating_mul(1u32 << i.min(16))
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Fetch a price, retrying with exponential backoff.
///
/// Returns the last error once the budget is spent. The caller decides what
/// to do with an unavailable symbol; this never substitutes a value.
pub async fn fetch_price(source: &dyn PriceSource, symbol: &Symbol, policy: RetryPolicy) -> ExecResult<Price> {
    let mut backoff = policy.initial_backoff;
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        match source.get_price(symbol).await {
            Ok(price) => {
                if attempt > 1 {
                    debug!(symbol = %symbol, attempt, %price, "Price fetched after retry");
                }
                return Ok(price);
            },
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Price fetch failed"
                );
                last_error = Some(e);
            },
        }

        if attempt < policy.attempts {
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    Err(last_error.unwrap_or_else(|| ExecError::price_unavailable(symbol, "no attempts made")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubPriceSource;
    use rust_decimal_macros::dec;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_within_budget() {
        let source = StubPriceSource::new();
        let symbol = sym("SBIN");
        source.set_price(&symbol, dec!(812));
        source.fail_times(&symbol, 2);

        let price = fetch_price(&source, &symbol, RetryPolicy::new(3, Duration::from_millis(500)))
            .await
            .unwrap();

        assert_eq!(price.as_decimal(), dec!(812));
        assert_eq!(source.calls(&symbol), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_budget() {
        let source = StubPriceSource::new();
        let symbol = sym("SBIN");
        source.set_price(&symbol, dec!(812));
        source.fail_always(&symbol);

        let result = fetch_price(&source, &symbol, RetryPolicy::new(3, Duration::from_millis(500))).await;

        assert!(matches!(result, Err(ExecError::PriceUnavailable { .. })));
        assert_eq!(source.calls(&symbol), 3);
    }

    #[test]
    fn test_max_wait_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        // 500 + 1000
        assert_eq!(policy.max_wait(), Duration::from_millis(1500));
        assert_eq!(RetryPolicy::once().max_wait(), Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
