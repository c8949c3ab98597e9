//! Database query timeout helpers
//!
//! Wraps store operations so a stalled connection surfaces as
//! [`StoreError::Timeout`] instead of hanging a room actor.

use std::{future::Future, time::Duration};
use tokio::time::timeout;

use crate::store::{StoreError, StoreResult};

/// Default timeout for single statements (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a store operation, failing with [`StoreError::Timeout`] once
/// `duration` elapses.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_budget() {
        let result = with_timeout(DEFAULT_QUERY_TIMEOUT, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn stalled_operations_time_out() {
        let duration = Duration::from_millis(10);
        let result: StoreResult<()> = with_timeout(duration, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == duration));
        assert!(err.to_string().contains("timed out"));
    }
}
