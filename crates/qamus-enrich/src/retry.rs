//! Retrying store operations that fail on lock contention.

use std::future::Future;

use qamus_core::store::StoreError;

use crate::config::RetryPolicy;

/// Run `op` until it succeeds, fails with a non-busy error, or the policy's
/// attempts are used up. Returns the last result together with the number of
/// retries that were made.
pub async fn retry_busy<T, E, F, Fut>(
  policy: &RetryPolicy,
  what: &'static str,
  mut op: F,
) -> (Result<T, E>, u32)
where
  E: StoreError,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let mut attempt = 1;
  loop {
    match op().await {
      Err(err) if err.is_busy() && attempt < policy.attempts => {
        let delay = policy.delay(attempt);
        tracing::warn!(
          attempt,
          delay_ms = delay.as_millis() as u64,
          error = %err,
          "{what}: store busy, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      result => return (result, attempt - 1),
    }
  }
}
