//! Best-effort commit retry ladder (spec §4.E).
//!
//! Snapshot commits during session mutations are retried up to 3 times with
//! backoff `10ms, 100ms, 1s` before the caller gives up and surfaces the
//! failure as an `error` event rather than losing the conversation.

use std::future::Future;
use std::time::Duration;

use forge_error::Error;
use tracing::warn;

/// Backoff ladder used for best-effort commit retries.
pub const BACKOFF: [Duration; 3] = [
    Duration::from_millis(10),
    Duration::from_millis(100),
    Duration::from_secs(1),
];

/// Run the initial attempt, then up to `BACKOFF.len()` retries with the
/// matching backoff before each. Returns the last error if every attempt
/// (initial + retries) failed.
pub async fn with_commit_retry<F, Fut, T>(operation: &str, mut attempt: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_err = match attempt().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    for (i, delay) in BACKOFF.iter().enumerate() {
        warn!(operation, retry = i + 1, error = %last_err, "snapshot commit failed, retrying");
        tokio::time::sleep(*delay).await;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => last_err = err,
        }
    }

    Err(last_err)
}

#[cfg(test)]
#[path = "retry.test.rs"]
mod tests;
