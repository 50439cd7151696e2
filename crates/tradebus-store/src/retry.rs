//! Busy-retry with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use tradebus_core::StoreError;

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_DELAY: Duration = Duration::from_millis(25);
const MAX_DELAY: Duration = Duration::from_millis(500);

/// Run a store operation, retrying on transient `Busy` with exponential
/// backoff. Logical errors pass through untouched.
pub(crate) async fn with_backoff<T, F, Fut>(op: &str, mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = INITIAL_DELAY;
    let mut attempt = 1;

    loop {
        match f().await {
            Err(StoreError::Busy) if attempt < MAX_ATTEMPTS => {
                debug!(op, attempt, delay_ms = delay.as_millis() as u64, "store busy, backing off");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                attempt += 1;
            }
            Err(StoreError::Busy) => {
                warn!(op, attempts = MAX_ATTEMPTS, "store still busy after retries");
                return Err(StoreError::Busy);
            }
            other => return other,
        }
    }
}
