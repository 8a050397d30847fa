//! Fixed-interval polling for asynchronous provider operations.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::{ClientError, ClientResult};

/// Call `check` every `interval` until it yields `Some`.
///
/// Errors from `check` abort polling. With a `ceiling`, polling fails with
/// [`ClientError::Timeout`] once that much time has passed.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    ceiling: Option<Duration>,
    label: &str,
    mut check: F,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<Option<T>>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if let Some(value) = check().await? {
            debug!(label, attempt, "Polling finished");
            return Ok(value);
        }

        // The last wait is shortened so one check lands on the ceiling itself.
        let wait = match ceiling {
            Some(ceiling) => {
                let remaining = ceiling.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(ClientError::Timeout(format!(
                        "{} did not finish within {}s",
                        label,
                        ceiling.as_secs()
                    )));
                }
                interval.min(remaining)
            }
            None => interval,
        };

        debug!(label, attempt, "Not ready, waiting");
        sleep(wait).await;
    }
}
