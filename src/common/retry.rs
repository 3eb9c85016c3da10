// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Run a fallible async operation up to `max_attempts` times, doubling the
/// delay between attempts. Intended for transient RPC read failures only;
/// dispatch paths handle their own retries.
pub async fn with_backoff<F, Fut, T, E>(
    mut op: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = base_delay;
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                tracing::debug!(target: "retry", attempt, error = %e, "Transient failure, backing off");
                sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
