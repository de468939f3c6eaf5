//! Supervised restart and bounded retry.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Delay before a supervised task is restarted.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Attempts for transport-level publications (commands, telemetry writes).
pub const TRANSPORT_RETRIES: u32 = 60;

/// Attempts for inventory-delta publications.
pub const DELTA_RETRIES: u32 = 10;

/// Delay between retry attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Run `task` forever, restarting it 1 second after every exit.
///
/// A task that returns is logged as terminated; a task that fails is
/// logged with its cause. Either way it is re-invoked after
/// [`RESTART_DELAY`]. The only way out is cancellation from the caller
/// (dropping or aborting the surrounding tokio task), which propagates
/// into the inner future at its next suspension point.
pub async fn supervise<F, Fut>(name: &str, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    loop {
        match task().await {
            Ok(()) => warn!("background task {name:?} terminated, restarting"),
            Err(e) => warn!("background task {name:?} failed, restarting: {e:#}"),
        }
        tokio::time::sleep(RESTART_DELAY).await;
    }
}

/// Invoke `op` up to `attempts` times, sleeping `delay` between attempts.
///
/// The last failure is re-raised. Intermediate failures are logged at
/// WARN; callers that can afford to lose the operation handle the final
/// error themselves.
pub async fn with_retries<T, E, F, Fut>(
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!("attempt {attempt}/{attempts} failed, retrying: {e}");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
