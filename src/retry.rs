//! Contention-only retry with bounded exponential backoff.
//!
//! Deadlock and serialization failures are transient by definition: the
//! database aborted one transaction of a cycle and re-running it is safe.
//! Everything else propagates immediately.

use crate::error::AppError;
use crate::metrics::Metrics;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const BASE_DELAY: Duration = Duration::from_millis(10);
const MAX_ATTEMPTS: u32 = 3;

/// Run `operation`, re-running it on contention errors.
///
/// Sleeps `BASE_DELAY * 2^(attempt-1)` between attempts, at most
/// `MAX_ATTEMPTS` attempts total. Exhausting the budget surfaces
/// [`AppError::Contention`].
pub async fn retry_on_contention<F, Fut, T>(
    metrics: &Metrics,
    op_name: &str,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(op = op_name, attempt, "operation succeeded after contention retry");
                }
                return Ok(result);
            }
            Err(err) if err.is_contention() => {
                if attempt >= MAX_ATTEMPTS {
                    tracing::error!(
                        op = op_name,
                        attempt,
                        "contention retry budget exhausted"
                    );
                    return Err(AppError::Contention);
                }

                metrics.record_deadlock_retry();
                let delay = BASE_DELAY * 2u32.pow(attempt - 1);
                tracing::warn!(
                    op = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "database contention, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
