use std::time::Duration;

use crate::services::holds::HoldService;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the expired-holds job: one sweep per minute.
///
/// The loop is sequential, so a slow sweep delays the next tick instead of
/// overlapping it. Fleet-wide single-running is the deployment scheduler's
/// contract.
pub fn start(holds: HoldService) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = holds.process_expired().await {
                tracing::error!(error = %e, "expired-holds sweep failed");
            }
            tokio::time::sleep(SWEEP_INTERVAL).await;
        }
    });
}
