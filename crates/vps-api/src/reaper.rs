use std::time::Duration;

use chrono::{TimeDelta, Utc};
use vps_infra::types::ProvisionOutcome;
use vps_store::models::ServerStatus;

use crate::orders::{OrderError, OrderLifecycleManager};

/// Spawn the background task that fails orders stuck in `Pending`.
pub fn spawn_reaper(manager: OrderLifecycleManager, timeout: Duration, interval: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        loop {
            interval.tick().await;
            let expired = reap_abandoned(&manager, timeout).await;
            if expired > 0 {
                tracing::info!(expired, "reaper: failed abandoned orders");
            }
        }
    });
}

/// Feed a timeout failure for every record pending longer than `timeout`.
///
/// Returns how many records were moved to `Failed`. A record whose real
/// outcome lands first is skipped by the stale check.
pub async fn reap_abandoned(manager: &OrderLifecycleManager, timeout: Duration) -> usize {
    let Ok(max_age) = TimeDelta::from_std(timeout) else {
        return 0;
    };
    let cutoff = Utc::now() - max_age;

    let pending = manager.store().list_by_status(ServerStatus::Pending).await;
    let mut expired = 0;

    for record in pending.iter().filter(|r| r.created_at <= cutoff) {
        let outcome = ProvisionOutcome::Failure {
            reason: format!("provisioning timed out after {}s", timeout.as_secs()),
        };

        match manager.on_provisioning_outcome(record.id, outcome).await {
            Ok(_) => {
                tracing::warn!(server_id = %record.id, "reaper: order abandoned, marked failed");
                expired += 1;
            }
            Err(OrderError::StaleOutcome { .. }) => {}
            Err(e) => {
                tracing::error!(server_id = %record.id, error = %e, "reaper: failed to expire order");
            }
        }
    }

    expired
}
