use std::sync::Arc;
use std::time::Duration;

use application::rotation_service_impl::{RotationAppService, run_rotation_cycle};
use application::secrets_service_impl::SecretsAppService;
use ports::secondary::lease_store::LeaseStore;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background rotation scheduler loop.
///
/// Ticks at `tick_interval`, rotating every due policy under its lease
/// and sweeping expired grace windows. Cancellation is only honored
/// between cycles: an in-flight rotation always completes and registers
/// its grace expiry, so no secret is left without a defined lifetime.
pub async fn run_rotation_loop(
    secrets: Arc<RwLock<SecretsAppService>>,
    rotation: Arc<RwLock<RotationAppService>>,
    lease_store: Arc<dyn LeaseStore>,
    holder: String,
    tick_interval: Duration,
    shutdown: CancellationToken,
) {
    info!(
        holder = %holder,
        tick_secs = tick_interval.as_secs(),
        "rotation scheduler started"
    );

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown.cancelled() => break,
        }

        // The cycle itself is not raced against the token: once a
        // rotation starts it must finish and register its grace expiry.
        let rotated = run_rotation_cycle(&secrets, &rotation, lease_store.as_ref(), &holder).await;
        if rotated > 0 {
            debug!(rotated, "rotation cycle completed");
        }

        if shutdown.is_cancelled() {
            break;
        }
    }

    info!("rotation scheduler stopped");
}
