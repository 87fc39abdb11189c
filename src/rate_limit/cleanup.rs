use super::limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Periodically prune a limiter so idle identifiers do not accumulate.
///
/// The limiter never schedules its own cleanup; the application decides the
/// period when it builds its state. The task runs until the handle is aborted
/// or the runtime shuts down.
pub fn spawn_cleanup_task(
    name: &'static str,
    limiter: Arc<RateLimiter>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            endpoint = name,
            interval_secs = period.as_secs(),
            "Started rate limiter cleanup"
        );

        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = limiter.cleanup();
            debug!(
                endpoint = name,
                removed,
                tracked = limiter.tracked_identifiers(),
                "Rate limiter cleanup pass"
            );
        }
    })
}
