use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How the watch is re-established after it closes.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub delay: Duration,
    /// None restarts forever.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_restarts: None,
        }
    }
}

/// Runs `run_once` to completion over and over, sleeping `policy.delay`
/// between runs. Returns when the restart budget is used up or `shutdown`
/// is cancelled. A run in progress is never interrupted here; `run_once`
/// watches the token itself.
pub async fn supervise<F, Fut>(
    policy: &RestartPolicy,
    shutdown: &CancellationToken,
    mut run_once: F,
) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut restarts = 0u32;
    loop {
        run_once().await;

        if shutdown.is_cancelled() {
            return restarts;
        }
        if policy.max_restarts.is_some_and(|max| restarts >= max) {
            info!("Giving up after {} reconnects", restarts);
            return restarts;
        }
        restarts += 1;

        warn!(
            "Watch connection closed, reconnecting in {}s...",
            policy.delay.as_secs_f32()
        );
        tokio::select! {
            _ = shutdown.cancelled() => return restarts,
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}
