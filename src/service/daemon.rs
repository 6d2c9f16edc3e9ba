//! Repeat a pass on a fixed interval until Ctrl-C.

use std::future::Future;
use std::time::Duration;

use crate::error::ShopwatchError;

/// Runs `pass` immediately and then every `interval`, logging failures,
/// until `shutdown` resolves. A pass already in progress is finished
/// before the loop exits.
pub async fn run_periodic<F, Fut, T, S>(name: &str, interval: Duration, mut pass: F, shutdown: S)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ShopwatchError>>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!(pass = name, "shutdown requested, stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        if let Err(e) = pass().await {
            tracing::error!(pass = name, error = %e, "pass failed");
        }
    }
}

/// Resolves when the process receives Ctrl-C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
