use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::connectivity::Connectivity;
use crate::sync::{DrainOutcome, SyncManager};

/// Start the drain loop. It runs a pass on every interval tick, whenever connectivity
/// changes to online and whenever `trigger` is notified, until shutdown is signaled.
pub fn spawn(
    manager: Arc<SyncManager>,
    connectivity: Connectivity,
    trigger: Arc<Notify>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    // Subscribed here so a transition right after `spawn` returns is not missed.
    let online_rx = connectivity.subscribe();
    tokio::spawn(run(manager, online_rx, trigger, interval, shutdown))
}

async fn run(
    manager: Arc<SyncManager>,
    mut online_rx: watch::Receiver<bool>,
    trigger: Arc<Notify>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("Sync worker started (interval {}s)", interval.as_secs());

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = trigger.notified() => {}
            changed = online_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // Changes made while a pass was running are coalesced into one, so an
                // offline blip during a drain only shows up here as "online now".
                if !*online_rx.borrow_and_update() {
                    continue;
                }
                tracing::debug!("Connectivity regained, draining queue");
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        match drain(&manager).await {
            DrainOutcome::Drained(report) => {
                tracing::debug!("Drain pass finished: {report:?}");
            }
            DrainOutcome::StoreUnavailable => {
                tracing::error!("Sync worker could not read the offline queue");
            }
            outcome => tracing::trace!("Drain pass skipped: {outcome:?}"),
        }
    }

    tracing::info!("Sync worker stopped");
}

/// Run a pass of our own. If another caller is mid-drain, wait for it and go again so
/// items queued behind it are not left for the next tick.
async fn drain(manager: &SyncManager) -> DrainOutcome {
    loop {
        match manager.process_queue().await {
            DrainOutcome::AlreadyDraining => manager.wait_idle().await,
            outcome => return outcome,
        }
    }
}
