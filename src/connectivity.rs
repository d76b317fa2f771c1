use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Current network reachability, shared between the host-facing API, the optional probe,
/// the drain worker and the indicator.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the latest reachability signal. Returns true if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::info!("Connectivity lost");
            }
        }

        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Poll `url` with `HEAD` requests and feed the result into `connectivity`. Any HTTP
/// response counts as reachable; only transport failures mean offline.
pub fn spawn_probe(
    connectivity: Connectivity,
    url: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, String> {
    let client = reqwest::Client::builder()
        .timeout(interval.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| format!("Failed to build probe client: {e}"))?;

    Ok(tokio::spawn(async move {
        tracing::debug!("Connectivity probe started for {url}");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let reachable = match client.head(&url).send().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("Connectivity probe failed: {e}");
                    false
                }
            };
            connectivity.set_online(reachable);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Connectivity probe stopped");
    }))
}
