use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::events::EventBus;
use crate::indicator::QueueIndicator;
use crate::queue::QueueStore;
use crate::sync::SyncManager;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub events: EventBus,
    pub store: QueueStore,
    pub connectivity: Connectivity,
    pub manager: Arc<SyncManager>,
    pub indicator: QueueIndicator,
    /// Wakes the drain worker outside its regular interval.
    pub sync_trigger: Arc<Notify>,
}

impl AppState {
    /// Ask the worker for a drain pass if one could make progress right now.
    pub fn request_sync(&self) {
        if self.connectivity.is_online() && self.manager.current_user().is_some() {
            self.sync_trigger.notify_one();
        }
    }
}
