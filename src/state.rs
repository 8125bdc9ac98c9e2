use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::feed::NotificationFeed;
use crate::gateway::Gateway;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::notification::Notification;
use crate::observability::metrics::Metrics;
use crate::tracking::TrackerHandle;

pub struct AppState {
    pub config: Config,
    pub gateway: Arc<dyn Gateway>,
    pub session: RwLock<Option<ActiveSession>>,
    pub feed_events_tx: broadcast::Sender<Notification>,
    pub metrics: Metrics,
}

// everything scoped to one signed-in driver; torn down on sign-out or when
// a new sign-in replaces it
pub struct ActiveSession {
    pub driver: Driver,
    pub feed: Arc<NotificationFeed>,
    pub feed_task: JoinHandle<()>,
    pub tracker: Option<TrackerHandle>,
    pub tracking_tx: Option<mpsc::Sender<GeoPoint>>,
}

impl ActiveSession {
    pub fn teardown(&mut self) {
        self.feed_task.abort();
        self.tracking_tx = None;
        if let Some(tracker) = self.tracker.take() {
            tracker.stop();
        }
    }
}

impl AppState {
    pub fn new(config: Config, gateway: Arc<dyn Gateway>) -> Self {
        let (feed_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            config,
            gateway,
            session: RwLock::new(None),
            feed_events_tx,
            metrics: Metrics::new(),
        }
    }
}
