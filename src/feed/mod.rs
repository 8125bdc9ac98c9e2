use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::notification::Notification;
use crate::observability::metrics::Metrics;

// most-recent-first notification list for the signed-in driver; local
// mutations are optimistic and never rolled back on remote failure
pub struct NotificationFeed {
    gateway: Arc<dyn Gateway>,
    driver_id: Uuid,
    page_size: usize,
    entries: Mutex<Vec<Notification>>,
}

impl NotificationFeed {
    pub fn new(gateway: Arc<dyn Gateway>, driver_id: Uuid, page_size: usize) -> Self {
        Self {
            gateway,
            driver_id,
            page_size,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn list(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.entries.lock().expect("notification list lock")
    }

    pub async fn load(&self) -> Result<(), AppError> {
        let page = self
            .gateway
            .notifications_for_driver(self.driver_id, self.page_size)
            .await?;
        *self.list() = page;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.list().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.list().iter().filter(|n| !n.is_read).count()
    }

    pub fn push_live(&self, notification: Notification) {
        self.list().insert(0, notification);
    }

    pub async fn mark_read(&self, id: Uuid) {
        let now = Utc::now();
        {
            let mut list = self.list();
            if let Some(entry) = list.iter_mut().find(|n| n.id == id) {
                if !entry.is_read {
                    entry.is_read = true;
                    entry.read_at = Some(now);
                }
            }
        }

        if let Err(err) = self.gateway.mark_notification_read(id, now).await {
            warn!(notification_id = %id, error = %err, "remote read-flag update failed");
        }
    }

    pub async fn mark_all_read(&self) {
        let now = Utc::now();
        {
            let mut list = self.list();
            for entry in list.iter_mut().filter(|n| !n.is_read) {
                entry.is_read = true;
                entry.read_at = Some(now);
            }
        }

        if let Err(err) = self
            .gateway
            .mark_all_notifications_read(self.driver_id, now)
            .await
        {
            warn!(driver_id = %self.driver_id, error = %err, "remote read-all update failed");
        }
    }

    pub async fn delete(&self, id: Uuid) {
        self.list().retain(|n| n.id != id);

        if let Err(err) = self.gateway.delete_notification(id).await {
            warn!(notification_id = %id, error = %err, "remote notification delete failed");
        }
    }

    pub async fn clear_all(&self) {
        self.list().clear();

        if let Err(err) = self.gateway.clear_notifications(self.driver_id).await {
            warn!(driver_id = %self.driver_id, error = %err, "remote notification clear failed");
        }
    }
}

// consumes gateway insert events for this driver and fans them out to the
// websocket layer; ordering against the initial load is not gap-free
pub fn spawn_pump(
    feed: Arc<NotificationFeed>,
    events: broadcast::Receiver<Notification>,
    fanout: broadcast::Sender<Notification>,
    metrics: Metrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(events);
        while let Some(event) = stream.next().await {
            let Ok(notification) = event else {
                continue;
            };
            if notification.driver_id != feed.driver_id {
                continue;
            }

            feed.push_live(notification.clone());
            metrics.feed_events_total.inc();
            metrics
                .unread_notifications
                .set(feed.unread_count() as i64);
            let _ = fanout.send(notification);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use super::NotificationFeed;
    use crate::gateway::memory::MemoryGateway;
    use crate::gateway::Gateway;
    use crate::models::notification::Notification;

    fn notification(driver_id: Uuid, minutes_ago: i64, is_read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            driver_id,
            kind: "delivery_request".to_string(),
            title: "New delivery".to_string(),
            message: "A delivery was assigned to you".to_string(),
            data: json!({}),
            is_read,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            read_at: None,
        }
    }

    fn feed_with(gateway: Arc<MemoryGateway>, driver_id: Uuid) -> NotificationFeed {
        NotificationFeed::new(gateway, driver_id, 100)
    }

    #[tokio::test]
    async fn load_orders_most_recent_first() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        let old = notification(driver_id, 30, true);
        let fresh = notification(driver_id, 1, false);
        gateway.push_notification(old.clone());
        gateway.push_notification(fresh.clone());
        gateway.push_notification(notification(Uuid::from_u128(2), 1, false));

        let feed = feed_with(gateway, driver_id);
        feed.load().await.unwrap();

        let entries = feed.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, fresh.id);
        assert_eq!(entries[1].id, old.id);
        assert_eq!(feed.unread_count(), 1);
    }

    #[tokio::test]
    async fn load_respects_the_page_bound() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        for age in 0..5 {
            gateway.push_notification(notification(driver_id, age, false));
        }

        let feed = NotificationFeed::new(gateway, driver_id, 3);
        feed.load().await.unwrap();

        assert_eq!(feed.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn push_live_prepends_and_counts_unread() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        let feed = feed_with(gateway, driver_id);
        feed.push_live(notification(driver_id, 10, true));

        let live = notification(driver_id, 0, false);
        feed.push_live(live.clone());

        assert_eq!(feed.snapshot()[0].id, live.id);
        assert_eq!(feed.unread_count(), 1);
    }

    #[tokio::test]
    async fn mark_read_flips_local_and_remote() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        let entry = notification(driver_id, 1, false);
        gateway.push_notification(entry.clone());

        let feed = feed_with(gateway.clone(), driver_id);
        feed.load().await.unwrap();
        feed.mark_read(entry.id).await;

        assert_eq!(feed.unread_count(), 0);
        let remote = gateway
            .notifications_for_driver(driver_id, 100)
            .await
            .unwrap();
        assert!(remote[0].is_read);
        assert!(remote[0].read_at.is_some());
    }

    #[tokio::test]
    async fn mark_read_survives_remote_failure_without_rollback() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        let entry = notification(driver_id, 1, false);
        gateway.push_notification(entry.clone());

        let feed = feed_with(gateway.clone(), driver_id);
        feed.load().await.unwrap();
        gateway.inject_write_failure(true);
        feed.mark_read(entry.id).await;

        // local state flipped, remote untouched
        assert_eq!(feed.unread_count(), 0);
        gateway.inject_write_failure(false);
        let remote = gateway
            .notifications_for_driver(driver_id, 100)
            .await
            .unwrap();
        assert!(!remote[0].is_read);
    }

    #[tokio::test]
    async fn mark_all_read_clears_unread_everywhere() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        for age in 0..3 {
            gateway.push_notification(notification(driver_id, age, false));
        }

        let feed = feed_with(gateway.clone(), driver_id);
        feed.load().await.unwrap();
        feed.mark_all_read().await;

        assert_eq!(feed.unread_count(), 0);
        assert!(feed.snapshot().iter().all(|n| n.is_read));
        let remote = gateway
            .notifications_for_driver(driver_id, 100)
            .await
            .unwrap();
        assert!(remote.iter().all(|n| n.is_read));
    }

    #[tokio::test]
    async fn delete_removes_locally_and_remotely() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        let entry = notification(driver_id, 1, false);
        gateway.push_notification(entry.clone());

        let feed = feed_with(gateway.clone(), driver_id);
        feed.load().await.unwrap();
        feed.delete(entry.id).await;

        assert!(feed.snapshot().is_empty());
        assert!(gateway
            .notifications_for_driver(driver_id, 100)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn clear_all_empties_the_ledger_for_this_driver_only() {
        let gateway = Arc::new(MemoryGateway::new(16));
        let driver_id = Uuid::from_u128(1);
        let other_id = Uuid::from_u128(2);
        gateway.push_notification(notification(driver_id, 1, false));
        gateway.push_notification(notification(other_id, 1, false));

        let feed = feed_with(gateway.clone(), driver_id);
        feed.load().await.unwrap();
        feed.clear_all().await;

        assert!(feed.snapshot().is_empty());
        assert!(gateway
            .notifications_for_driver(driver_id, 100)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            gateway
                .notifications_for_driver(other_id, 100)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
