use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::{AuthUser, Gateway};
use crate::models::delivery::Delivery;
use crate::models::driver::{AccountStatus, ActivationFlag, CompensationClass, Driver, GeoPoint};
use crate::models::earning::Earning;
use crate::models::location::LocationFix;
use crate::models::notification::Notification;

struct Account {
    user_id: Uuid,
    password: String,
}

pub struct MemoryGateway {
    accounts: DashMap<String, Account>,
    current_user: Mutex<Option<Uuid>>,
    drivers: DashMap<Uuid, Driver>,
    deliveries: DashMap<Uuid, Delivery>,
    earnings: DashMap<Uuid, Earning>,
    notifications: DashMap<Uuid, Notification>,
    locations: Mutex<Vec<LocationFix>>,
    activation: Mutex<Vec<ActivationFlag>>,
    blobs: DashMap<String, usize>,
    notifications_tx: broadcast::Sender<Notification>,
    fail_writes: AtomicBool,
    fail_uploads: AtomicBool,
}

impl MemoryGateway {
    pub fn new(event_buffer_size: usize) -> Self {
        let (notifications_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            accounts: DashMap::new(),
            current_user: Mutex::new(None),
            drivers: DashMap::new(),
            deliveries: DashMap::new(),
            earnings: DashMap::new(),
            notifications: DashMap::new(),
            locations: Mutex::new(Vec::new()),
            activation: Mutex::new(Vec::new()),
            blobs: DashMap::new(),
            notifications_tx,
            fail_writes: AtomicBool::new(false),
            fail_uploads: AtomicBool::new(false),
        }
    }

    // fault injection for exercising the optimistic/no-rollback paths
    pub fn inject_write_failure(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn inject_upload_failure(&self, enabled: bool) {
        self.fail_uploads.store(enabled, Ordering::SeqCst);
    }

    // backend-side operations: assignment, approval, activation and pushed
    // notifications all originate outside the driver client
    pub fn assign_delivery(&self, delivery: Delivery) {
        self.deliveries.insert(delivery.id, delivery);
    }

    pub fn set_driver_status(&self, id: Uuid, status: AccountStatus) {
        if let Some(mut driver) = self.drivers.get_mut(&id) {
            driver.status = status;
        }
    }

    pub fn set_driver_class(&self, id: Uuid, class: CompensationClass) {
        if let Some(mut driver) = self.drivers.get_mut(&id) {
            driver.compensation_class = class;
        }
    }

    pub fn set_temporary_activation(&self, is_active: bool) {
        self.activation
            .lock()
            .expect("activation lock")
            .push(ActivationFlag {
                is_active,
                created_at: Utc::now(),
            });
    }

    pub fn push_notification(&self, notification: Notification) {
        self.notifications
            .insert(notification.id, notification.clone());
        let _ = self.notifications_tx.send(notification);
    }

    pub fn location_history(&self, driver_id: Uuid) -> Vec<LocationFix> {
        self.locations
            .lock()
            .expect("location log lock")
            .iter()
            .filter(|fix| fix.driver_id == driver_id)
            .cloned()
            .collect()
    }

    fn write_guard(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::RemoteWrite("injected gateway failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AppError> {
        if self.accounts.contains_key(email) {
            return Err(AppError::Conflict(
                "this email is already registered".to_string(),
            ));
        }

        let user_id = Uuid::new_v4();
        self.accounts.insert(
            email.to_string(),
            Account {
                user_id,
                password: password.to_string(),
            },
        );

        Ok(AuthUser {
            id: user_id,
            email: email.to_string(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AppError> {
        let account = self
            .accounts
            .get(email)
            .ok_or_else(|| AppError::Unauthorized("invalid email or password".to_string()))?;

        if account.password != password {
            return Err(AppError::Unauthorized(
                "invalid email or password".to_string(),
            ));
        }

        *self.current_user.lock().expect("auth session lock") = Some(account.user_id);

        Ok(AuthUser {
            id: account.user_id,
            email: email.to_string(),
        })
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        *self.current_user.lock().expect("auth session lock") = None;
        Ok(())
    }

    async fn driver(&self, id: Uuid) -> Result<Option<Driver>, AppError> {
        Ok(self.drivers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn driver_by_user(&self, user_id: Uuid) -> Result<Option<Driver>, AppError> {
        Ok(self
            .drivers
            .iter()
            .find(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone()))
    }

    async fn driver_by_email(&self, email: &str) -> Result<Option<Driver>, AppError> {
        Ok(self
            .drivers
            .iter()
            .find(|entry| entry.value().email == email)
            .map(|entry| entry.value().clone()))
    }

    async fn insert_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        self.write_guard()?;
        self.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn update_driver(&self, driver: &Driver) -> Result<(), AppError> {
        self.write_guard()?;
        let mut entry = self
            .drivers
            .get_mut(&driver.id)
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", driver.id)))?;
        *entry = driver.clone();
        Ok(())
    }

    async fn delivery(&self, id: Uuid) -> Result<Option<Delivery>, AppError> {
        Ok(self.deliveries.get(&id).map(|entry| entry.value().clone()))
    }

    async fn deliveries_for_driver(&self, driver_id: Uuid) -> Result<Vec<Delivery>, AppError> {
        Ok(self
            .deliveries
            .iter()
            .filter(|entry| entry.value().driver_id == Some(driver_id))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_delivery(&self, delivery: &Delivery) -> Result<(), AppError> {
        self.write_guard()?;
        let mut entry = self
            .deliveries
            .get_mut(&delivery.id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {} not found", delivery.id)))?;
        *entry = delivery.clone();
        Ok(())
    }

    async fn insert_earning(&self, earning: Earning) -> Result<Earning, AppError> {
        self.write_guard()?;
        self.earnings.insert(earning.id, earning.clone());
        Ok(earning)
    }

    async fn earnings_for_driver(&self, driver_id: Uuid) -> Result<Vec<Earning>, AppError> {
        Ok(self
            .earnings
            .iter()
            .filter(|entry| entry.value().driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn notifications_for_driver(
        &self,
        driver_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, AppError> {
        let mut rows: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.value().driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    // notification mutations mirror filtered bulk updates on the remote
    // store: a missing row is a no-op, not an error
    async fn mark_notification_read(
        &self,
        id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.write_guard()?;
        if let Some(mut entry) = self.notifications.get_mut(&id) {
            entry.is_read = true;
            entry.read_at = Some(read_at);
        }
        Ok(())
    }

    async fn mark_all_notifications_read(
        &self,
        driver_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.write_guard()?;
        for mut entry in self.notifications.iter_mut() {
            if entry.driver_id == driver_id && !entry.is_read {
                entry.is_read = true;
                entry.read_at = Some(read_at);
            }
        }
        Ok(())
    }

    async fn delete_notification(&self, id: Uuid) -> Result<(), AppError> {
        self.write_guard()?;
        self.notifications.remove(&id);
        Ok(())
    }

    async fn clear_notifications(&self, driver_id: Uuid) -> Result<(), AppError> {
        self.write_guard()?;
        self.notifications
            .retain(|_, notification| notification.driver_id != driver_id);
        Ok(())
    }

    fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications_tx.subscribe()
    }

    async fn update_driver_position(
        &self,
        driver_id: Uuid,
        position: GeoPoint,
        seen_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.write_guard()?;
        let mut entry = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
        entry.position = Some(position);
        entry.last_seen = Some(seen_at);
        Ok(())
    }

    async fn append_location(&self, fix: LocationFix) -> Result<(), AppError> {
        self.write_guard()?;
        self.locations.lock().expect("location log lock").push(fix);
        Ok(())
    }

    async fn latest_activation(&self) -> Result<Option<bool>, AppError> {
        Ok(self
            .activation
            .lock()
            .expect("activation lock")
            .last()
            .map(|flag| flag.is_active))
    }

    async fn upload_blob(
        &self,
        bucket: &str,
        name: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, AppError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::RemoteWrite("injected upload failure".to_string()));
        }

        self.blobs.insert(format!("{bucket}/{name}"), bytes.len());
        Ok(format!("https://storage.local/{bucket}/{name}"))
    }
}
