pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::earning::Earning;
use crate::models::location::LocationFix;
use crate::models::notification::Notification;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Capability set of the remote backend-as-a-service store. Everything the
/// core needs from the backend goes through here; the in-memory
/// implementation backs the service binary and the tests.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AppError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AppError>;
    async fn sign_out(&self) -> Result<(), AppError>;

    async fn driver(&self, id: Uuid) -> Result<Option<Driver>, AppError>;
    async fn driver_by_user(&self, user_id: Uuid) -> Result<Option<Driver>, AppError>;
    async fn driver_by_email(&self, email: &str) -> Result<Option<Driver>, AppError>;
    async fn insert_driver(&self, driver: Driver) -> Result<Driver, AppError>;
    async fn update_driver(&self, driver: &Driver) -> Result<(), AppError>;

    async fn delivery(&self, id: Uuid) -> Result<Option<Delivery>, AppError>;
    async fn deliveries_for_driver(&self, driver_id: Uuid) -> Result<Vec<Delivery>, AppError>;
    async fn update_delivery(&self, delivery: &Delivery) -> Result<(), AppError>;

    async fn insert_earning(&self, earning: Earning) -> Result<Earning, AppError>;
    async fn earnings_for_driver(&self, driver_id: Uuid) -> Result<Vec<Earning>, AppError>;

    async fn notifications_for_driver(
        &self,
        driver_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, AppError>;
    async fn mark_notification_read(
        &self,
        id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn mark_all_notifications_read(
        &self,
        driver_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn delete_notification(&self, id: Uuid) -> Result<(), AppError>;
    async fn clear_notifications(&self, driver_id: Uuid) -> Result<(), AppError>;
    fn subscribe_notifications(&self) -> broadcast::Receiver<Notification>;

    async fn update_driver_position(
        &self,
        driver_id: Uuid,
        position: GeoPoint,
        seen_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn append_location(&self, fix: LocationFix) -> Result<(), AppError>;

    async fn latest_activation(&self) -> Result<Option<bool>, AppError>;

    async fn upload_blob(
        &self,
        bucket: &str,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, AppError>;
}
