use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    Declined,
    Failed,
}

impl DeliveryStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Accepted | DeliveryStatus::PickedUp | DeliveryStatus::InTransit
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::Accepted => "accepted",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
            DeliveryStatus::Declined => "declined",
            DeliveryStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub order_ref: String,
    pub driver_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub pickup_address: String,
    pub pickup_point: Option<GeoPoint>,
    pub delivery_address: String,
    pub delivery_point: Option<GeoPoint>,
    pub customer_name: String,
    pub customer_phone: String,
    pub items_count: u32,
    pub declared_value: f64,
    pub delivery_fee: f64,
    pub created_at: DateTime<Utc>,
    pub accepted_time: Option<DateTime<Utc>>,
    pub picked_up_time: Option<DateTime<Utc>>,
    pub delivered_time: Option<DateTime<Utc>>,
    pub proof_photo_url: Option<String>,
    pub recipient_name: Option<String>,
    pub delivery_notes: Option<String>,
    pub customer_rating: Option<u8>,
    pub customer_feedback: Option<String>,
}
