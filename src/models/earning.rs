use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EarningType {
    Delivery,
    Commission,
    Bonus,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    Pending,
    Cancelled,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earning {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub delivery_id: Option<Uuid>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: EarningType,
    pub status: EarningStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
