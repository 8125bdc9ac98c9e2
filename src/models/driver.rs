use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Car,
    Van,
    Motorcycle,
    Bicycle,
    Truck,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CompensationClass {
    Permanent,
    Old,
    Temporary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Approved,
    Active,
    Inactive,
    Suspended,
}

impl AccountStatus {
    // approval states are set by the backend; the client only reads them
    pub fn allows_session(&self) -> bool {
        matches!(
            self,
            AccountStatus::Active | AccountStatus::Approved | AccountStatus::Inactive
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub license_number: String,
    pub vehicle_type: VehicleType,
    pub compensation_class: CompensationClass,
    pub status: AccountStatus,
    pub presence: Presence,
    pub total_deliveries: u32,
    pub rating: f64,
    pub position: Option<GeoPoint>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationFlag {
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
