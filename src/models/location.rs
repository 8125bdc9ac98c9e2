use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationFix {
    pub driver_id: Uuid,
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}
