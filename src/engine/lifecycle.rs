use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::earnings;
use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::driver::{Driver, GeoPoint};
use crate::models::earning::{Earning, EarningStatus, EarningType};

// placeholder waypoint for deliveries without geocoded addresses
pub const FALLBACK_POINT: GeoPoint = GeoPoint {
    lat: -26.2041,
    lng: 28.0473,
};

#[derive(Debug, Clone)]
pub struct Proof {
    pub photo_uri: String,
    pub photo_bytes: Option<Vec<u8>>,
    pub recipient_name: String,
    pub notes: Option<String>,
}

pub async fn accept(gateway: &dyn Gateway, delivery: &Delivery) -> Result<Delivery, AppError> {
    let mut updated = require_status(delivery, DeliveryStatus::Assigned, "accept")?;
    updated.status = DeliveryStatus::Accepted;
    updated.accepted_time = Some(Utc::now());

    gateway.update_delivery(&updated).await?;
    info!(delivery_id = %updated.id, "delivery accepted");
    Ok(updated)
}

pub async fn pickup_confirm(
    gateway: &dyn Gateway,
    delivery: &Delivery,
) -> Result<Delivery, AppError> {
    let mut updated = require_status(delivery, DeliveryStatus::Accepted, "pickup-confirm")?;
    updated.status = DeliveryStatus::PickedUp;
    updated.picked_up_time = Some(Utc::now());

    gateway.update_delivery(&updated).await?;
    info!(delivery_id = %updated.id, "pickup confirmed");
    Ok(updated)
}

pub async fn depart(gateway: &dyn Gateway, delivery: &Delivery) -> Result<Delivery, AppError> {
    let mut updated = require_status(delivery, DeliveryStatus::PickedUp, "depart")?;
    updated.status = DeliveryStatus::InTransit;

    gateway.update_delivery(&updated).await?;
    info!(delivery_id = %updated.id, "delivery in transit");
    Ok(updated)
}

pub async fn deliver(
    gateway: &dyn Gateway,
    delivery: &Delivery,
    driver: &Driver,
    proof: Proof,
) -> Result<(Delivery, Driver), AppError> {
    let mut updated = require_status(delivery, DeliveryStatus::InTransit, "deliver")?;

    if proof.photo_uri.trim().is_empty() {
        return Err(AppError::MissingProof);
    }
    let recipient = proof.recipient_name.trim();
    if recipient.is_empty() {
        return Err(AppError::MissingRecipient);
    }

    let now = Utc::now();
    let fee = earnings::compute_fee(
        driver.compensation_class,
        delivery.items_count,
        delivery.declared_value,
    );
    let proof_url = upload_proof(gateway, delivery.id, &proof, now).await;

    updated.status = DeliveryStatus::Delivered;
    updated.delivered_time = Some(now);
    updated.proof_photo_url = Some(proof_url);
    updated.recipient_name = Some(recipient.to_string());
    updated.delivery_notes = proof
        .notes
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty());
    updated.delivery_fee = fee;

    gateway.update_delivery(&updated).await?;

    // the ledger insert and stat bump are best-effort once the delivery row
    // is in; failures diverge the ledger, not the delivery
    let earning = Earning {
        id: Uuid::new_v4(),
        driver_id: driver.id,
        delivery_id: Some(delivery.id),
        amount: fee,
        kind: EarningType::Delivery,
        status: EarningStatus::Pending,
        description: format!("Delivery #{}", delivery.order_ref),
        created_at: now,
    };
    if let Err(err) = gateway.insert_earning(earning).await {
        warn!(delivery_id = %delivery.id, error = %err, "earning insert failed");
    }

    let mut updated_driver = driver.clone();
    updated_driver.total_deliveries += 1;
    if let Err(err) = gateway.update_driver(&updated_driver).await {
        warn!(driver_id = %driver.id, error = %err, "driver stats update failed");
    }

    info!(delivery_id = %updated.id, fee, "delivery completed");
    Ok((updated, updated_driver))
}

fn require_status(
    delivery: &Delivery,
    expected: DeliveryStatus,
    event: &str,
) -> Result<Delivery, AppError> {
    if delivery.status != expected {
        return Err(AppError::InvalidTransition(format!(
            "{event} requires status {expected}, delivery {} is {}",
            delivery.id, delivery.status
        )));
    }

    Ok(delivery.clone())
}

async fn upload_proof(
    gateway: &dyn Gateway,
    delivery_id: Uuid,
    proof: &Proof,
    now: DateTime<Utc>,
) -> String {
    let Some(bytes) = proof.photo_bytes.as_deref() else {
        return proof.photo_uri.clone();
    };

    let ext = proof
        .photo_uri
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or("jpg");
    let name = format!("{}_{}.{}", delivery_id, now.timestamp_millis(), ext);

    match gateway
        .upload_blob("delivery-proofs", &name, bytes, &format!("image/{ext}"))
        .await
    {
        Ok(url) => url,
        Err(err) => {
            warn!(
                delivery_id = %delivery_id,
                error = %err,
                "proof upload skipped, keeping local photo reference"
            );
            proof.photo_uri.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Serialize)]
pub struct Waypoint {
    pub kind: WaypointKind,
    pub point: GeoPoint,
    pub address: String,
}

// pickup is only the target before pickup is confirmed; every later status
// navigates to the drop-off
pub fn waypoint(delivery: &Delivery) -> Waypoint {
    if delivery.status == DeliveryStatus::Accepted {
        Waypoint {
            kind: WaypointKind::Pickup,
            point: delivery.pickup_point.clone().unwrap_or(FALLBACK_POINT),
            address: delivery.pickup_address.clone(),
        }
    } else {
        Waypoint {
            kind: WaypointKind::Delivery,
            point: delivery.delivery_point.clone().unwrap_or(FALLBACK_POINT),
            address: delivery.delivery_address.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{accept, deliver, depart, pickup_confirm, waypoint, Proof, WaypointKind};
    use crate::error::AppError;
    use crate::gateway::memory::MemoryGateway;
    use crate::gateway::Gateway;
    use crate::models::delivery::{Delivery, DeliveryStatus};
    use crate::models::driver::{
        AccountStatus, CompensationClass, Driver, GeoPoint, Presence, VehicleType,
    };
    use crate::models::earning::EarningType;

    fn driver(class: CompensationClass) -> Driver {
        Driver {
            id: Uuid::from_u128(1),
            user_id: Uuid::from_u128(2),
            full_name: "Thabo Mokoena".to_string(),
            email: "thabo@example.com".to_string(),
            phone: "0821234567".to_string(),
            license_number: "DL-441".to_string(),
            vehicle_type: VehicleType::Motorcycle,
            compensation_class: class,
            status: AccountStatus::Active,
            presence: Presence::Online,
            total_deliveries: 4,
            rating: 4.7,
            position: None,
            last_seen: None,
            created_at: Utc::now(),
            emergency_contact_name: None,
            emergency_contact_phone: None,
        }
    }

    fn delivery(status: DeliveryStatus) -> Delivery {
        Delivery {
            id: Uuid::from_u128(10),
            order_ref: "ORD-1042".to_string(),
            driver_id: Some(Uuid::from_u128(1)),
            status,
            pickup_address: "12 Long Street".to_string(),
            pickup_point: Some(GeoPoint {
                lat: -26.19,
                lng: 28.03,
            }),
            delivery_address: "88 Main Road".to_string(),
            delivery_point: Some(GeoPoint {
                lat: -26.21,
                lng: 28.06,
            }),
            customer_name: "Lindiwe Dube".to_string(),
            customer_phone: "0837654321".to_string(),
            items_count: 3,
            declared_value: 1000.0,
            delivery_fee: 0.0,
            created_at: Utc::now(),
            accepted_time: None,
            picked_up_time: None,
            delivered_time: None,
            proof_photo_url: None,
            recipient_name: None,
            delivery_notes: None,
            customer_rating: None,
            customer_feedback: None,
        }
    }

    fn proof() -> Proof {
        Proof {
            photo_uri: "file:///tmp/proof.jpg".to_string(),
            photo_bytes: Some(vec![1, 2, 3]),
            recipient_name: "Lindiwe".to_string(),
            notes: Some("left at reception".to_string()),
        }
    }

    async fn seeded(status: DeliveryStatus, class: CompensationClass) -> (MemoryGateway, Delivery, Driver) {
        let gateway = MemoryGateway::new(16);
        let courier = driver(class);
        gateway.insert_driver(courier.clone()).await.unwrap();
        let row = delivery(status);
        gateway.assign_delivery(row.clone());
        (gateway, row, courier)
    }

    #[tokio::test]
    async fn accept_advances_assigned_delivery() {
        let (gateway, row, _) = seeded(DeliveryStatus::Assigned, CompensationClass::Old).await;

        let updated = accept(&gateway, &row).await.unwrap();

        assert_eq!(updated.status, DeliveryStatus::Accepted);
        assert!(updated.accepted_time.is_some());
        let stored = gateway.delivery(row.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Accepted);
    }

    #[tokio::test]
    async fn accept_rejects_every_other_status() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Accepted,
            DeliveryStatus::PickedUp,
            DeliveryStatus::InTransit,
            DeliveryStatus::Delivered,
            DeliveryStatus::Cancelled,
        ] {
            let (gateway, row, _) = seeded(status, CompensationClass::Old).await;
            let err = accept(&gateway, &row).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[tokio::test]
    async fn pickup_and_depart_follow_the_step_sequence() {
        let (gateway, row, _) = seeded(DeliveryStatus::Accepted, CompensationClass::Old).await;

        let picked = pickup_confirm(&gateway, &row).await.unwrap();
        assert_eq!(picked.status, DeliveryStatus::PickedUp);
        assert!(picked.picked_up_time.is_some());

        let moving = depart(&gateway, &picked).await.unwrap();
        assert_eq!(moving.status, DeliveryStatus::InTransit);

        let err = depart(&gateway, &row).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn deliver_requires_photo_even_when_rest_is_valid() {
        let (gateway, row, courier) = seeded(DeliveryStatus::InTransit, CompensationClass::Old).await;
        let mut missing_photo = proof();
        missing_photo.photo_uri = "  ".to_string();

        let err = deliver(&gateway, &row, &courier, missing_photo)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingProof));
    }

    #[tokio::test]
    async fn deliver_requires_recipient_name() {
        let (gateway, row, courier) = seeded(DeliveryStatus::InTransit, CompensationClass::Old).await;
        let mut blank_recipient = proof();
        blank_recipient.recipient_name = "   ".to_string();

        let err = deliver(&gateway, &row, &courier, blank_recipient)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingRecipient));
    }

    #[tokio::test]
    async fn deliver_writes_proof_earning_and_stats() {
        let (gateway, row, courier) = seeded(DeliveryStatus::InTransit, CompensationClass::Old).await;

        let (updated, updated_driver) = deliver(&gateway, &row, &courier, proof()).await.unwrap();

        assert_eq!(updated.status, DeliveryStatus::Delivered);
        // ceil(3 / 2) * 30
        assert_eq!(updated.delivery_fee, 60.0);
        assert_eq!(updated.recipient_name.as_deref(), Some("Lindiwe"));
        assert!(updated
            .proof_photo_url
            .as_deref()
            .unwrap()
            .starts_with("https://storage.local/delivery-proofs/"));

        let ledger = gateway.earnings_for_driver(courier.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, EarningType::Delivery);
        assert_eq!(ledger[0].amount, 60.0);
        assert_eq!(ledger[0].delivery_id, Some(row.id));

        assert_eq!(updated_driver.total_deliveries, courier.total_deliveries + 1);
        let stored = gateway.driver(courier.id).await.unwrap().unwrap();
        assert_eq!(stored.total_deliveries, courier.total_deliveries + 1);
    }

    #[tokio::test]
    async fn deliver_twice_leaves_exactly_one_earning() {
        let (gateway, row, courier) = seeded(DeliveryStatus::InTransit, CompensationClass::Old).await;

        let (updated, _) = deliver(&gateway, &row, &courier, proof()).await.unwrap();
        let err = deliver(&gateway, &updated, &courier, proof())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(gateway.earnings_for_driver(courier.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_falls_back_to_local_reference() {
        let (gateway, row, courier) = seeded(DeliveryStatus::InTransit, CompensationClass::Old).await;
        gateway.inject_upload_failure(true);

        let (updated, _) = deliver(&gateway, &row, &courier, proof()).await.unwrap();

        assert_eq!(updated.status, DeliveryStatus::Delivered);
        assert_eq!(
            updated.proof_photo_url.as_deref(),
            Some("file:///tmp/proof.jpg")
        );
    }

    #[tokio::test]
    async fn remote_write_failure_leaves_state_unchanged() {
        let (gateway, row, _) = seeded(DeliveryStatus::Assigned, CompensationClass::Old).await;
        gateway.inject_write_failure(true);

        let err = accept(&gateway, &row).await.unwrap_err();

        assert!(matches!(err, AppError::RemoteWrite(_)));
        let stored = gateway.delivery(row.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Assigned);
        assert!(stored.accepted_time.is_none());
    }

    #[tokio::test]
    async fn permanent_class_fee_is_commission_on_value() {
        let (gateway, row, courier) =
            seeded(DeliveryStatus::InTransit, CompensationClass::Permanent).await;

        let (updated, _) = deliver(&gateway, &row, &courier, proof()).await.unwrap();

        assert_eq!(updated.delivery_fee, 50.0);
    }

    #[test]
    fn waypoint_targets_pickup_while_accepted() {
        let row = delivery(DeliveryStatus::Accepted);
        let target = waypoint(&row);

        assert_eq!(target.kind, WaypointKind::Pickup);
        assert_eq!(target.address, "12 Long Street");
        assert_eq!(target.point.lat, -26.19);
    }

    #[test]
    fn waypoint_targets_dropoff_after_pickup() {
        for status in [
            DeliveryStatus::PickedUp,
            DeliveryStatus::InTransit,
            DeliveryStatus::Delivered,
        ] {
            let row = delivery(status);
            let target = waypoint(&row);
            assert_eq!(target.kind, WaypointKind::Delivery);
            assert_eq!(target.address, "88 Main Road");
        }
    }

    #[test]
    fn waypoint_falls_back_when_coordinates_missing() {
        let mut row = delivery(DeliveryStatus::InTransit);
        row.delivery_point = None;

        let target = waypoint(&row);

        assert_eq!(target.point.lat, -26.2041);
        assert_eq!(target.point.lng, 28.0473);
    }
}
