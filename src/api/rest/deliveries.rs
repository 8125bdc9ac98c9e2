use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::{self, Proof, Waypoint};
use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::observability::metrics::Metrics;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", get(list_deliveries))
        .route("/deliveries/active", get(active_delivery))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/accept", post(accept))
        .route("/deliveries/:id/pickup", post(pickup))
        .route("/deliveries/:id/depart", post(depart))
        .route("/deliveries/:id/deliver", post(deliver))
        .route("/deliveries/:id/waypoint", get(waypoint))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<DeliveryStatus>,
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Delivery>>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;

    let mut rows = state.gateway.deliveries_for_driver(driver_id).await?;
    if let Some(status) = query.status {
        rows.retain(|delivery| delivery.status == status);
    }
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(rows))
}

async fn active_delivery(State(state): State<Arc<AppState>>) -> Result<Json<Delivery>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;

    let mut rows = state.gateway.deliveries_for_driver(driver_id).await?;
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows.into_iter()
        .find(|delivery| delivery.status.is_active())
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no active delivery".to_string()))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;
    let delivery = owned_delivery(state.gateway.as_ref(), driver_id, id).await?;
    Ok(Json(delivery))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;
    let delivery = owned_delivery(state.gateway.as_ref(), driver_id, id).await?;

    let start = Instant::now();
    let result = lifecycle::accept(state.gateway.as_ref(), &delivery).await;
    observe_transition(&state.metrics, "accept", start, &result);

    result.map(Json)
}

async fn pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;
    let delivery = owned_delivery(state.gateway.as_ref(), driver_id, id).await?;

    let start = Instant::now();
    let result = lifecycle::pickup_confirm(state.gateway.as_ref(), &delivery).await;
    observe_transition(&state.metrics, "pickup-confirm", start, &result);

    result.map(Json)
}

async fn depart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;
    let delivery = owned_delivery(state.gateway.as_ref(), driver_id, id).await?;

    let start = Instant::now();
    let result = lifecycle::depart(state.gateway.as_ref(), &delivery).await;
    observe_transition(&state.metrics, "depart", start, &result);

    result.map(Json)
}

#[derive(Deserialize)]
pub struct DeliverRequest {
    #[serde(default)]
    pub photo_uri: String,
    #[serde(default)]
    pub photo_bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn deliver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeliverRequest>,
) -> Result<Json<Delivery>, AppError> {
    let mut guard = state.session.write().await;
    let active = guard.as_mut().ok_or_else(super::unauthorized)?;
    let delivery = owned_delivery(state.gateway.as_ref(), active.driver.id, id).await?;

    let proof = Proof {
        photo_uri: payload.photo_uri,
        photo_bytes: payload.photo_bytes,
        recipient_name: payload.recipient_name,
        notes: payload.notes,
    };

    let start = Instant::now();
    let result = lifecycle::deliver(state.gateway.as_ref(), &delivery, &active.driver, proof).await;
    observe_transition(&state.metrics, "deliver", start, &result);

    let (updated, updated_driver) = result?;
    active.driver = updated_driver;

    Ok(Json(updated))
}

async fn waypoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Waypoint>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;
    let delivery = owned_delivery(state.gateway.as_ref(), driver_id, id).await?;
    Ok(Json(lifecycle::waypoint(&delivery)))
}

async fn owned_delivery(
    gateway: &dyn Gateway,
    driver_id: Uuid,
    id: Uuid,
) -> Result<Delivery, AppError> {
    let delivery = gateway
        .delivery(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    if delivery.driver_id != Some(driver_id) {
        return Err(AppError::NotFound(format!("delivery {id} not found")));
    }

    Ok(delivery)
}

fn observe_transition<T>(
    metrics: &Metrics,
    event: &str,
    start: Instant,
    result: &Result<T, AppError>,
) {
    let outcome = if result.is_ok() { "success" } else { "error" };
    metrics
        .transitions_total
        .with_label_values(&[event, outcome])
        .inc();
    metrics
        .transition_latency_seconds
        .with_label_values(&[event])
        .observe(start.elapsed().as_secs_f64());
}
