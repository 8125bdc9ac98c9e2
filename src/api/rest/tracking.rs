use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::models::driver::GeoPoint;
use crate::state::AppState;
use crate::tracking::{self, ChannelSource, ReportPolicy};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracking/start", post(start))
        .route("/tracking/fix", post(push_fix))
        .route("/tracking/stop", post(stop))
}

#[derive(Deserialize)]
pub struct StartRequest {
    #[serde(default = "default_true")]
    pub permission_granted: bool,
    pub fix: GeoPoint,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct FixRequest {
    pub fix: GeoPoint,
}

async fn start(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartRequest>,
) -> Result<Json<Value>, AppError> {
    let mut guard = state.session.write().await;
    let active = guard.as_mut().ok_or_else(super::unauthorized)?;

    if active.tracker.is_some() {
        return Err(AppError::Conflict(
            "location reporting already active".to_string(),
        ));
    }

    let (tx, rx) = mpsc::channel(64);
    let source = ChannelSource::new(payload.permission_granted, payload.fix, rx);
    let policy = ReportPolicy::new(
        state.config.location_interval_secs,
        state.config.location_distance_meters,
    );

    let handle = tracking::start(
        state.gateway.clone(),
        state.metrics.clone(),
        active.driver.id,
        source,
        policy,
    )
    .await?;

    active.tracker = Some(handle);
    active.tracking_tx = Some(tx);

    Ok(Json(json!({ "status": "tracking" })))
}

async fn push_fix(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FixRequest>,
) -> Result<Json<Value>, AppError> {
    let guard = state.session.read().await;
    let active = guard.as_ref().ok_or_else(super::unauthorized)?;
    let tx = active.tracking_tx.clone().ok_or_else(|| {
        AppError::Conflict("location reporting is not active".to_string())
    })?;
    drop(guard);

    tx.send(payload.fix)
        .await
        .map_err(|_| AppError::Conflict("location reporting is not active".to_string()))?;

    Ok(Json(json!({ "status": "accepted" })))
}

async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let mut guard = state.session.write().await;
    let active = guard.as_mut().ok_or_else(super::unauthorized)?;

    let handle = active.tracker.take().ok_or_else(|| {
        AppError::Conflict("location reporting is not active".to_string())
    })?;
    active.tracking_tx = None;
    handle.stop();

    Ok(Json(json!({ "status": "stopped" })))
}
