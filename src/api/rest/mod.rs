pub mod deliveries;
pub mod drivers;
pub mod earnings;
pub mod notifications;
pub mod session;
pub mod tracking;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(session::router())
        .merge(drivers::router())
        .merge(deliveries::router())
        .merge(earnings::router())
        .merge(notifications::router())
        .merge(tracking::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) fn unauthorized() -> AppError {
    AppError::Unauthorized("no active session".to_string())
}

pub(crate) async fn current_driver_id(state: &AppState) -> Result<Uuid, AppError> {
    let guard = state.session.read().await;
    let active = guard.as_ref().ok_or_else(unauthorized)?;
    Ok(active.driver.id)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    signed_in: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let signed_in = state.session.read().await.is_some();
    Json(HealthResponse {
        status: "ok",
        signed_in,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
