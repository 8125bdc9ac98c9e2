use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::session::{self, ProfileChanges, RegisterForm};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register))
        .route("/profile", get(profile).patch(update_profile))
        .route("/presence", put(set_presence))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<RegisterForm>,
) -> Result<Json<Driver>, AppError> {
    let driver = session::register(state.gateway.as_ref(), form).await?;
    Ok(Json(driver))
}

async fn profile(State(state): State<Arc<AppState>>) -> Result<Json<Driver>, AppError> {
    let guard = state.session.read().await;
    let active = guard.as_ref().ok_or_else(super::unauthorized)?;
    Ok(Json(active.driver.clone()))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(changes): Json<ProfileChanges>,
) -> Result<Json<Driver>, AppError> {
    let mut guard = state.session.write().await;
    let active = guard.as_mut().ok_or_else(super::unauthorized)?;

    let updated = session::update_profile(state.gateway.as_ref(), &active.driver, changes).await?;
    active.driver = updated.clone();

    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct PresenceRequest {
    pub online: bool,
}

async fn set_presence(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PresenceRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut guard = state.session.write().await;
    let active = guard.as_mut().ok_or_else(super::unauthorized)?;

    let updated =
        session::set_presence(state.gateway.as_ref(), &active.driver, payload.online).await?;
    active.driver = updated.clone();

    Ok(Json(updated))
}
