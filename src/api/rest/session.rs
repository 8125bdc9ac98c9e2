use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::feed::{self, NotificationFeed};
use crate::models::driver::Driver;
use crate::session;
use crate::state::{ActiveSession, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/session",
        post(sign_in).get(current_session).delete(sign_out),
    )
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver =
        session::sign_in(state.gateway.as_ref(), &payload.email, &payload.password).await?;

    let feed = Arc::new(NotificationFeed::new(
        state.gateway.clone(),
        driver.id,
        state.config.feed_page_size,
    ));
    feed.load().await?;
    state
        .metrics
        .unread_notifications
        .set(feed.unread_count() as i64);

    let feed_task = feed::spawn_pump(
        feed.clone(),
        state.gateway.subscribe_notifications(),
        state.feed_events_tx.clone(),
        state.metrics.clone(),
    );

    let mut guard = state.session.write().await;
    if let Some(mut previous) = guard.take() {
        previous.teardown();
    }
    *guard = Some(ActiveSession {
        driver: driver.clone(),
        feed,
        feed_task,
        tracker: None,
        tracking_tx: None,
    });

    Ok(Json(driver))
}

async fn current_session(State(state): State<Arc<AppState>>) -> Result<Json<Driver>, AppError> {
    let guard = state.session.read().await;
    let active = guard.as_ref().ok_or_else(super::unauthorized)?;
    Ok(Json(active.driver.clone()))
}

async fn sign_out(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let mut guard = state.session.write().await;
    let mut active = guard.take().ok_or_else(super::unauthorized)?;
    drop(guard);

    active.teardown();
    session::sign_out(state.gateway.as_ref(), &active.driver).await;
    state.metrics.unread_notifications.set(0);

    Ok(Json(json!({ "status": "signed_out" })))
}
