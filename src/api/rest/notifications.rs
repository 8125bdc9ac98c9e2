use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::feed::NotificationFeed;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list).delete(clear_all))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
        .route("/notifications/:id", delete(delete_one))
}

#[derive(Serialize)]
pub struct FeedView {
    pub unread: usize,
    pub notifications: Vec<Notification>,
}

fn view(feed: &NotificationFeed) -> FeedView {
    FeedView {
        unread: feed.unread_count(),
        notifications: feed.snapshot(),
    }
}

async fn current_feed(state: &AppState) -> Result<Arc<NotificationFeed>, AppError> {
    let guard = state.session.read().await;
    let active = guard.as_ref().ok_or_else(super::unauthorized)?;
    Ok(active.feed.clone())
}

async fn list(State(state): State<Arc<AppState>>) -> Result<Json<FeedView>, AppError> {
    let feed = current_feed(&state).await?;
    Ok(Json(view(&feed)))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedView>, AppError> {
    let feed = current_feed(&state).await?;
    feed.mark_read(id).await;
    state
        .metrics
        .unread_notifications
        .set(feed.unread_count() as i64);
    Ok(Json(view(&feed)))
}

async fn mark_all_read(State(state): State<Arc<AppState>>) -> Result<Json<FeedView>, AppError> {
    let feed = current_feed(&state).await?;
    feed.mark_all_read().await;
    state.metrics.unread_notifications.set(0);
    Ok(Json(view(&feed)))
}

async fn delete_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedView>, AppError> {
    let feed = current_feed(&state).await?;
    feed.delete(id).await;
    state
        .metrics
        .unread_notifications
        .set(feed.unread_count() as i64);
    Ok(Json(view(&feed)))
}

async fn clear_all(State(state): State<Arc<AppState>>) -> Result<Json<FeedView>, AppError> {
    let feed = current_feed(&state).await?;
    feed.clear_all().await;
    state.metrics.unread_notifications.set(0);
    Ok(Json(view(&feed)))
}
