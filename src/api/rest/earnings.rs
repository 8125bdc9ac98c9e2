use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::engine::earnings::{self, Period};
use crate::error::AppError;
use crate::models::delivery::DeliveryStatus;
use crate::models::earning::Earning;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/earnings", get(list_earnings))
        .route("/earnings/summary", get(summary))
}

async fn list_earnings(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Earning>>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;

    let mut rows = state.gateway.earnings_for_driver(driver_id).await?;
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub period: Option<Period>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub total: f64,
    pub period_total: Option<f64>,
    pub average_per_delivery: f64,
    pub completed_deliveries: usize,
}

async fn summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let driver_id = super::current_driver_id(&state).await?;

    let entries = state.gateway.earnings_for_driver(driver_id).await?;
    let deliveries = state.gateway.deliveries_for_driver(driver_id).await?;
    let completed = deliveries
        .iter()
        .filter(|delivery| delivery.status == DeliveryStatus::Delivered)
        .count();
    let now = Utc::now();

    Ok(Json(SummaryResponse {
        total: earnings::total(&entries),
        period_total: query
            .period
            .map(|period| earnings::period_total(&entries, period, now)),
        average_per_delivery: earnings::average_per_delivery(&entries, completed),
        completed_deliveries: completed,
    }))
}
