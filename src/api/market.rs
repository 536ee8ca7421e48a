//! Market price proxy: a stateless pass-through to the Kalimati daily-price
//! API. The market identifier is checked before any outbound call is made.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;

use super::error::ApiError;

const SUPPORTED_MARKET: &str = "kalimati";

#[derive(Debug, Deserialize)]
pub struct MarketQuery {
    pub market: Option<String>,
}

/// Upstream response shape; only the prices array is passed through
#[derive(Debug, Deserialize)]
struct PriceFeed {
    prices: Vec<serde_json::Value>,
}

/// Fetch daily prices for the single supported market
pub async fn market_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    if query.market.as_deref() != Some(SUPPORTED_MARKET) {
        return Err(ApiError::bad_request("Only kalimati market is supported."));
    }

    let response = reqwest::get(&state.config.market.kalimati_url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            tracing::error!("Market price fetch failed: {}", e);
            ApiError::dependency("Failed to fetch market prices")
        })?;

    let feed: PriceFeed = response.json().await.map_err(|e| {
        tracing::error!("Market price response malformed: {}", e);
        ApiError::dependency("Failed to fetch market prices")
    })?;

    Ok(Json(feed.prices))
}
