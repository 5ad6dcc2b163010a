//! Spot price endpoint.

use crate::api::{ApiError, AppState};
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub async fn get_prices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let prices = state.oracle.get_prices().await?;

    // Sorted map so the response ordering is stable.
    let view: BTreeMap<&str, String> = prices
        .iter()
        .map(|(currency, price)| (currency.as_str(), price.to_string()))
        .collect();

    Ok(Json(json!({ "prices": view })))
}
