pub mod checkout;
pub mod generate;
pub mod proxy;
pub mod webhook;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "error": err.to_string() })),
        ),
    }
}
