//! Health check handler.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Handle health check requests. Includes generation slot utilization.
pub async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    let generator = state.generator();
    Json(json!({
        "status": "ok",
        "model": generator.model_id(),
        "device": generator.device(),
        "generations": {
            "in_flight": state.pool.in_flight(),
            "max_concurrent": state.pool.max_concurrent(),
            "available": state.pool.available_permits(),
        }
    }))
}
