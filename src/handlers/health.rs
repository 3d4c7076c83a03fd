use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::db;
use crate::state::AppState;

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = match db::lock(&state.db) {
        Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
        Err(_) => false,
    };
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
    }))
}
