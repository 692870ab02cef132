use axum::{Json, extract::State};

use super::super::AppState;

pub async fn health_endpoint() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn root_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let jobs = state.scheduler.statuses().await;
    Json(serde_json::json!({
        "service": state.service,
        "version": state.version,
        "status": "running",
        "scheduler_interval_seconds": state.scheduler_interval_seconds,
        "jobs": jobs
    }))
}
