use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{literals::PACKAGE_NAME, state::AppState};

/// Reports liveness along with whether the database answers.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = match state.db() {
        Ok(_) => "ok",
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            "unavailable"
        }
    };
    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({ "service": PACKAGE_NAME, "status": "ok", "database": database })))
}
