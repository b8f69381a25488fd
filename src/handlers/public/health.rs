use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "School Attendance API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth/login, /api/auth/refresh-token (public)",
            "health": "/api/health (public)",
            "districts": "/api/districts",
            "institutions": "/api/institutions",
            "users": "/api/users",
            "roles": "/api/roles",
            "students": "/api/students",
            "groups": "/api/student-groups",
            "attendance": "/api/attendances",
            "excuses": "/api/excuses",
            "biometrics": "/api/biometrics",
        }
    }))
}

/// GET /api/health: 503 while the database cannot be reached.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "OK", "timestamp": now, "database": "ok" })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "ERROR", "timestamp": now, "database": "unavailable" })),
            )
        }
    }
}
