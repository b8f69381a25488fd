use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::JsonBody;
use crate::services::auth_service::{AuthService, LoginRequest, RefreshRequest};
use crate::state::AppState;

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (token, user) = AuthService::new(&state).login(request).await?;
    Ok(Json(json!({
        "message": "Inicio de sesión exitoso.",
        "token": token,
        "user": user,
    })))
}

/// POST /api/auth/refresh-token
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = AuthService::new(&state).refresh(request)?;
    Ok(Json(json!({
        "message": "Token refrescado exitosamente.",
        "token": token,
    })))
}
