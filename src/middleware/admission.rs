use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Bounds in-flight requests to pool size plus queue limit; extra requests
/// are turned away with 503 instead of waiting without limit.
pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let _permit = state.admission.clone().try_acquire_owned().map_err(|_| {
        tracing::warn!(path = %request.uri().path(), "Admission queue full, rejecting request");
        ApiError::service_unavailable("Servidor ocupado, intente nuevamente.")
    })?;

    Ok(next.run(request).await)
}
