use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::Role;
use crate::error::ApiError;
use crate::scope::Actor;

use super::auth::MISSING_TOKEN;

pub const ROLE_FORBIDDEN: &str = "Acceso prohibido: No tiene los permisos necesarios para realizar esta acción.";

/// Route layer that admits only the listed roles. Runs after
/// [`super::jwt_auth_middleware`] and before the handler's body extraction.
pub async fn require_roles(State(allowed): State<&'static [Role]>, request: Request, next: Next) -> Response {
    match request.extensions().get::<Actor>() {
        Some(actor) if actor.has_any_role(allowed) => next.run(request).await,
        Some(actor) => {
            tracing::warn!(
                user_id = actor.user_id,
                role = %actor.role_name,
                path = %request.uri().path(),
                "Role not allowed on route"
            );
            ApiError::forbidden(ROLE_FORBIDDEN).into_response()
        }
        None => ApiError::unauthorized(MISSING_TOKEN).into_response(),
    }
}
