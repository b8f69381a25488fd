use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::scope::Actor;
use crate::state::AppState;

pub const MISSING_TOKEN: &str = "Acceso no autorizado: No se proporcionó token.";
pub const INVALID_TOKEN: &str = "Acceso no autorizado: Token inválido o expirado.";

/// Validates the bearer token and stores the resulting [`Actor`] in the request extensions
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        ApiError::unauthorized(INVALID_TOKEN)
    })?;

    request.extensions_mut().insert(Actor::from(claims.identity));

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_tokens_only() {
        assert_eq!(extract_jwt_from_headers(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_jwt_from_headers(&headers("Bearer   ")), None);
        assert_eq!(extract_jwt_from_headers(&headers("Basic abc")), None);
        assert_eq!(extract_jwt_from_headers(&HeaderMap::new()), None);
    }
}
