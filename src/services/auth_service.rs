use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::{password, TokenError, TokenKeys};
use crate::database::models::{User, UserCredentials};
use crate::error::ApiError;
use crate::state::AppState;
use crate::validate;

pub const INVALID_CREDENTIALS: &str = "Credenciales inválidas.";
pub const INACTIVE_ACCOUNT: &str = "La cuenta de usuario está inactiva.";
pub const TOKEN_REQUIRED: &str = "Token requerido.";
pub const TOKEN_INVALID: &str = "Token inválido o expirado.";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub token: Option<String>,
}

pub struct AuthService {
    pool: PgPool,
    tokens: Arc<TokenKeys>,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            tokens: state.tokens.clone(),
        }
    }

    /// Returns a fresh token and the user it was issued for. The active flag
    /// is only looked at once the password matched.
    pub async fn login(&self, request: LoginRequest) -> Result<(String, User), ApiError> {
        let username = validate::present(request.username);
        let password = request.password.filter(|p| !p.is_empty());
        let (username, password) = match (username, password) {
            (Some(username), Some(password)) => (username, password),
            _ => return Err(ApiError::bad_request("Nombre de usuario y contraseña son requeridos.")),
        };

        let sql = format!("SELECT {}, u.password_hash {} WHERE u.username = $1", User::COLUMNS, User::FROM);
        let credentials = sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(&username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(credentials) = credentials else {
            warn!(%username, "Login failed: unknown user");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        };
        if !password::verify(password, credentials.password_hash).await? {
            warn!(%username, "Login failed: wrong password");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
        let user = credentials.user;
        if !user.is_active {
            warn!(user_id = user.user_id, "Login refused: inactive account");
            return Err(ApiError::forbidden(INACTIVE_ACCOUNT));
        }

        let token = self.tokens.issue(user.identity()).map_err(token_failure)?;
        info!(user_id = user.user_id, role = %user.role_name, "User logged in");
        Ok((token, user))
    }

    /// Re-signs the identity carried by a still-valid token.
    pub fn refresh(&self, request: RefreshRequest) -> Result<String, ApiError> {
        let token = validate::present(request.token).ok_or_else(|| ApiError::bad_request(TOKEN_REQUIRED))?;
        let claims = self.tokens.verify(&token).map_err(|e| {
            warn!("Token refresh rejected: {}", e);
            ApiError::unauthorized(TOKEN_INVALID)
        })?;
        self.tokens.issue(claims.identity).map_err(token_failure)
    }
}

fn token_failure(err: TokenError) -> ApiError {
    error!("Token generation failed: {}", err);
    ApiError::internal_server_error("Error interno del servidor.")
}
