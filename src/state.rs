use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Semaphore;

use crate::auth::{TokenError, TokenKeys};
use crate::config::AppConfig;
use crate::scope::{PgScopeResolver, ScopeAuthorizer};

/// Shared handles every handler receives
#[derive(Clone, Debug)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenKeys>,
    pub scope: ScopeAuthorizer,
    pub admission: Arc<Semaphore>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Result<Self, TokenError> {
        let tokens = TokenKeys::new(&config.security.jwt_secret, config.security.jwt_expiry_hours)?;
        let scope = ScopeAuthorizer::new(Arc::new(PgScopeResolver::new(pool.clone())));
        let admission = Arc::new(Semaphore::new(config.admission_capacity()));

        Ok(Self {
            pool,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            scope,
            admission,
        })
    }
}
