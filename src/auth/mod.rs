pub mod password;
pub mod roles;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use roles::Role;

/// Who the bearer is and where they sit in the district/institution hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub role_id: i64,
    pub role_name: String,
    pub institution_id: Option<i64>,
    pub district_id: Option<i64>,
    #[serde(default)]
    pub is_ministry_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: Identity,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(identity: Identity, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            identity,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT secret not configured")]
    InvalidSecret,
    #[error("JWT generation error: {0}")]
    Generation(jsonwebtoken::errors::Error),
    #[error("Invalid JWT token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// HS256 signing keys plus the configured token lifetime
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: u64,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").field("expiry_hours", &self.expiry_hours).finish_non_exhaustive()
    }
}

impl TokenKeys {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        })
    }

    pub fn issue(&self, identity: Identity) -> Result<String, TokenError> {
        self.sign(&Claims::new(identity, self.expiry_hours))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding).map_err(TokenError::Generation)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: 11,
            role_id: 4,
            role_name: "AdminInstitucion".to_string(),
            institution_id: Some(7),
            district_id: None,
            is_ministry_user: false,
        }
    }

    #[test]
    fn issued_token_carries_identity() {
        let keys = TokenKeys::new("secret", 1).unwrap();
        let token = keys.issue(identity()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.identity, identity());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn claims_use_camel_case_keys() {
        let value = serde_json::to_value(Claims::new(identity(), 1)).unwrap();
        assert_eq!(value["userId"], 11);
        assert_eq!(value["roleName"], "AdminInstitucion");
        assert_eq!(value["institutionId"], 7);
        assert_eq!(value["isMinistryUser"], false);
    }

    #[test]
    fn rejects_other_secret_and_expired_tokens() {
        let keys = TokenKeys::new("secret", 1).unwrap();
        let other = TokenKeys::new("another-secret", 1).unwrap();
        let token = other.issue(identity()).unwrap();
        assert!(keys.verify(&token).is_err());

        let now = Utc::now().timestamp();
        let expired = Claims { identity: identity(), iat: now - 7200, exp: now - 3600 };
        let token = keys.sign(&expired).unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenKeys::new("", 1), Err(TokenError::InvalidSecret)));
    }
}
