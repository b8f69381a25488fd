use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::auth::Identity;

/// A user as the API shows it; the password hash never leaves the store.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role_id: i64,
    pub role_name: String,
    pub institution_id: Option<i64>,
    pub district_id: Option<i64>,
    pub is_ministry_user: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "u.user_id, u.username, u.first_name, u.last_name, u.email, u.role_id, \
         r.role_name, u.institution_id, u.district_id, u.is_ministry_user, u.is_active, u.created_at, u.updated_at";

    /// Users joined with their role and, when bound, their institution.
    pub const FROM: &'static str = "FROM users u JOIN roles r ON r.role_id = u.role_id \
         LEFT JOIN institutions ui ON ui.institution_id = u.institution_id";

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            role_id: self.role_id,
            role_name: self.role_name.clone(),
            institution_id: self.institution_id,
            district_id: self.district_id,
            is_ministry_user: self.is_ministry_user,
        }
    }
}

/// Login lookup row.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}
