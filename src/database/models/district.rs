use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct District {
    pub district_id: i64,
    pub name: String,
    pub regional_district_code: String,
    pub contact_info: Option<String>,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl District {
    pub const COLUMNS: &'static str =
        "d.district_id, d.name, d.regional_district_code, d.contact_info, d.is_active, d.created_by, d.created_at, d.updated_at";
}
