use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub institution_id: i64,
    pub name: String,
    pub district_id: i64,
    pub regional_district_code: Option<String>,
    pub address: Option<String>,
    pub subscription_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Institution {
    pub const COLUMNS: &'static str = "i.institution_id, i.name, i.district_id, d.regional_district_code, \
         i.address, i.subscription_status, i.configuration_data, i.created_at, i.updated_at";

    pub const FROM: &'static str = "FROM institutions i JOIN districts d ON d.district_id = i.district_id";

    /// Drops the configuration blob for callers not entitled to it.
    pub fn without_configuration(mut self) -> Self {
        self.configuration_data = None;
        self
    }
}
