use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyExcuse {
    pub excuse_id: i64,
    pub student_id: i64,
    pub institution_id: i64,
    pub group_id: Option<i64>,
    pub excuse_date: NaiveDate,
    pub notes: Option<String>,
    pub marked_by: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
}

impl DailyExcuse {
    pub const COLUMNS: &'static str = "e.excuse_id, e.student_id, e.institution_id, e.group_id, e.excuse_date, e.notes, \
         e.marked_by, e.is_active, e.created_at, e.updated_at, s.first_name, s.last_name";

    pub const FROM: &'static str = "FROM daily_excuses e \
         JOIN students s ON s.student_id = e.student_id \
         JOIN institutions i ON i.institution_id = e.institution_id";
}
