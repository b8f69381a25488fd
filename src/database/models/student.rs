use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_id: i64,
    pub institution_id: i64,
    pub student_unique_id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub date_of_birth: Option<NaiveDate>,
    pub status: String,
    pub enrollment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub const COLUMNS: &'static str = "s.student_id, s.institution_id, s.student_unique_id, s.first_name, s.last_name, \
         s.gender, s.date_of_birth, s.status, s.enrollment_date, s.created_at, s.updated_at";

    pub const FROM: &'static str = "FROM students s JOIN institutions i ON i.institution_id = s.institution_id";
}

/// A student alongside the group attendance is attributed to.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentWithGroup {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub student: Student,
    pub group_id: Option<i64>,
    pub group_name: Option<String>,
}
