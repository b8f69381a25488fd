use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub record_id: i64,
    pub student_id: i64,
    pub institution_id: i64,
    pub group_id: Option<i64>,
    pub attendance_timestamp: DateTime<Utc>,
    pub attendance_date: NaiveDate,
    pub attendance_type: String,
    pub notes: Option<String>,
    pub recorded_by: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

impl AttendanceRecord {
    pub const COLUMNS: &'static str = "a.record_id, a.student_id, a.institution_id, a.group_id, a.attendance_timestamp, \
         a.attendance_date, a.attendance_type, a.notes, a.recorded_by, s.first_name, s.last_name";

    pub const FROM: &'static str = "FROM attendance_records a \
         JOIN students s ON s.student_id = a.student_id \
         JOIN institutions i ON i.institution_id = a.institution_id";
}
