use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentGroup {
    pub group_id: i64,
    pub institution_id: i64,
    pub group_name: String,
    pub academic_year: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentGroup {
    pub const COLUMNS: &'static str = "g.group_id, g.institution_id, g.group_name, g.academic_year, g.description, \
         g.is_active, g.created_at, g.updated_at";

    pub const FROM: &'static str = "FROM student_groups g JOIN institutions i ON i.institution_id = g.institution_id";
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub student_id: i64,
    pub student_unique_id: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub assignment_date: DateTime<Utc>,
}

impl GroupMember {
    pub const COLUMNS: &'static str =
        "s.student_id, s.student_unique_id, s.first_name, s.last_name, s.status, m.assignment_date";

    pub const FROM: &'static str = "FROM student_group_members m JOIN students s ON s.student_id = m.student_id";
}
