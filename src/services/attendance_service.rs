use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::config::PaginationConfig;
use crate::database::changes::UpdateSet;
use crate::database::listing::{
    fetch_optional, fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec,
};
use crate::database::models::AttendanceRecord;
use crate::error::ApiError;
use crate::scope::{Actor, Masking, ScopeAuthorizer, ScopeTarget};
use crate::state::AppState;
use crate::validate::{self, IdInput};

use super::{primary_group_of, unique_as_bad_request};

pub const ALREADY_RECORDED: &str = "Registro de asistencia ya existe para hoy.";
const NOT_FOUND: &str = "Registro de asistencia no encontrado.";
const STUDENT_NOT_FOUND: &str = "Estudiante no encontrado.";
const DEFAULT_TYPE: &str = "Entrada";

const SORTABLE: &[SortColumn] = &[
    ("attendanceTimestamp", "a.attendance_timestamp"),
    ("attendanceDate", "a.attendance_date"),
    ("recordId", "a.record_id"),
    ("studentId", "a.student_id"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttendance {
    pub student_id: Option<IdInput>,
    pub attendance_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendance {
    pub attendance_type: Option<String>,
    pub notes: Option<String>,
}

/// Query filters shared by the full list and the per-student list.
fn apply_filters(query: &ListQuery, conditions: &mut Conditions) -> Result<(), ApiError> {
    conditions
        .bind_opt("a.attendance_date >=", query.date("startDate")?)
        .bind_opt("a.attendance_date <=", query.date("endDate")?)
        .bind_opt("a.group_id =", query.id("groupId")?)
        .bind_opt("a.attendance_type =", query.text("attendanceType"));
    Ok(())
}

pub struct AttendanceService {
    pool: PgPool,
    scope: ScopeAuthorizer,
    pagination: PaginationConfig,
}

impl AttendanceService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            scope: state.scope.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    /// Records today's attendance. A second record for the same student and
    /// day is refused, both here and by the unique index.
    pub async fn create(&self, actor: &Actor, input: CreateAttendance) -> Result<AttendanceRecord, ApiError> {
        let student_id = validate::optional_id(input.student_id.as_ref(), "del estudiante")?
            .ok_or_else(|| ApiError::bad_request("StudentID es requerido."))?;
        let institution_id = self
            .scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(
                actor,
                Masking::None,
                "No tiene permiso para registrar asistencia para este estudiante.",
                STUDENT_NOT_FOUND,
            )?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM attendance_records WHERE student_id = $1 AND attendance_date = CURRENT_DATE)",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        if exists {
            return Err(ApiError::bad_request(ALREADY_RECORDED));
        }

        let sql = format!(
            "INSERT INTO attendance_records (student_id, institution_id, group_id, attendance_type, notes, recorded_by) \
             VALUES ($1, $2, {}, $3, $4, $5) RETURNING record_id",
            primary_group_of("$1")
        );
        let record_id: i64 = sqlx::query_scalar(&sql)
            .bind(student_id)
            .bind(institution_id)
            .bind(validate::present(input.attendance_type).unwrap_or_else(|| DEFAULT_TYPE.to_string()))
            .bind(validate::present(input.notes))
            .bind(actor.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unique_as_bad_request(ALREADY_RECORDED))?;

        info!(record_id, student_id, user_id = actor.user_id, "Attendance recorded");
        self.fetch(record_id).await
    }

    pub async fn list(&self, actor: &Actor, query: &ListQuery) -> Result<Page<AttendanceRecord>, ApiError> {
        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Desc, "a.record_id");

        let mut conditions = Conditions::new();
        actor.list_scope().restrict(
            &mut conditions,
            "a.institution_id",
            "i.district_id",
            "No tiene permiso para ver registros de asistencia.",
        )?;
        conditions.bind_opt("a.student_id =", query.id("studentId")?);
        apply_filters(query, &mut conditions)?;

        Ok(fetch_page(&self.pool, AttendanceRecord::COLUMNS, AttendanceRecord::FROM, &conditions, &sort, request).await?)
    }

    pub async fn list_for_student(
        &self,
        actor: &Actor,
        student_id: i64,
        query: &ListQuery,
    ) -> Result<Page<AttendanceRecord>, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(
                actor,
                Masking::None,
                "No tiene permiso para ver la asistencia de este estudiante.",
                STUDENT_NOT_FOUND,
            )?;

        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Desc, "a.record_id");
        let mut conditions = Conditions::new();
        conditions.bind("a.student_id =", student_id);
        apply_filters(query, &mut conditions)?;

        Ok(fetch_page(&self.pool, AttendanceRecord::COLUMNS, AttendanceRecord::FROM, &conditions, &sort, request).await?)
    }

    pub async fn get(&self, actor: &Actor, record_id: i64) -> Result<AttendanceRecord, ApiError> {
        self.authorize_record(actor, record_id, "No tiene permiso para ver este registro de asistencia.")
            .await?;
        self.fetch(record_id).await
    }

    pub async fn update(&self, actor: &Actor, record_id: i64, input: UpdateAttendance) -> Result<AttendanceRecord, ApiError> {
        self.authorize_record(actor, record_id, "No tiene permiso para actualizar este registro de asistencia.")
            .await?;

        let mut set = UpdateSet::new("attendance_records", "record_id").without_timestamp();
        set.set("attendance_type", validate::present(input.attendance_type))
            .set("notes", input.notes);
        if set.is_empty() {
            return Err(ApiError::bad_request("No se proporcionaron campos para actualizar."));
        }
        if !set.execute(&self.pool, record_id).await? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(record_id, user_id = actor.user_id, "Attendance record updated");
        self.fetch(record_id).await
    }

    pub async fn delete(&self, actor: &Actor, record_id: i64) -> Result<(), ApiError> {
        self.authorize_record(actor, record_id, "No tiene permiso para eliminar este registro de asistencia.")
            .await?;

        let result = sqlx::query("DELETE FROM attendance_records WHERE record_id = $1")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(record_id, user_id = actor.user_id, "Attendance record deleted");
        Ok(())
    }

    async fn authorize_record(&self, actor: &Actor, record_id: i64, forbidden: &str) -> Result<i64, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::AttendanceRecord(record_id))
            .await?
            .require(actor, Masking::None, forbidden, NOT_FOUND)
    }

    async fn fetch(&self, record_id: i64) -> Result<AttendanceRecord, ApiError> {
        let mut conditions = Conditions::new();
        conditions.bind("a.record_id =", record_id);
        fetch_optional::<AttendanceRecord>(&self.pool, AttendanceRecord::COLUMNS, AttendanceRecord::FROM, &conditions)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_filters_are_validated() {
        let mut query = ListQuery::default();
        query.filters.insert("startDate".into(), "2024-09-01".into());
        query.filters.insert("attendanceType".into(), "Salida".into());
        let mut conditions = Conditions::new();
        apply_filters(&query, &mut conditions).unwrap();
        assert!(!conditions.is_empty());

        query.filters.insert("endDate".into(), "ayer".into());
        let err = apply_filters(&query, &mut Conditions::new()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
