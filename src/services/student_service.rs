use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::config::PaginationConfig;
use crate::database::changes::UpdateSet;
use crate::database::listing::{
    fetch_optional, fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec,
};
use crate::database::models::{Student, StudentGroup, StudentWithGroup};
use crate::error::ApiError;
use crate::scope::{Actor, Masking, ScopeAuthorizer, ScopeTarget};
use crate::state::AppState;
use crate::validate;

use super::{db_unique_as_conflict, primary_group_of, unique_as_conflict};

const NOT_FOUND: &str = "Estudiante no encontrado.";
const DUPLICATE: &str = "Conflicto: Ya existe un estudiante con ese ID Único en esta institución.";
const NO_INSTITUTION: &str = "Su usuario no está asociado a una institución.";

const SORTABLE: &[SortColumn] = &[
    ("lastName", "s.last_name"),
    ("firstName", "s.first_name"),
    ("studentUniqueId", "s.student_unique_id"),
    ("createdAt", "s.created_at"),
    ("studentId", "s.student_id"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    pub student_unique_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub status: Option<String>,
    pub enrollment_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    pub student_unique_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub status: Option<String>,
    pub enrollment_date: Option<String>,
}

pub struct StudentService {
    pool: PgPool,
    scope: ScopeAuthorizer,
    pagination: PaginationConfig,
}

impl StudentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            scope: state.scope.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    /// Students are always created in the caller's own institution.
    pub async fn create(&self, actor: &Actor, input: CreateStudent) -> Result<Student, ApiError> {
        let institution_id = actor.institution_id.ok_or_else(|| ApiError::forbidden(NO_INSTITUTION))?;
        let fields = (
            validate::present(input.student_unique_id),
            validate::present(input.first_name),
            validate::present(input.last_name),
        );
        let (unique_id, first_name, last_name) = match fields {
            (Some(unique_id), Some(first_name), Some(last_name)) => (unique_id, first_name, last_name),
            _ => return Err(ApiError::bad_request("StudentUniqueID, Nombre y Apellido son requeridos.")),
        };

        let gender = validate::present(input.gender).unwrap_or_else(|| "O".to_string());
        validate::check_gender(&gender)?;
        let status = validate::present(input.status).unwrap_or_else(|| "Active".to_string());
        validate::check_status(&status)?;
        let date_of_birth = validate::date_field(input.date_of_birth, DATE_FORMAT)?;
        let enrollment_date = validate::date_field(input.enrollment_date, DATE_FORMAT)?;

        self.ensure_unique_id_free(institution_id, &unique_id, None).await?;

        let student_id: i64 = sqlx::query_scalar(
            "INSERT INTO students (institution_id, student_unique_id, first_name, last_name, gender, \
             date_of_birth, status, enrollment_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, CURRENT_DATE)) RETURNING student_id",
        )
        .bind(institution_id)
        .bind(&unique_id)
        .bind(&first_name)
        .bind(&last_name)
        .bind(&gender)
        .bind(date_of_birth)
        .bind(&status)
        .bind(enrollment_date)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as_conflict(DUPLICATE))?;

        info!(student_id, institution_id, user_id = actor.user_id, "Student created");
        self.fetch(student_id).await
    }

    pub async fn list(&self, actor: &Actor, query: &ListQuery) -> Result<Page<Student>, ApiError> {
        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Asc, "s.student_id");

        let mut conditions = Conditions::new();
        actor.list_scope().restrict(
            &mut conditions,
            "s.institution_id",
            "i.district_id",
            "No tiene permiso para ver estudiantes.",
        )?;
        conditions.bind_opt("s.status =", query.text("status"));
        if let Some(group_id) = query.id("groupId")? {
            conditions.bind_enclosed(
                "s.student_id IN (SELECT gm.student_id FROM student_group_members gm WHERE gm.group_id =",
                group_id,
                ")",
            );
        }
        conditions.contains(
            "CONCAT_WS(' ', s.first_name, s.last_name, s.student_unique_id)",
            query.text("search"),
        );

        Ok(fetch_page(&self.pool, Student::COLUMNS, Student::FROM, &conditions, &sort, request).await?)
    }

    /// Students of the caller's institution next to the group their
    /// attendance is attributed to.
    pub async fn list_with_groups(&self, actor: &Actor, query: &ListQuery) -> Result<Page<StudentWithGroup>, ApiError> {
        let institution_id = actor.institution_id.ok_or_else(|| ApiError::forbidden(NO_INSTITUTION))?;
        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Asc, "s.student_id");

        let columns = format!("{}, g.group_id, g.group_name", Student::COLUMNS);
        let from = format!(
            "{} LEFT JOIN student_groups g ON g.group_id = {}",
            Student::FROM,
            primary_group_of("s.student_id")
        );
        let mut conditions = Conditions::new();
        conditions
            .bind("s.institution_id =", institution_id)
            .bind_opt("s.status =", query.text("status"));

        Ok(fetch_page(&self.pool, &columns, &from, &conditions, &sort, request).await?)
    }

    pub async fn get(&self, actor: &Actor, student_id: i64) -> Result<Student, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para ver este estudiante.", NOT_FOUND)?;
        self.fetch(student_id).await
    }

    pub async fn group_of(&self, actor: &Actor, student_id: i64) -> Result<StudentGroup, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para ver este estudiante.", NOT_FOUND)?;

        let sql = format!(
            "SELECT {} {} WHERE g.group_id = {}",
            StudentGroup::COLUMNS,
            StudentGroup::FROM,
            primary_group_of("$1")
        );
        sqlx::query_as::<_, StudentGroup>(&sql)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("El estudiante no está asignado a ningún grupo."))
    }

    pub async fn update(&self, actor: &Actor, student_id: i64, input: UpdateStudent) -> Result<Student, ApiError> {
        let institution_id = self
            .scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para actualizar este estudiante.", NOT_FOUND)?;

        let gender = validate::present(input.gender);
        if let Some(gender) = &gender {
            validate::check_gender(gender)?;
        }
        let status = validate::present(input.status);
        if let Some(status) = &status {
            validate::check_status(status)?;
        }
        let date_of_birth = validate::date_field(input.date_of_birth, DATE_FORMAT)?;
        let enrollment_date = validate::date_field(input.enrollment_date, DATE_FORMAT)?;
        let unique_id = validate::present(input.student_unique_id);
        if let Some(unique_id) = &unique_id {
            self.ensure_unique_id_free(institution_id, unique_id, Some(student_id)).await?;
        }

        let mut set = UpdateSet::new("students", "student_id");
        set.set("student_unique_id", unique_id)
            .set("first_name", validate::present(input.first_name))
            .set("last_name", validate::present(input.last_name))
            .set("gender", gender)
            .set("date_of_birth", date_of_birth)
            .set("status", status)
            .set("enrollment_date", enrollment_date);
        if set.is_empty() {
            return Err(ApiError::bad_request("No se proporcionaron campos para actualizar."));
        }
        if !set.execute(&self.pool, student_id).await.map_err(db_unique_as_conflict(DUPLICATE))? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(student_id, user_id = actor.user_id, "Student updated");
        self.fetch(student_id).await
    }

    async fn fetch(&self, student_id: i64) -> Result<Student, ApiError> {
        let mut conditions = Conditions::new();
        conditions.bind("s.student_id =", student_id);
        fetch_optional::<Student>(&self.pool, Student::COLUMNS, Student::FROM, &conditions)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    async fn ensure_unique_id_free(&self, institution_id: i64, unique_id: &str, except: Option<i64>) -> Result<(), ApiError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM students WHERE institution_id = $1 AND student_unique_id = $2 \
             AND ($3::BIGINT IS NULL OR student_id <> $3))",
        )
        .bind(institution_id)
        .bind(unique_id)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ApiError::conflict(DUPLICATE));
        }
        Ok(())
    }
}

const DATE_FORMAT: &str = "Formato de fecha inválido. Usar YYYY-MM-DD.";
