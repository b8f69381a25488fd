use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::config::PaginationConfig;
use crate::database::changes::UpdateSet;
use crate::database::listing::{
    fetch_optional, fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec,
};
use crate::database::models::DailyExcuse;
use crate::error::ApiError;
use crate::scope::{Actor, Masking, ScopeAuthorizer, ScopeTarget};
use crate::state::AppState;
use crate::validate::{self, IdInput};

use super::{primary_group_of, unique_as_bad_request};

pub const ALREADY_EXCUSED: &str = "La excusa para esta fecha ya existe.";
const NOT_FOUND: &str = "Excusa no encontrada.";
const STUDENT_NOT_FOUND: &str = "Estudiante no encontrado.";

const SORTABLE: &[SortColumn] = &[
    ("excuseDate", "e.excuse_date"),
    ("excuseId", "e.excuse_id"),
    ("studentId", "e.student_id"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExcuse {
    pub student_id: Option<IdInput>,
    pub excuse_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExcuse {
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

fn apply_filters(query: &ListQuery, conditions: &mut Conditions) -> Result<(), ApiError> {
    conditions
        .bind_opt("e.excuse_date >=", query.date("startDate")?)
        .bind_opt("e.excuse_date <=", query.date("endDate")?)
        .bind_opt("e.group_id =", query.id("groupId")?)
        .bind_opt("e.is_active =", query.flag("isActive")?);
    Ok(())
}

pub struct ExcuseService {
    pool: PgPool,
    scope: ScopeAuthorizer,
    pagination: PaginationConfig,
}

impl ExcuseService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            scope: state.scope.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn create(&self, actor: &Actor, input: CreateExcuse) -> Result<DailyExcuse, ApiError> {
        let student_id = validate::optional_id(input.student_id.as_ref(), "del estudiante")?;
        let excuse_date = validate::date_field(input.excuse_date, "Formato de fecha inválido. Usar YYYY-MM-DD.")?;
        let (student_id, excuse_date) = match (student_id, excuse_date) {
            (Some(student_id), Some(excuse_date)) => (student_id, excuse_date),
            _ => return Err(ApiError::bad_request("StudentID y ExcuseDate son requeridos.")),
        };

        let institution_id = self
            .scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(
                actor,
                Masking::None,
                "No tiene permiso para registrar excusas para este estudiante.",
                STUDENT_NOT_FOUND,
            )?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM daily_excuses WHERE student_id = $1 AND excuse_date = $2)",
        )
        .bind(student_id)
        .bind(excuse_date)
        .fetch_one(&self.pool)
        .await?;
        if exists {
            return Err(ApiError::bad_request(ALREADY_EXCUSED));
        }

        let sql = format!(
            "INSERT INTO daily_excuses (student_id, institution_id, group_id, excuse_date, notes, marked_by) \
             VALUES ($1, $2, {}, $3, $4, $5) RETURNING excuse_id",
            primary_group_of("$1")
        );
        let excuse_id: i64 = sqlx::query_scalar(&sql)
            .bind(student_id)
            .bind(institution_id)
            .bind(excuse_date)
            .bind(validate::present(input.notes))
            .bind(actor.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unique_as_bad_request(ALREADY_EXCUSED))?;

        info!(excuse_id, student_id, %excuse_date, user_id = actor.user_id, "Excuse recorded");
        self.fetch(excuse_id).await
    }

    pub async fn list(&self, actor: &Actor, query: &ListQuery) -> Result<Page<DailyExcuse>, ApiError> {
        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Desc, "e.excuse_id");

        let mut conditions = Conditions::new();
        actor.list_scope().restrict(
            &mut conditions,
            "e.institution_id",
            "i.district_id",
            "No tiene permiso para ver excusas.",
        )?;
        conditions.bind_opt("e.student_id =", query.id("studentId")?);
        apply_filters(query, &mut conditions)?;

        Ok(fetch_page(&self.pool, DailyExcuse::COLUMNS, DailyExcuse::FROM, &conditions, &sort, request).await?)
    }

    pub async fn list_for_student(&self, actor: &Actor, student_id: i64, query: &ListQuery) -> Result<Page<DailyExcuse>, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(
                actor,
                Masking::None,
                "No tiene permiso para ver las excusas de este estudiante.",
                STUDENT_NOT_FOUND,
            )?;

        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Desc, "e.excuse_id");
        let mut conditions = Conditions::new();
        conditions.bind("e.student_id =", student_id);
        apply_filters(query, &mut conditions)?;

        Ok(fetch_page(&self.pool, DailyExcuse::COLUMNS, DailyExcuse::FROM, &conditions, &sort, request).await?)
    }

    pub async fn get(&self, actor: &Actor, excuse_id: i64) -> Result<DailyExcuse, ApiError> {
        self.authorize_excuse(actor, excuse_id, "No tiene permiso para ver esta excusa.").await?;
        self.fetch(excuse_id).await
    }

    pub async fn update(&self, actor: &Actor, excuse_id: i64, input: UpdateExcuse) -> Result<DailyExcuse, ApiError> {
        self.authorize_excuse(actor, excuse_id, "No tiene permiso para actualizar esta excusa.").await?;

        let mut set = UpdateSet::new("daily_excuses", "excuse_id");
        set.set("is_active", input.is_active).set("notes", input.notes);
        if set.is_empty() {
            return Err(ApiError::bad_request("No se proporcionaron campos para actualizar."));
        }
        if !set.execute(&self.pool, excuse_id).await? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(excuse_id, user_id = actor.user_id, "Excuse updated");
        self.fetch(excuse_id).await
    }

    pub async fn delete(&self, actor: &Actor, excuse_id: i64) -> Result<(), ApiError> {
        self.authorize_excuse(actor, excuse_id, "No tiene permiso para eliminar esta excusa.").await?;

        let result = sqlx::query("DELETE FROM daily_excuses WHERE excuse_id = $1")
            .bind(excuse_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(excuse_id, user_id = actor.user_id, "Excuse deleted");
        Ok(())
    }

    async fn authorize_excuse(&self, actor: &Actor, excuse_id: i64, forbidden: &str) -> Result<i64, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Excuse(excuse_id))
            .await?
            .require(actor, Masking::None, forbidden, NOT_FOUND)
    }

    async fn fetch(&self, excuse_id: i64) -> Result<DailyExcuse, ApiError> {
        let mut conditions = Conditions::new();
        conditions.bind("e.excuse_id =", excuse_id);
        fetch_optional::<DailyExcuse>(&self.pool, DailyExcuse::COLUMNS, DailyExcuse::FROM, &conditions)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }
}
