use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::config::PaginationConfig;
use crate::database::changes::UpdateSet;
use crate::database::listing::{fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec};
use crate::database::models::RoleRecord;
use crate::error::ApiError;
use crate::scope::Actor;
use crate::state::AppState;
use crate::validate;

use super::{db_unique_as_conflict, referenced_as_conflict, unique_as_conflict};

const DEFAULT_PAGE_SIZE: i64 = 10;
const NOT_FOUND: &str = "Rol no encontrado.";
const DUPLICATE: &str = "El nombre del rol ya está en uso.";

const SORTABLE: &[SortColumn] = &[("roleName", "r.role_name"), ("roleId", "r.role_id")];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRole {
    pub role_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRole {
    pub role_name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

pub struct RoleService {
    pool: PgPool,
    pagination: PaginationConfig,
}

impl RoleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn create(&self, actor: &Actor, input: CreateRole) -> Result<RoleRecord, ApiError> {
        let role_name = validate::present(input.role_name)
            .filter(|name| validate::is_role_name(name))
            .ok_or_else(|| ApiError::bad_request("El nombre del rol debe ser alfanumérico y único."))?;

        let role_id: i64 = sqlx::query_scalar(
            "INSERT INTO roles (role_name, description) VALUES ($1, $2) RETURNING role_id",
        )
        .bind(&role_name)
        .bind(validate::present(input.description))
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as_conflict(DUPLICATE))?;

        info!(role_id, user_id = actor.user_id, "Role created");
        self.get(role_id).await
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Page<RoleRecord>, ApiError> {
        let request = PageRequest::from_query(query, DEFAULT_PAGE_SIZE, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Asc, "r.role_id");

        let mut conditions = Conditions::new();
        conditions.bind_opt("r.is_active =", query.flag("isActive")?);

        Ok(fetch_page(&self.pool, RoleRecord::COLUMNS, "FROM roles r", &conditions, &sort, request).await?)
    }

    pub async fn get(&self, role_id: i64) -> Result<RoleRecord, ApiError> {
        let sql = format!("SELECT {} FROM roles r WHERE r.role_id = $1", RoleRecord::COLUMNS);
        sqlx::query_as::<_, RoleRecord>(&sql)
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    pub async fn update(&self, actor: &Actor, role_id: i64, input: UpdateRole) -> Result<RoleRecord, ApiError> {
        let role_name = validate::present(input.role_name);
        if let Some(name) = &role_name {
            if !validate::is_role_name(name) {
                return Err(ApiError::bad_request("El nombre del rol debe ser alfanumérico."));
            }
        }

        let mut set = UpdateSet::new("roles", "role_id");
        set.set("role_name", role_name)
            .set("description", input.description)
            .set("is_active", input.is_active);
        if set.is_empty() {
            return Err(ApiError::bad_request("Se requiere al menos un campo para actualizar."));
        }
        if !set.execute(&self.pool, role_id).await.map_err(db_unique_as_conflict(DUPLICATE))? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(role_id, user_id = actor.user_id, "Role updated");
        self.get(role_id).await
    }

    pub async fn delete(&self, actor: &Actor, role_id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(referenced_as_conflict("No se puede eliminar el rol porque está asignado a usuarios."))?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        info!(role_id, user_id = actor.user_id, "Role deleted");
        Ok(())
    }
}
