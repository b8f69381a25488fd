use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::config::PaginationConfig;
use crate::database::changes::UpdateSet;
use crate::database::listing::{fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec};
use crate::database::models::District;
use crate::error::ApiError;
use crate::scope::Actor;
use crate::state::AppState;
use crate::validate;

use super::{db_unique_as_conflict, referenced_as_conflict, unique_as_conflict};

const DEFAULT_PAGE_SIZE: i64 = 10;
const DUPLICATE_CODE: &str = "El código regional-distrito ya está en uso.";
const NOT_FOUND: &str = "Distrito no encontrado.";

const SORTABLE: &[SortColumn] = &[
    ("name", "d.name"),
    ("regionalDistrictCode", "d.regional_district_code"),
    ("createdAt", "d.created_at"),
    ("districtId", "d.district_id"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDistrict {
    pub name: Option<String>,
    pub regional_district_code: Option<String>,
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDistrict {
    pub name: Option<String>,
    pub regional_district_code: Option<String>,
    pub contact_info: Option<String>,
    pub is_active: Option<bool>,
}

pub struct DistrictService {
    pool: PgPool,
    pagination: PaginationConfig,
}

impl DistrictService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn create(&self, actor: &Actor, input: CreateDistrict) -> Result<District, ApiError> {
        let (name, code) = match (validate::present(input.name), validate::present(input.regional_district_code)) {
            (Some(name), Some(code)) => (name, code),
            _ => {
                return Err(ApiError::bad_request(
                    "El nombre del distrito y el código regional-distrito son requeridos.",
                ))
            }
        };
        check_code(&code)?;
        self.ensure_code_free(&code, None).await?;

        let district_id: i64 = sqlx::query_scalar(
            "INSERT INTO districts (name, regional_district_code, contact_info, created_by) \
             VALUES ($1, $2, $3, $4) RETURNING district_id",
        )
        .bind(&name)
        .bind(&code)
        .bind(validate::present(input.contact_info))
        .bind(actor.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as_conflict(DUPLICATE_CODE))?;

        info!(district_id, user_id = actor.user_id, "District created");
        self.get(district_id).await
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Page<District>, ApiError> {
        let request = PageRequest::from_query(query, DEFAULT_PAGE_SIZE, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Asc, "d.district_id");

        let mut conditions = Conditions::new();
        conditions
            .bind_opt("d.is_active =", query.flag("isActive")?)
            .contains("d.name", query.text("search"));

        let page = fetch_page(&self.pool, District::COLUMNS, "FROM districts d", &conditions, &sort, request).await?;
        Ok(page)
    }

    pub async fn get(&self, district_id: i64) -> Result<District, ApiError> {
        let sql = format!("SELECT {} FROM districts d WHERE d.district_id = $1", District::COLUMNS);
        sqlx::query_as::<_, District>(&sql)
            .bind(district_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    pub async fn update(&self, actor: &Actor, district_id: i64, input: UpdateDistrict) -> Result<District, ApiError> {
        let code = validate::present(input.regional_district_code);
        if let Some(code) = &code {
            check_code(code)?;
            self.ensure_code_free(code, Some(district_id)).await?;
        }

        let mut set = UpdateSet::new("districts", "district_id");
        set.set("name", validate::present(input.name))
            .set("regional_district_code", code)
            .set("contact_info", input.contact_info)
            .set("is_active", input.is_active);
        if set.is_empty() {
            return Err(ApiError::bad_request("Debe proporcionar al menos un campo para actualizar."));
        }

        if !set.execute(&self.pool, district_id).await.map_err(db_unique_as_conflict(DUPLICATE_CODE))? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(district_id, user_id = actor.user_id, "District updated");
        self.get(district_id).await
    }

    pub async fn delete(&self, actor: &Actor, district_id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM districts WHERE district_id = $1")
            .bind(district_id)
            .execute(&self.pool)
            .await
            .map_err(referenced_as_conflict(
                "No se puede eliminar el distrito porque tiene instituciones asociadas.",
            ))?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        info!(district_id, user_id = actor.user_id, "District deleted");
        Ok(())
    }

    async fn ensure_code_free(&self, code: &str, except: Option<i64>) -> Result<(), ApiError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM districts WHERE regional_district_code = $1 \
             AND ($2::BIGINT IS NULL OR district_id <> $2))",
        )
        .bind(code)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ApiError::conflict(DUPLICATE_CODE));
        }
        Ok(())
    }
}

fn check_code(code: &str) -> Result<(), ApiError> {
    if validate::is_district_code(code) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "El código regional-distrito debe tener formato XX-XX (Ej: 10-06).",
        ))
    }
}
