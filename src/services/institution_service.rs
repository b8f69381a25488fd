use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;

use crate::auth::Role;
use crate::config::PaginationConfig;
use crate::database::changes::UpdateSet;
use crate::database::listing::{fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec};
use crate::database::models::Institution;
use crate::error::ApiError;
use crate::scope::{Actor, Masking, ScopeAuthorizer, ScopeTarget};
use crate::state::AppState;
use crate::validate::{self, IdInput};

use super::{db_unique_as_conflict, referenced_as_conflict, unique_as_conflict};

const NOT_FOUND: &str = "Institución no encontrada.";
const DUPLICATE: &str = "Conflicto: Posible institución duplicada.";

const SORTABLE: &[SortColumn] = &[
    ("name", "i.name"),
    ("subscriptionStatus", "i.subscription_status"),
    ("createdAt", "i.created_at"),
    ("institutionId", "i.institution_id"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstitution {
    pub name: Option<String>,
    pub district_id: Option<IdInput>,
    pub address: Option<String>,
    pub subscription_status: Option<String>,
    pub configuration_data: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstitution {
    pub name: Option<String>,
    pub district_id: Option<IdInput>,
    pub address: Option<String>,
    pub subscription_status: Option<String>,
    pub configuration_data: Option<Value>,
}

/// Institution admins, ministry users and AdminApp may see the configuration blob.
fn sees_configuration(actor: &Actor) -> bool {
    actor.has_full_scope() || actor.is(Role::AdminInstitucion)
}

pub struct InstitutionService {
    pool: PgPool,
    scope: ScopeAuthorizer,
    pagination: PaginationConfig,
}

impl InstitutionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            scope: state.scope.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn create(&self, actor: &Actor, input: CreateInstitution) -> Result<Institution, ApiError> {
        let name = validate::present(input.name);
        let district_id = validate::optional_id(input.district_id.as_ref(), "del distrito")?;
        let (name, district_id) = match (name, district_id) {
            (Some(name), Some(district_id)) => (name, district_id),
            _ => return Err(ApiError::bad_request("Nombre y DistrictID son requeridos.")),
        };

        if actor.is(Role::AdminDistrito) && actor.district_id != Some(district_id) {
            return Err(ApiError::forbidden(
                "AdminDistrito solo puede crear instituciones en su propio distrito.",
            ));
        }
        self.ensure_district_exists(district_id).await?;

        let institution_id: i64 = sqlx::query_scalar(
            "INSERT INTO institutions (name, district_id, address, subscription_status, configuration_data) \
             VALUES ($1, $2, $3, $4, $5) RETURNING institution_id",
        )
        .bind(&name)
        .bind(district_id)
        .bind(validate::present(input.address))
        .bind(validate::present(input.subscription_status).unwrap_or_else(|| "Active".to_string()))
        .bind(input.configuration_data)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as_conflict(DUPLICATE))?;

        info!(institution_id, district_id, user_id = actor.user_id, "Institution created");
        let institution = self.fetch(institution_id).await?;
        Ok(self.visible_to(actor, institution))
    }

    pub async fn list(&self, actor: &Actor, query: &ListQuery) -> Result<Page<Institution>, ApiError> {
        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Asc, "i.institution_id");

        let mut conditions = Conditions::new();
        actor.list_scope().restrict(
            &mut conditions,
            "i.institution_id",
            "i.district_id",
            "No tiene permiso para ver instituciones.",
        )?;
        conditions
            .bind_opt("i.district_id =", query.id("districtId")?)
            .bind_opt("i.subscription_status =", query.text("subscriptionStatus"))
            .contains("i.name", query.text("search"));

        let mut page = fetch_page::<Institution>(&self.pool, Institution::COLUMNS, Institution::FROM, &conditions, &sort, request)
            .await?;
        page.items = page.items.into_iter().map(|i| self.visible_to(actor, i)).collect();
        Ok(page)
    }

    /// Out-of-scope institution admins get a 404, everyone else a 403.
    pub async fn get(&self, actor: &Actor, institution_id: i64) -> Result<Institution, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Institution(institution_id))
            .await?
            .require(
                actor,
                Masking::Roles(&[Role::AdminInstitucion]),
                "No tiene permiso para ver esta institución.",
                NOT_FOUND,
            )?;

        let institution = self.fetch(institution_id).await?;
        Ok(self.visible_to(actor, institution))
    }

    pub async fn update(
        &self,
        actor: &Actor,
        institution_id: i64,
        input: UpdateInstitution,
    ) -> Result<Institution, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Institution(institution_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para actualizar esta institución.", NOT_FOUND)?;
        if actor.is(Role::AdminInstitucion) {
            return Err(ApiError::forbidden("No tiene permiso para actualizar esta institución."));
        }

        let current = self.fetch(institution_id).await?;
        let new_district = match validate::optional_id(input.district_id.as_ref(), "del distrito")? {
            Some(district_id) if district_id != current.district_id => {
                if !actor.has_full_scope() {
                    return Err(ApiError::forbidden(
                        "AdminDistrito no puede cambiar el distrito de una institución.",
                    ));
                }
                self.ensure_district_exists(district_id).await?;
                Some(district_id)
            }
            _ => None,
        };

        let mut set = UpdateSet::new("institutions", "institution_id");
        set.set("name", validate::present(input.name))
            .set("district_id", new_district)
            .set("address", input.address)
            .set("subscription_status", validate::present(input.subscription_status))
            .set("configuration_data", input.configuration_data);
        if set.is_empty() {
            return Err(ApiError::bad_request("No se han proporcionado cambios para aplicar."));
        }
        if !set.execute(&self.pool, institution_id).await.map_err(db_unique_as_conflict(DUPLICATE))? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(institution_id, user_id = actor.user_id, "Institution updated");
        let institution = self.fetch(institution_id).await?;
        Ok(self.visible_to(actor, institution))
    }

    pub async fn delete(&self, actor: &Actor, institution_id: i64) -> Result<(), ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Institution(institution_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para eliminar esta institución.", NOT_FOUND)?;
        if actor.is(Role::AdminInstitucion) {
            return Err(ApiError::forbidden("No tiene permiso para eliminar esta institución."));
        }

        let result = sqlx::query("DELETE FROM institutions WHERE institution_id = $1")
            .bind(institution_id)
            .execute(&self.pool)
            .await
            .map_err(referenced_as_conflict(
                "No se puede eliminar la institución porque tiene registros asociados (grupos, asistencia, etc.). \
                 Elimine primero los registros dependientes.",
            ))?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(institution_id, user_id = actor.user_id, "Institution deleted");
        Ok(())
    }

    async fn fetch(&self, institution_id: i64) -> Result<Institution, ApiError> {
        let sql = format!("SELECT {} {} WHERE i.institution_id = $1", Institution::COLUMNS, Institution::FROM);
        sqlx::query_as::<_, Institution>(&sql)
            .bind(institution_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    async fn ensure_district_exists(&self, district_id: i64) -> Result<(), ApiError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM districts WHERE district_id = $1)")
            .bind(district_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(ApiError::bad_request(format!("Distrito con ID {} no encontrado.", district_id)));
        }
        Ok(())
    }

    fn visible_to(&self, actor: &Actor, institution: Institution) -> Institution {
        if sees_configuration(actor) {
            institution
        } else {
            institution.without_configuration()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::testing::actor;

    #[test]
    fn configuration_visibility() {
        assert!(sees_configuration(&actor(Role::AdminApp, None, None)));
        assert!(sees_configuration(&actor(Role::AdminMinisterio, None, None)));
        assert!(sees_configuration(&actor(Role::AdminInstitucion, Some(7), None)));
        assert!(!sees_configuration(&actor(Role::AdminDistrito, None, Some(1))));
        assert!(!sees_configuration(&actor(Role::Profesor, Some(7), None)));
    }
}
