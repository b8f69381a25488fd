use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::auth::{password, Role};
use crate::config::{PaginationConfig, SecurityConfig};
use crate::database::changes::UpdateSet;
use crate::database::listing::{
    fetch_optional, fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec,
};
use crate::database::models::User;
use crate::error::ApiError;
use crate::scope::Actor;
use crate::state::AppState;
use crate::validate::{self, IdInput};

use super::db_unique_as_conflict;
use super::unique_as_conflict;
use super::user_matrix::{creation_rule, denial_message, ScopeRule};

const DEFAULT_PAGE_SIZE: i64 = 10;
const NOT_FOUND: &str = "Usuario no encontrado.";
const DUPLICATE: &str = "El nombre de usuario o correo electrónico ya está en uso.";
const MISSING_REFERENCE: &str = "El Rol, Institución o Distrito especificado no existe.";

const SORTABLE: &[SortColumn] = &[
    ("username", "u.username"),
    ("lastName", "u.last_name"),
    ("createdAt", "u.created_at"),
    ("userId", "u.user_id"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role_id: Option<IdInput>,
    pub role_name: Option<String>,
    pub institution_id: Option<IdInput>,
    pub district_id: Option<IdInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role_id: Option<IdInput>,
    pub institution_id: Option<IdInput>,
    pub district_id: Option<IdInput>,
    pub is_ministry_user: Option<bool>,
    pub is_active: Option<bool>,
}

/// Where a new user ends up in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    institution_id: Option<i64>,
    district_id: Option<i64>,
    is_ministry_user: bool,
}

/// Adds the predicate limiting which users `actor` may see.
pub fn restrict_visibility(actor: &Actor, conditions: &mut Conditions) -> Result<(), ApiError> {
    if actor.is(Role::AdminApp) {
        return Ok(());
    }
    if actor.is_ministry() {
        conditions.raw("r.role_name <> 'AdminApp'");
        return Ok(());
    }
    match (actor.role, actor.district_id, actor.institution_id) {
        (Some(Role::AdminDistrito), Some(district_id), _) => {
            conditions
                .raw("r.role_name = 'AdminInstitucion'")
                .bind("COALESCE(ui.district_id, u.district_id) =", district_id);
            Ok(())
        }
        (Some(Role::AdminInstitucion), _, Some(institution_id)) => {
            conditions
                .raw("r.role_name IN ('Profesor', 'PersonalApoyo')")
                .bind("u.institution_id =", institution_id);
            Ok(())
        }
        _ => Err(ApiError::forbidden("No tiene permiso para ver usuarios.")),
    }
}

/// Whether `actor` may edit a user with the given role and placement.
/// `target_district` is the user's district through their institution when bound to one.
pub fn can_manage(actor: &Actor, target_role: Option<Role>, target_institution: Option<i64>, target_district: Option<i64>) -> bool {
    if actor.is(Role::AdminApp) {
        return true;
    }
    if actor.is_ministry() {
        return target_role != Some(Role::AdminApp);
    }
    match actor.role {
        Some(Role::AdminDistrito) => {
            target_role == Some(Role::AdminInstitucion) && actor.district_id.is_some() && target_district == actor.district_id
        }
        Some(Role::AdminInstitucion) => {
            matches!(target_role, Some(Role::Profesor) | Some(Role::PersonalApoyo))
                && actor.institution_id.is_some()
                && target_institution == actor.institution_id
        }
        _ => false,
    }
}

/// Moving a user to AdminMinisterio raises the ministry flag unless the request sets it.
fn ministry_flag(new_role: Option<&str>, requested: Option<bool>) -> Option<bool> {
    requested.or_else(|| (new_role == Some(Role::AdminMinisterio.as_str())).then_some(true))
}

pub struct UserService {
    pool: PgPool,
    pagination: PaginationConfig,
    security: SecurityConfig,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            pagination: state.config.pagination.clone(),
            security: state.config.security.clone(),
        }
    }

    pub async fn create(&self, actor: &Actor, input: CreateUser) -> Result<User, ApiError> {
        let username = validate::present(input.username.clone());
        let password = input.password.clone().filter(|p| !p.is_empty());
        let role_name = validate::present(input.role_name.clone());
        let role_id = validate::optional_id(input.role_id.as_ref(), "del rol")?;
        let (username, password) = match (username, password, role_name.is_some() || role_id.is_some()) {
            (Some(username), Some(password), true) => (username, password),
            _ => return Err(ApiError::bad_request("Nombre de usuario, contraseña y rol son requeridos.")),
        };
        validate::check_password(&password)?;

        let creator = actor.role.ok_or_else(|| ApiError::forbidden(denial_message(None)))?;

        // A role given by name is checked against the matrix before touching the store.
        let (target, role_id) = match role_name {
            Some(name) => {
                let target = Role::parse(&name).ok_or_else(|| ApiError::forbidden(denial_message(Some(creator))))?;
                check_matrix(creator, target)?;
                let role_id = self.role_id_by_name(target).await?;
                (target, role_id)
            }
            None => {
                let role_id = role_id.ok_or_else(|| ApiError::bad_request(MISSING_REFERENCE))?;
                let name = self.role_name_by_id(role_id).await?;
                let target = Role::parse(&name).ok_or_else(|| ApiError::forbidden(denial_message(Some(creator))))?;
                check_matrix(creator, target)?;
                (target, role_id)
            }
        };
        let rule = creation_rule(creator, target).ok_or_else(|| ApiError::forbidden(denial_message(Some(creator))))?;
        let placement = self.place(actor, target, rule, &input).await?;

        let email = validate::present(input.email);
        self.ensure_unique(&username, email.as_deref(), None).await?;
        let password_hash = password::hash(password, self.security.bcrypt_cost).await?;

        let user_id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password_hash, first_name, last_name, email, role_id, \
             institution_id, district_id, is_ministry_user) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING user_id",
        )
        .bind(&username)
        .bind(&password_hash)
        .bind(validate::present(input.first_name))
        .bind(validate::present(input.last_name))
        .bind(&email)
        .bind(role_id)
        .bind(placement.institution_id)
        .bind(placement.district_id)
        .bind(placement.is_ministry_user)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as_conflict(DUPLICATE))?;

        info!(user_id, role = %target, created_by = actor.user_id, "User created");
        self.fetch(user_id).await
    }

    pub async fn list(&self, actor: &Actor, query: &ListQuery) -> Result<Page<User>, ApiError> {
        let request = PageRequest::from_query(query, DEFAULT_PAGE_SIZE, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Asc, "u.user_id");

        let mut conditions = Conditions::new();
        restrict_visibility(actor, &mut conditions)?;
        conditions
            .bind_opt("u.user_id =", query.id("userId")?)
            .bind_opt("u.role_id =", query.id("roleId")?)
            .bind_opt("u.institution_id =", query.id("institutionId")?)
            .bind_opt("u.district_id =", query.id("districtId")?)
            .bind_opt("u.is_active =", query.flag("isActive")?)
            .contains("u.username", query.text("username"))
            .contains("u.first_name", query.text("firstName"))
            .contains("u.last_name", query.text("lastName"))
            .contains("u.email", query.text("email"));

        Ok(fetch_page(&self.pool, User::COLUMNS, User::FROM, &conditions, &sort, request).await?)
    }

    /// Users outside the caller's visibility look like they do not exist.
    pub async fn get(&self, actor: &Actor, user_id: i64) -> Result<User, ApiError> {
        let mut conditions = Conditions::new();
        restrict_visibility(actor, &mut conditions)?;
        conditions.bind("u.user_id =", user_id);
        fetch_optional::<User>(&self.pool, User::COLUMNS, User::FROM, &conditions)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    pub async fn update(&self, actor: &Actor, user_id: i64, input: UpdateUser) -> Result<User, ApiError> {
        let target = self.fetch(user_id).await?;
        let target_district = self.scope_district_of(&target).await?;
        if !can_manage(actor, Role::parse(&target.role_name), target.institution_id, target_district) {
            return Err(ApiError::forbidden("No tiene permiso para actualizar este usuario."));
        }

        let role_id = validate::optional_id(input.role_id.as_ref(), "del rol")?;
        let institution_id = validate::optional_id(input.institution_id.as_ref(), "de la institución")?;
        let district_id = validate::optional_id(input.district_id.as_ref(), "del distrito")?;

        if !actor.is(Role::AdminApp) {
            if actor.is_ministry() {
                if role_id.is_some() || input.is_ministry_user.is_some() {
                    return Err(ApiError::forbidden("No tiene permiso para actualizar rol o estatus de ministerio."));
                }
            } else if role_id.is_some()
                || input.is_ministry_user.is_some()
                || institution_id.is_some()
                || district_id.is_some()
            {
                return Err(ApiError::forbidden(
                    "No tiene permiso para actualizar el rol, el estatus de ministerio o el ámbito del usuario.",
                ));
            }
        }
        let new_role = match role_id {
            Some(role_id) => Some(self.role_name_by_id(role_id).await?),
            None => None,
        };
        let is_ministry_user = ministry_flag(new_role.as_deref(), input.is_ministry_user);

        let username = validate::present(input.username);
        let email = validate::present(input.email);
        if username.is_some() || email.is_some() {
            self.ensure_unique(username.as_deref().unwrap_or(""), email.as_deref(), Some(user_id)).await?;
        }
        let password_hash = match input.password.filter(|p| !p.is_empty()) {
            Some(password) => {
                validate::check_password(&password)?;
                Some(password::hash(password, self.security.bcrypt_cost).await?)
            }
            None => None,
        };

        let mut set = UpdateSet::new("users", "user_id");
        set.set("username", username)
            .set("password_hash", password_hash)
            .set("first_name", validate::present(input.first_name))
            .set("last_name", validate::present(input.last_name))
            .set("email", email)
            .set("role_id", role_id)
            .set("institution_id", institution_id)
            .set("district_id", district_id)
            .set("is_ministry_user", is_ministry_user)
            .set("is_active", input.is_active);
        if set.is_empty() {
            return Err(ApiError::bad_request("No se proporcionaron campos válidos para actualizar."));
        }
        if !set.execute(&self.pool, user_id).await.map_err(db_unique_as_conflict(DUPLICATE))? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(user_id, updated_by = actor.user_id, "User updated");
        self.fetch(user_id).await
    }

    async fn place(&self, actor: &Actor, target: Role, rule: ScopeRule, input: &CreateUser) -> Result<Placement, ApiError> {
        let institution_id = validate::optional_id(input.institution_id.as_ref(), "de la institución")?;
        let district_id = validate::optional_id(input.district_id.as_ref(), "del distrito")?;
        let unscoped = Placement { institution_id: None, district_id: None, is_ministry_user: false };

        match rule {
            ScopeRule::Unscoped => Ok(unscoped),
            ScopeRule::Ministry => Ok(Placement { is_ministry_user: true, ..unscoped }),
            ScopeRule::ExistingDistrict => {
                let district_id = district_id
                    .ok_or_else(|| ApiError::bad_request(format!("Se requiere districtId para crear un {}.", target)))?;
                if !self.exists("SELECT EXISTS (SELECT 1 FROM districts WHERE district_id = $1)", district_id).await? {
                    return Err(ApiError::bad_request(MISSING_REFERENCE));
                }
                Ok(Placement { district_id: Some(district_id), ..unscoped })
            }
            ScopeRule::ExistingInstitution => {
                let institution_id = institution_id.ok_or_else(|| missing_institution(target))?;
                if self.institution_district(institution_id).await?.is_none() {
                    return Err(ApiError::bad_request(MISSING_REFERENCE));
                }
                Ok(Placement { institution_id: Some(institution_id), ..unscoped })
            }
            ScopeRule::InstitutionInCreatorDistrict => {
                let institution_id = institution_id.ok_or_else(|| missing_institution(target))?;
                let owner = self
                    .institution_district(institution_id)
                    .await?
                    .ok_or_else(|| ApiError::bad_request(MISSING_REFERENCE))?;
                if actor.district_id != Some(owner) {
                    return Err(ApiError::forbidden("No tiene permiso para crear usuarios para esta institución."));
                }
                Ok(Placement { institution_id: Some(institution_id), ..unscoped })
            }
            ScopeRule::CreatorInstitution => {
                let institution_id = actor
                    .institution_id
                    .ok_or_else(|| ApiError::forbidden("No tiene permiso para crear usuarios para esta institución."))?;
                Ok(Placement { institution_id: Some(institution_id), ..unscoped })
            }
        }
    }

    async fn fetch(&self, user_id: i64) -> Result<User, ApiError> {
        let mut conditions = Conditions::new();
        conditions.bind("u.user_id =", user_id);
        fetch_optional::<User>(&self.pool, User::COLUMNS, User::FROM, &conditions)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    async fn scope_district_of(&self, user: &User) -> Result<Option<i64>, ApiError> {
        match user.institution_id {
            Some(institution_id) => Ok(self.institution_district(institution_id).await?.or(user.district_id)),
            None => Ok(user.district_id),
        }
    }

    async fn institution_district(&self, institution_id: i64) -> Result<Option<i64>, ApiError> {
        let district = sqlx::query_scalar::<_, i64>("SELECT district_id FROM institutions WHERE institution_id = $1")
            .bind(institution_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(district)
    }

    async fn exists(&self, sql: &'static str, id: i64) -> Result<bool, ApiError> {
        Ok(sqlx::query_scalar::<_, bool>(sql).bind(id).fetch_one(&self.pool).await?)
    }

    async fn role_id_by_name(&self, role: Role) -> Result<i64, ApiError> {
        sqlx::query_scalar::<_, i64>("SELECT role_id FROM roles WHERE role_name = $1")
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::bad_request(MISSING_REFERENCE))
    }

    async fn role_name_by_id(&self, role_id: i64) -> Result<String, ApiError> {
        sqlx::query_scalar::<_, String>("SELECT role_name FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::bad_request(MISSING_REFERENCE))
    }

    async fn ensure_unique(&self, username: &str, email: Option<&str>, except: Option<i64>) -> Result<(), ApiError> {
        let collision: Option<(String, Option<String>)> = sqlx::query_as(
            "SELECT username, email FROM users \
             WHERE (username = $1 OR ($2::TEXT IS NOT NULL AND email = $2)) \
             AND ($3::BIGINT IS NULL OR user_id <> $3) LIMIT 1",
        )
        .bind(username)
        .bind(email)
        .bind(except)
        .fetch_optional(&self.pool)
        .await?;

        match collision {
            None => Ok(()),
            Some((existing, _)) if existing == username => {
                Err(ApiError::conflict("El nombre de usuario ya está en uso."))
            }
            Some(_) => Err(ApiError::conflict("El correo electrónico ya está en uso.")),
        }
    }
}

fn check_matrix(creator: Role, target: Role) -> Result<(), ApiError> {
    match creation_rule(creator, target) {
        Some(_) => Ok(()),
        None => Err(ApiError::forbidden(denial_message(Some(creator)))),
    }
}

fn missing_institution(target: Role) -> ApiError {
    if target == Role::AdminInstitucion {
        ApiError::bad_request("Se requiere institutionId para crear un AdminInstitucion.")
    } else {
        ApiError::bad_request("Se requiere institutionId para crear un Profesor o PersonalApoyo.")
    }
}
