use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use crate::config::PaginationConfig;
use crate::database::changes::UpdateSet;
use crate::database::listing::{
    fetch_optional, fetch_page, Conditions, ListQuery, Page, PageRequest, SortColumn, SortDirection, SortSpec,
};
use crate::database::models::{GroupMember, StudentGroup};
use crate::error::ApiError;
use crate::scope::{Actor, Masking, ScopeAuthorizer, ScopeTarget};
use crate::state::AppState;
use crate::validate::{self, IdInput};

use super::{db_unique_as_conflict, unique_as_conflict};

const NOT_FOUND: &str = "Grupo no encontrado.";
const DUPLICATE: &str = "Ya existe un grupo con ese nombre y año académico en su institución.";

const SORTABLE: &[SortColumn] = &[
    ("groupName", "g.group_name"),
    ("academicYear", "g.academic_year"),
    ("createdAt", "g.created_at"),
    ("updatedAt", "g.updated_at"),
];

const MEMBER_SORTABLE: &[SortColumn] = &[
    ("lastName", "s.last_name"),
    ("firstName", "s.first_name"),
    ("studentUniqueId", "s.student_unique_id"),
    ("status", "s.status"),
    ("assignmentDate", "m.assignment_date"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroup {
    pub group_name: Option<String>,
    pub academic_year: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroup {
    pub group_name: Option<String>,
    pub academic_year: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignMembers {
    pub student_ids: Option<Vec<IdInput>>,
}

/// Result of a member assignment; students already in the group are reported, not re-inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOutcome {
    pub group_id: i64,
    pub assigned: Vec<i64>,
    pub already_members: Vec<i64>,
}

impl AssignmentOutcome {
    pub fn message(&self) -> String {
        let mut message = format!("{} estudiante(s) asignado(s) al grupo.", self.assigned.len());
        if !self.already_members.is_empty() {
            message.push_str(&format!(
                " {} estudiante(s) ya era(n) miembro(s) del grupo.",
                self.already_members.len()
            ));
        }
        message
    }
}

/// Parsed ids in request order, duplicates dropped.
fn distinct_ids(raw: &[IdInput]) -> Result<Vec<i64>, ApiError> {
    let mut ids = Vec::with_capacity(raw.len());
    for input in raw {
        let id = input.value("del estudiante")?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub struct GroupService {
    pool: PgPool,
    scope: ScopeAuthorizer,
    pagination: PaginationConfig,
}

impl GroupService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            scope: state.scope.clone(),
            pagination: state.config.pagination.clone(),
        }
    }

    pub async fn create(&self, actor: &Actor, input: CreateGroup) -> Result<StudentGroup, ApiError> {
        let institution_id = actor
            .institution_id
            .ok_or_else(|| ApiError::forbidden("Su usuario no está asociado a una institución."))?;
        let (group_name, academic_year) =
            match (validate::present(input.group_name), validate::present(input.academic_year)) {
                (Some(name), Some(year)) => (name, year),
                _ => return Err(ApiError::bad_request("GroupName y AcademicYear son requeridos.")),
            };
        self.ensure_name_free(institution_id, &group_name, &academic_year, None).await?;

        let group_id: i64 = sqlx::query_scalar(
            "INSERT INTO student_groups (institution_id, group_name, academic_year, description, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING group_id",
        )
        .bind(institution_id)
        .bind(&group_name)
        .bind(&academic_year)
        .bind(validate::present(input.description))
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as_conflict(DUPLICATE))?;

        info!(group_id, institution_id, user_id = actor.user_id, "Student group created");
        self.fetch(group_id).await
    }

    pub async fn list(&self, actor: &Actor, query: &ListQuery) -> Result<Page<StudentGroup>, ApiError> {
        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, SORTABLE, SORTABLE[0], SortDirection::Asc, "g.group_id");

        let mut conditions = Conditions::new();
        actor.list_scope().restrict(
            &mut conditions,
            "g.institution_id",
            "i.district_id",
            "No tiene permiso para ver grupos.",
        )?;
        conditions
            .bind_opt("g.academic_year =", query.text("academicYear"))
            .bind_opt("g.is_active =", query.flag("isActive")?);

        Ok(fetch_page(&self.pool, StudentGroup::COLUMNS, StudentGroup::FROM, &conditions, &sort, request).await?)
    }

    /// Groups outside the caller's scope are reported as missing.
    pub async fn get(&self, actor: &Actor, group_id: i64) -> Result<StudentGroup, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Group(group_id))
            .await?
            .require(actor, Masking::Always, "No tiene permiso para ver este grupo.", NOT_FOUND)?;
        self.fetch(group_id).await
    }

    pub async fn update(&self, actor: &Actor, group_id: i64, input: UpdateGroup) -> Result<StudentGroup, ApiError> {
        let institution_id = self
            .scope
            .authorize(actor, ScopeTarget::Group(group_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para actualizar este grupo.", NOT_FOUND)?;

        let group_name = validate::present(input.group_name);
        let academic_year = validate::present(input.academic_year);
        if group_name.is_some() || academic_year.is_some() {
            let current = self.fetch(group_id).await?;
            let name = group_name.as_deref().unwrap_or(&current.group_name);
            let year = academic_year.as_deref().unwrap_or(&current.academic_year);
            self.ensure_name_free(institution_id, name, year, Some(group_id)).await?;
        }

        let mut set = UpdateSet::new("student_groups", "group_id");
        set.set("group_name", group_name)
            .set("academic_year", academic_year)
            .set("description", input.description)
            .set("is_active", input.is_active);
        if set.is_empty() {
            return Err(ApiError::bad_request("No se proporcionaron campos para actualizar."));
        }
        if !set.execute(&self.pool, group_id).await.map_err(db_unique_as_conflict(DUPLICATE))? {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(group_id, user_id = actor.user_id, "Student group updated");
        self.fetch(group_id).await
    }

    /// All-or-nothing: every student must exist and belong to the group's
    /// institution before any membership is written.
    pub async fn assign_members(&self, actor: &Actor, group_id: i64, input: AssignMembers) -> Result<AssignmentOutcome, ApiError> {
        let raw = input.student_ids.unwrap_or_default();
        if raw.is_empty() {
            return Err(ApiError::bad_request("Se requiere un array de studentIds no vacío."));
        }
        let student_ids = distinct_ids(&raw)?;

        let institution_id = self
            .scope
            .authorize(actor, ScopeTarget::Group(group_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para modificar este grupo.", NOT_FOUND)?;

        let mut tx = self.pool.begin().await?;

        let owners: Vec<(i64, i64)> =
            sqlx::query_as("SELECT student_id, institution_id FROM students WHERE student_id = ANY($1)")
                .bind(&student_ids)
                .fetch_all(&mut *tx)
                .await?;
        if owners.len() != student_ids.len() {
            return Err(ApiError::bad_request("Uno o más IDs de estudiante no fueron encontrados."));
        }
        if owners.iter().any(|(_, owner)| *owner != institution_id) {
            return Err(ApiError::forbidden("Uno o más estudiantes no pertenecen a su institución."));
        }

        let mut outcome = AssignmentOutcome { group_id, ..Default::default() };
        for student_id in student_ids {
            let inserted = sqlx::query(
                "INSERT INTO student_group_members (student_id, group_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(student_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() == 0 {
                outcome.already_members.push(student_id);
            } else {
                outcome.assigned.push(student_id);
            }
        }
        tx.commit().await?;

        info!(
            group_id,
            assigned = outcome.assigned.len(),
            already_members = outcome.already_members.len(),
            user_id = actor.user_id,
            "Group members assigned"
        );
        Ok(outcome)
    }

    pub async fn remove_member(&self, actor: &Actor, group_id: i64, student_id: i64) -> Result<(), ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Group(group_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para modificar este grupo.", NOT_FOUND)?;

        let result = sqlx::query("DELETE FROM student_group_members WHERE group_id = $1 AND student_id = $2")
            .bind(group_id)
            .bind(student_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("El estudiante no es miembro de este grupo."));
        }

        info!(group_id, student_id, user_id = actor.user_id, "Group member removed");
        Ok(())
    }

    pub async fn list_members(&self, actor: &Actor, group_id: i64, query: &ListQuery) -> Result<Page<GroupMember>, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Group(group_id))
            .await?
            .require(actor, Masking::Always, "No tiene permiso para ver este grupo.", NOT_FOUND)?;

        let request = PageRequest::from_query(query, self.pagination.default_limit, &self.pagination)?;
        let sort = SortSpec::resolve(query, MEMBER_SORTABLE, MEMBER_SORTABLE[0], SortDirection::Asc, "s.student_id");
        let mut conditions = Conditions::new();
        conditions.bind("m.group_id =", group_id);

        Ok(fetch_page(&self.pool, GroupMember::COLUMNS, GroupMember::FROM, &conditions, &sort, request).await?)
    }

    async fn fetch(&self, group_id: i64) -> Result<StudentGroup, ApiError> {
        let mut conditions = Conditions::new();
        conditions.bind("g.group_id =", group_id);
        fetch_optional::<StudentGroup>(&self.pool, StudentGroup::COLUMNS, StudentGroup::FROM, &conditions)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    async fn ensure_name_free(
        &self,
        institution_id: i64,
        group_name: &str,
        academic_year: &str,
        except: Option<i64>,
    ) -> Result<(), ApiError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM student_groups WHERE institution_id = $1 AND group_name = $2 \
             AND academic_year = $3 AND ($4::BIGINT IS NULL OR group_id <> $4))",
        )
        .bind(institution_id)
        .bind(group_name)
        .bind(academic_year)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ApiError::conflict(DUPLICATE));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_collapse_in_order() {
        let raw = vec![IdInput::Number(4), IdInput::Text("2".into()), IdInput::Number(4)];
        assert_eq!(distinct_ids(&raw).unwrap(), vec![4, 2]);

        let bad = vec![IdInput::Text("dos".into())];
        assert_eq!(distinct_ids(&bad).unwrap_err().status_code(), 400);
    }

    #[test]
    fn outcome_message_mentions_existing_members() {
        let fresh = AssignmentOutcome { group_id: 1, assigned: vec![3, 4], already_members: vec![] };
        assert_eq!(fresh.message(), "2 estudiante(s) asignado(s) al grupo.");

        let repeat = AssignmentOutcome { group_id: 1, assigned: vec![], already_members: vec![3] };
        assert!(repeat.message().contains("ya era(n) miembro(s)"));
    }
}
