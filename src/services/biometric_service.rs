use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::database::models::BiometricTemplate;
use crate::error::ApiError;
use crate::scope::{Actor, Masking, ScopeAuthorizer, ScopeTarget};
use crate::state::AppState;
use crate::validate::{self, IdInput};

const NOT_FOUND: &str = "Plantilla biométrica no encontrada.";
const STUDENT_NOT_FOUND: &str = "Estudiante no encontrado.";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollTemplate {
    pub student_id: Option<IdInput>,
    pub template_data: Option<String>,
    pub finger_index: Option<i32>,
}

/// Whether an enrollment wrote a new template or replaced the student's existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    Created,
    Replaced,
}

pub struct BiometricService {
    pool: PgPool,
    scope: ScopeAuthorizer,
}

impl BiometricService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            scope: state.scope.clone(),
        }
    }

    /// One template per student; enrolling again replaces the payload.
    pub async fn enroll(&self, actor: &Actor, input: EnrollTemplate) -> Result<(BiometricTemplate, Enrollment), ApiError> {
        let student_id = validate::optional_id(input.student_id.as_ref(), "del estudiante")?;
        let template_data = input.template_data.filter(|data| !data.is_empty());
        let (student_id, template_data) = match (student_id, template_data) {
            (Some(student_id), Some(template_data)) => (student_id, template_data),
            _ => return Err(ApiError::bad_request("StudentID y TemplateData son requeridos.")),
        };

        self.scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(
                actor,
                Masking::None,
                "No tiene permiso para registrar datos biométricos de este estudiante.",
                STUDENT_NOT_FOUND,
            )?;

        // xmax is zero only for a freshly inserted row.
        let (template_id, inserted): (i64, bool) = sqlx::query_as(
            "INSERT INTO biometric_templates (student_id, template_data, finger_index, enrolled_by) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (student_id) DO UPDATE SET template_data = EXCLUDED.template_data, \
             finger_index = EXCLUDED.finger_index, enrolled_by = EXCLUDED.enrolled_by, \
             is_active = TRUE, updated_at = NOW() \
             RETURNING template_id, (xmax = 0) AS inserted",
        )
        .bind(student_id)
        .bind(template_data.into_bytes())
        .bind(input.finger_index)
        .bind(actor.user_id)
        .fetch_one(&self.pool)
        .await?;

        let enrollment = if inserted { Enrollment::Created } else { Enrollment::Replaced };
        info!(template_id, student_id, ?enrollment, user_id = actor.user_id, "Biometric template enrolled");
        let template = self.fetch("template_id", template_id).await?;
        Ok((template, enrollment))
    }

    pub async fn get_for_student(&self, actor: &Actor, student_id: i64) -> Result<BiometricTemplate, ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::Student(student_id))
            .await?
            .require(
                actor,
                Masking::None,
                "No tiene permiso para ver datos biométricos de este estudiante.",
                STUDENT_NOT_FOUND,
            )?;
        self.fetch("student_id", student_id).await
    }

    pub async fn delete(&self, actor: &Actor, template_id: i64) -> Result<(), ApiError> {
        self.scope
            .authorize(actor, ScopeTarget::BiometricTemplate(template_id))
            .await?
            .require(actor, Masking::None, "No tiene permiso para eliminar esta plantilla biométrica.", NOT_FOUND)?;

        let result = sqlx::query("DELETE FROM biometric_templates WHERE template_id = $1")
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        info!(template_id, user_id = actor.user_id, "Biometric template deleted");
        Ok(())
    }

    async fn fetch(&self, key_column: &'static str, id: i64) -> Result<BiometricTemplate, ApiError> {
        let sql = format!("SELECT {} FROM biometric_templates WHERE {} = $1", BiometricTemplate::COLUMNS, key_column);
        sqlx::query_as::<_, BiometricTemplate>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }
}
