use axum::{extract::State, http::StatusCode};

use crate::database::models::BiometricTemplate;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId};
use crate::scope::Actor;
use crate::services::biometric_service::{BiometricService, EnrollTemplate, Enrollment};
use crate::state::AppState;

/// 201 for a first enrollment, 200 when the student's template was replaced.
pub async fn enroll(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<EnrollTemplate>,
) -> ApiResult<BiometricTemplate> {
    let (template, enrollment) = BiometricService::new(&state).enroll(&actor, input).await?;
    let response = ApiResponse::success("template", template);
    Ok(match enrollment {
        Enrollment::Created => response
            .with_status(StatusCode::CREATED)
            .with_message("Plantilla biométrica registrada exitosamente."),
        Enrollment::Replaced => response.with_message("Plantilla biométrica actualizada exitosamente."),
    })
}

pub async fn get_for_student(
    State(state): State<AppState>,
    actor: Actor,
    PathId(student_id): PathId,
) -> ApiResult<BiometricTemplate> {
    let template = BiometricService::new(&state).get_for_student(&actor, student_id).await?;
    Ok(ApiResponse::success("template", template))
}

pub async fn delete(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<()> {
    BiometricService::new(&state).delete(&actor, id).await?;
    Ok(ApiResponse::message("Plantilla biométrica eliminada exitosamente."))
}
