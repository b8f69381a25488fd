use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::AttendanceRecord;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, QueryParams};
use crate::scope::Actor;
use crate::services::attendance_service::{AttendanceService, CreateAttendance, UpdateAttendance};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<CreateAttendance>,
) -> ApiResult<AttendanceRecord> {
    let record = AttendanceService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("attendance", record).with_message("Asistencia registrada exitosamente."))
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<AttendanceRecord>> {
    let page = AttendanceService::new(&state).list(&actor, &query).await?;
    Ok(ApiResponse::page("attendances", page))
}

/// GET /api/attendances/:id, where `id` is a student.
pub async fn list_for_student(
    State(state): State<AppState>,
    actor: Actor,
    PathId(student_id): PathId,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<AttendanceRecord>> {
    let page = AttendanceService::new(&state).list_for_student(&actor, student_id, &query).await?;
    Ok(ApiResponse::page("attendances", page))
}

pub async fn get(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<AttendanceRecord> {
    Ok(ApiResponse::success("attendance", AttendanceService::new(&state).get(&actor, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateAttendance>,
) -> ApiResult<AttendanceRecord> {
    let record = AttendanceService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("attendance", record).with_message("Registro de asistencia actualizado exitosamente."))
}

pub async fn delete(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<()> {
    AttendanceService::new(&state).delete(&actor, id).await?;
    Ok(ApiResponse::message("Registro de asistencia eliminado exitosamente."))
}
