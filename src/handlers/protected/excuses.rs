use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::DailyExcuse;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, QueryParams};
use crate::scope::Actor;
use crate::services::excuse_service::{CreateExcuse, ExcuseService, UpdateExcuse};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<CreateExcuse>,
) -> ApiResult<DailyExcuse> {
    let excuse = ExcuseService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("excuse", excuse).with_message("Excusa registrada exitosamente."))
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<DailyExcuse>> {
    let page = ExcuseService::new(&state).list(&actor, &query).await?;
    Ok(ApiResponse::page("excuses", page))
}

/// GET /api/excuses/:id, where `id` is a student.
pub async fn list_for_student(
    State(state): State<AppState>,
    actor: Actor,
    PathId(student_id): PathId,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<DailyExcuse>> {
    let page = ExcuseService::new(&state).list_for_student(&actor, student_id, &query).await?;
    Ok(ApiResponse::page("excuses", page))
}

pub async fn get(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<DailyExcuse> {
    Ok(ApiResponse::success("excuse", ExcuseService::new(&state).get(&actor, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateExcuse>,
) -> ApiResult<DailyExcuse> {
    let excuse = ExcuseService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("excuse", excuse).with_message("Excusa actualizada exitosamente."))
}

pub async fn delete(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<()> {
    ExcuseService::new(&state).delete(&actor, id).await?;
    Ok(ApiResponse::message("Excusa eliminada exitosamente."))
}
