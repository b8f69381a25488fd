use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::{Student, StudentGroup, StudentWithGroup};
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, QueryParams};
use crate::scope::Actor;
use crate::services::student_service::{CreateStudent, StudentService, UpdateStudent};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<CreateStudent>,
) -> ApiResult<Student> {
    let student = StudentService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("student", student).with_message("Estudiante registrado exitosamente."))
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<Student>> {
    let page = StudentService::new(&state).list(&actor, &query).await?;
    Ok(ApiResponse::page("students", page))
}

pub async fn with_groups(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<StudentWithGroup>> {
    let page = StudentService::new(&state).list_with_groups(&actor, &query).await?;
    Ok(ApiResponse::page("students", page))
}

pub async fn get(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<Student> {
    Ok(ApiResponse::success("student", StudentService::new(&state).get(&actor, id).await?))
}

pub async fn group(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<StudentGroup> {
    Ok(ApiResponse::success("group", StudentService::new(&state).group_of(&actor, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateStudent>,
) -> ApiResult<Student> {
    let student = StudentService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("student", student).with_message("Estudiante actualizado exitosamente."))
}
