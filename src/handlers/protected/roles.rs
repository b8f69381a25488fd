use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::RoleRecord;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, QueryParams};
use crate::scope::Actor;
use crate::services::role_service::{CreateRole, RoleService, UpdateRole};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<CreateRole>,
) -> ApiResult<RoleRecord> {
    let role = RoleService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("role", role).with_message("Rol creado exitosamente."))
}

pub async fn list(State(state): State<AppState>, QueryParams(query): QueryParams<ListQuery>) -> ApiResult<Vec<RoleRecord>> {
    let page = RoleService::new(&state).list(&query).await?;
    Ok(ApiResponse::page("roles", page))
}

pub async fn get(State(state): State<AppState>, PathId(id): PathId) -> ApiResult<RoleRecord> {
    Ok(ApiResponse::success("role", RoleService::new(&state).get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateRole>,
) -> ApiResult<RoleRecord> {
    let role = RoleService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("role", role).with_message("Rol actualizado exitosamente."))
}

pub async fn delete(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<()> {
    RoleService::new(&state).delete(&actor, id).await?;
    Ok(ApiResponse::message("Rol eliminado exitosamente."))
}
