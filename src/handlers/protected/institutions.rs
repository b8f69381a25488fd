use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::Institution;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, QueryParams};
use crate::scope::Actor;
use crate::services::institution_service::{CreateInstitution, InstitutionService, UpdateInstitution};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<CreateInstitution>,
) -> ApiResult<Institution> {
    let institution = InstitutionService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("institution", institution).with_message("Institución creada exitosamente."))
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<Institution>> {
    let page = InstitutionService::new(&state).list(&actor, &query).await?;
    Ok(ApiResponse::page("institutions", page))
}

pub async fn get(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<Institution> {
    let institution = InstitutionService::new(&state).get(&actor, id).await?;
    Ok(ApiResponse::success("institution", institution))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateInstitution>,
) -> ApiResult<Institution> {
    let institution = InstitutionService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("institution", institution).with_message("Institución actualizada exitosamente."))
}

pub async fn delete(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<()> {
    InstitutionService::new(&state).delete(&actor, id).await?;
    Ok(ApiResponse::message("Institución eliminada exitosamente."))
}
