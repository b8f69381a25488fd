use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::District;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, QueryParams};
use crate::scope::Actor;
use crate::services::district_service::{CreateDistrict, DistrictService, UpdateDistrict};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<CreateDistrict>,
) -> ApiResult<District> {
    let district = DistrictService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("district", district).with_message("Distrito creado exitosamente."))
}

pub async fn list(State(state): State<AppState>, QueryParams(query): QueryParams<ListQuery>) -> ApiResult<Vec<District>> {
    let page = DistrictService::new(&state).list(&query).await?;
    Ok(ApiResponse::page("districts", page))
}

pub async fn get(State(state): State<AppState>, PathId(id): PathId) -> ApiResult<District> {
    let district = DistrictService::new(&state).get(id).await?;
    Ok(ApiResponse::success("district", district))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateDistrict>,
) -> ApiResult<District> {
    let district = DistrictService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("district", district).with_message("Distrito actualizado exitosamente."))
}

pub async fn delete(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<()> {
    DistrictService::new(&state).delete(&actor, id).await?;
    Ok(ApiResponse::message("Distrito eliminado exitosamente."))
}
