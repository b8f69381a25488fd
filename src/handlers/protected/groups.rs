use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::{GroupMember, StudentGroup};
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, PathIds, QueryParams};
use crate::scope::Actor;
use crate::services::group_service::{AssignMembers, AssignmentOutcome, CreateGroup, GroupService, UpdateGroup};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(input): JsonBody<CreateGroup>,
) -> ApiResult<StudentGroup> {
    let group = GroupService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("group", group).with_message("Grupo creado exitosamente."))
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<StudentGroup>> {
    let page = GroupService::new(&state).list(&actor, &query).await?;
    Ok(ApiResponse::page("groups", page))
}

pub async fn get(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<StudentGroup> {
    Ok(ApiResponse::success("group", GroupService::new(&state).get(&actor, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateGroup>,
) -> ApiResult<StudentGroup> {
    let group = GroupService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("group", group).with_message("Grupo actualizado exitosamente."))
}

pub async fn assign_members(
    State(state): State<AppState>,
    actor: Actor,
    PathId(group_id): PathId,
    JsonBody(input): JsonBody<AssignMembers>,
) -> ApiResult<AssignmentOutcome> {
    let outcome = GroupService::new(&state).assign_members(&actor, group_id, input).await?;
    let message = outcome.message();
    Ok(ApiResponse::success("result", outcome).with_message(message))
}

pub async fn list_members(
    State(state): State<AppState>,
    actor: Actor,
    PathId(group_id): PathId,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<GroupMember>> {
    let page = GroupService::new(&state).list_members(&actor, group_id, &query).await?;
    Ok(ApiResponse::page("members", page))
}

pub async fn remove_member(
    State(state): State<AppState>,
    actor: Actor,
    PathIds(group_id, student_id): PathIds,
) -> ApiResult<()> {
    GroupService::new(&state).remove_member(&actor, group_id, student_id).await?;
    Ok(ApiResponse::message("Estudiante removido del grupo exitosamente."))
}
