use axum::extract::State;

use crate::database::listing::ListQuery;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, PathId, QueryParams};
use crate::scope::Actor;
use crate::services::user_service::{CreateUser, UpdateUser, UserService};
use crate::state::AppState;

pub async fn create(State(state): State<AppState>, actor: Actor, JsonBody(input): JsonBody<CreateUser>) -> ApiResult<User> {
    let user = UserService::new(&state).create(&actor, input).await?;
    Ok(ApiResponse::created("user", user).with_message("Usuario creado exitosamente."))
}

/// Serves both `GET /api/users` and `GET /api/users/filter`.
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<User>> {
    let page = UserService::new(&state).list(&actor, &query).await?;
    Ok(ApiResponse::page("users", page))
}

pub async fn get(State(state): State<AppState>, actor: Actor, PathId(id): PathId) -> ApiResult<User> {
    Ok(ApiResponse::success("user", UserService::new(&state).get(&actor, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    PathId(id): PathId,
    JsonBody(input): JsonBody<UpdateUser>,
) -> ApiResult<User> {
    let user = UserService::new(&state).update(&actor, id, input).await?;
    Ok(ApiResponse::success("user", user).with_message("Usuario actualizado exitosamente."))
}
