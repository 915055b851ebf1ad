//! User and friendship endpoints

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;

use crate::AppState;
use crate::data::{NewUser, User, UserPatch};
use crate::error::Result;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(find_all).post(create).put(update))
        .route("/:id", get(find_by_id).delete(delete_user))
        .route("/:id/friends", get(find_friends))
        .route("/:id/friends/common/:other_id", get(find_common_friends))
        .route("/:id/friends/:friend_id", put(add_friend).delete(delete_friend))
}

async fn find_all(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.users.find_all().await?))
}

async fn find_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<User>> {
    Ok(Json(state.users.find_by_id(id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Result<Json<User>> {
    Ok(Json(state.users.create(new_user).await?))
}

async fn update(
    State(state): State<AppState>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>> {
    Ok(Json(state.users.update(patch).await?))
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<()> {
    state.users.delete(id).await
}

async fn find_friends(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.users.find_friends(id).await?))
}

async fn find_common_friends(
    State(state): State<AppState>,
    Path((id, other_id)): Path<(i64, i64)>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.users.find_common_friends(id, other_id).await?))
}

async fn add_friend(
    State(state): State<AppState>,
    Path((id, friend_id)): Path<(i64, i64)>,
) -> Result<Json<User>> {
    Ok(Json(state.users.add_friend(id, friend_id).await?))
}

async fn delete_friend(
    State(state): State<AppState>,
    Path((id, friend_id)): Path<(i64, i64)>,
) -> Result<Json<User>> {
    Ok(Json(state.users.delete_friend(id, friend_id).await?))
}
