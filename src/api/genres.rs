//! Genre catalog endpoints

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;

use crate::AppState;
use crate::data::Genre;
use crate::error::Result;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(find_all).post(create).put(update))
        .route("/:id", get(find_by_id).delete(delete_genre))
}

async fn find_all(State(state): State<AppState>) -> Result<Json<Vec<Genre>>> {
    Ok(Json(state.genres.find_all().await?))
}

async fn find_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Genre>> {
    Ok(Json(state.genres.find_by_id(id).await?))
}

async fn create(State(state): State<AppState>, Json(genre): Json<Genre>) -> Result<Json<Genre>> {
    Ok(Json(state.genres.create(genre).await?))
}

async fn update(State(state): State<AppState>, Json(genre): Json<Genre>) -> Result<Json<Genre>> {
    Ok(Json(state.genres.update(genre).await?))
}

async fn delete_genre(State(state): State<AppState>, Path(id): Path<i64>) -> Result<()> {
    state.genres.delete(id).await
}
