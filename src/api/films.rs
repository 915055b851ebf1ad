//! Film endpoints

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::AppState;
use crate::data::{Film, FilmPatch, NewFilm};
use crate::error::Result;

/// Parameters for the popularity query
#[derive(Debug, Deserialize)]
pub struct PopularParams {
    pub count: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(find_all).post(create).put(update))
        .route("/popular", get(find_popular))
        .route("/:id", get(find_by_id).delete(delete_film))
        .route("/:id/like/:user_id", axum::routing::put(add_like).delete(delete_like))
}

async fn find_all(State(state): State<AppState>) -> Result<Json<Vec<Film>>> {
    Ok(Json(state.films.find_all().await?))
}

async fn find_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Film>> {
    Ok(Json(state.films.find_by_id(id).await?))
}

async fn find_popular(
    State(state): State<AppState>,
    Query(params): Query<PopularParams>,
) -> Result<Json<Vec<Film>>> {
    Ok(Json(state.films.find_popular(params.count).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(new_film): Json<NewFilm>,
) -> Result<Json<Film>> {
    Ok(Json(state.films.create(new_film).await?))
}

async fn update(
    State(state): State<AppState>,
    Json(patch): Json<FilmPatch>,
) -> Result<Json<Film>> {
    Ok(Json(state.films.update(patch).await?))
}

async fn delete_film(State(state): State<AppState>, Path(id): Path<i64>) -> Result<()> {
    state.films.delete(id).await
}

async fn add_like(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<Json<Film>> {
    Ok(Json(state.films.add_like(id, user_id).await?))
}

async fn delete_like(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<Json<Film>> {
    Ok(Json(state.films.delete_like(id, user_id).await?))
}
