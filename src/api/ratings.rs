//! MPA rating catalog endpoints

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;

use crate::AppState;
use crate::data::MpaRating;
use crate::error::Result;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(find_all).post(create).put(update))
        .route("/:id", get(find_by_id).delete(delete_rating))
}

async fn find_all(State(state): State<AppState>) -> Result<Json<Vec<MpaRating>>> {
    Ok(Json(state.ratings.find_all().await?))
}

async fn find_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MpaRating>> {
    Ok(Json(state.ratings.find_by_id(id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(rating): Json<MpaRating>,
) -> Result<Json<MpaRating>> {
    Ok(Json(state.ratings.create(rating).await?))
}

async fn update(
    State(state): State<AppState>,
    Json(rating): Json<MpaRating>,
) -> Result<Json<MpaRating>> {
    Ok(Json(state.ratings.update(rating).await?))
}

async fn delete_rating(State(state): State<AppState>, Path(id): Path<i64>) -> Result<()> {
    state.ratings.delete(id).await
}
