//! Filmgraph - a film catalog with a social layer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                       │
//! │  - /films, /users, /genres, /mpa resources                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                           │
//! │  - Validation, duplicate guards, like/friend rules          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                             │
//! │  - SQLite (sqlx) with join-row aggregation                  │
//! │  - In-memory backend for tests and ephemeral runs           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for the film and user resources
//! - `service`: Business logic layer
//! - `data`: Entity models, the persistence port, and both backends
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod service;

use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::data::{
    Database, DbFilmStore, DbGenreStore, DbRatingStore, DbUserStore, FilmStore, Genre,
    MemoryFilmStore, MemoryGenreStore, MemoryRatingStore, MemoryUserStore, MpaRating, Store,
    UserStore,
};
use crate::error::AppError;
use crate::service::{CatalogService, FilmService, UserService};

/// Application state shared across all handlers
///
/// Cloned per request; every service holds `Arc`s to the selected
/// storage backend, so clones are cheap.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Film operations, including likes and the popularity ranking
    pub films: Arc<FilmService>,

    /// User operations, including the friendship graph
    pub users: Arc<UserService>,

    /// Genre catalog
    pub genres: Arc<CatalogService<Genre>>,

    /// MPA rating catalog
    pub ratings: Arc<CatalogService<MpaRating>>,
}

impl AppState {
    /// Initialize application state
    ///
    /// Picks the storage backend from configuration: SQLite opens (and
    /// migrates) the database file, the in-memory backend starts empty
    /// and gets the stock catalog seeded into it.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated.
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        tracing::info!(backend = ?config.database.backend, "Initializing application state...");

        let (films, users, genres, ratings) = match config.database.backend {
            StoreBackend::Sqlite => {
                let db = Database::connect(&config.database.path).await?;
                tracing::info!(path = %config.database.path.display(), "Database connected");

                let films: Arc<dyn FilmStore> = Arc::new(DbFilmStore::new(db.pool().clone()));
                let users: Arc<dyn UserStore> = Arc::new(DbUserStore::new(db.pool().clone()));
                let genres: Arc<dyn Store<Genre>> = Arc::new(DbGenreStore::new(db.pool().clone()));
                let ratings: Arc<dyn Store<MpaRating>> =
                    Arc::new(DbRatingStore::new(db.pool().clone()));
                (films, users, genres, ratings)
            }
            StoreBackend::Memory => {
                let film_store = Arc::new(MemoryFilmStore::new());
                let genre_store = MemoryGenreStore::new(film_store.clone());
                let rating_store = MemoryRatingStore::new(film_store.clone());
                seed_catalog(&genre_store, &rating_store).await?;
                tracing::info!("In-memory stores seeded");

                let films: Arc<dyn FilmStore> = film_store.clone();
                let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new(film_store));
                let genres: Arc<dyn Store<Genre>> = Arc::new(genre_store);
                let ratings: Arc<dyn Store<MpaRating>> = Arc::new(rating_store);
                (films, users, genres, ratings)
            }
        };

        let film_service = FilmService::new(
            films,
            users.clone(),
            genres.clone(),
            ratings.clone(),
        );

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            films: Arc::new(film_service),
            users: Arc::new(UserService::new(users)),
            genres: Arc::new(CatalogService::new(genres)),
            ratings: Arc::new(CatalogService::new(ratings)),
        })
    }
}

/// Stock genres and MPA ratings, mirrored from the SQLite seed
/// migration so both backends expose the same catalog on a fresh
/// start.
async fn seed_catalog(
    genres: &MemoryGenreStore,
    ratings: &MemoryRatingStore,
) -> Result<(), AppError> {
    const GENRES: [&str; 6] = [
        "Comedy",
        "Drama",
        "Cartoon",
        "Thriller",
        "Documentary",
        "Action",
    ];
    const RATINGS: [(&str, &str); 5] = [
        ("G", "No age restrictions"),
        ("PG", "Parental guidance suggested"),
        ("PG-13", "Not recommended for children under 13"),
        ("R", "Under 17 requires accompanying adult"),
        ("NC-17", "No one 17 and under admitted"),
    ];

    for name in GENRES {
        genres
            .create(Genre {
                id: 0,
                name: name.to_string(),
            })
            .await?;
    }
    for (name, description) in RATINGS {
        ratings
            .create(MpaRating {
                id: 0,
                name: name.to_string(),
                description: description.to_string(),
            })
            .await?;
    }
    Ok(())
}

/// Build the application router with all routes configured
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/films", api::films::router())
        .nest("/users", api::users::router())
        .nest("/genres", api::genres::router())
        .nest("/mpa", api::ratings::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
