//! Data layer module
//!
//! Entity models, the persistence port, and its two backends:
//! - in-memory maps behind coarse mutexes
//! - SQLite via sqlx, with join-row aggregation

pub mod aggregate;
mod database;
mod memory;
mod models;
mod store;

pub use database::{Database, DbFilmStore, DbGenreStore, DbRatingStore, DbUserStore};
pub use memory::{MemoryFilmStore, MemoryGenreStore, MemoryRatingStore, MemoryStore, MemoryUserStore};
pub use models::*;
pub use store::{FilmStore, Store, UserStore};
