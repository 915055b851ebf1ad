//! Persistence port
//!
//! Object-safe storage contracts with two interchangeable
//! implementations: an in-memory backend (`memory`) and a relational
//! SQLite backend (`database`). The service layer is written against
//! these traits only.

use std::collections::HashSet;

use async_trait::async_trait;

use super::models::{Entity, Film, User};
use crate::error::Result;

/// Generic CRUD contract shared by every entity collection.
#[async_trait]
pub trait Store<T: Entity>: Send + Sync {
    async fn find_all(&self) -> Result<Vec<T>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<T>>;

    /// Persist a new entity. The store assigns the id and returns the
    /// populated entity.
    async fn create(&self, obj: T) -> Result<T>;

    /// Replace the addressable fields of an existing entity.
    async fn update(&self, obj: T) -> Result<T>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Identity-based lookup: at most one entity whose
    /// identity-defining fields match the probe.
    async fn find_equal(&self, probe: &T) -> Result<Option<T>>;
}

/// Film-specific extension of the generic store.
#[async_trait]
pub trait FilmStore: Store<Film> {
    /// Up to `count` films with the highest like counts, descending.
    /// Tie order is implementation-defined but deterministic for
    /// unchanged data.
    async fn find_popular(&self, count: usize) -> Result<Vec<Film>>;

    async fn add_like(&self, film_id: i64, user_id: i64) -> Result<Film>;

    async fn delete_like(&self, film_id: i64, user_id: i64) -> Result<Film>;
}

/// User-specific extension of the generic store.
#[async_trait]
pub trait UserStore: Store<User> {
    /// Resolve a set of ids in one bulk lookup.
    async fn find_by_ids(&self, ids: &HashSet<i64>) -> Result<Vec<User>>;

    /// Record the friendship on both sides in one logical operation.
    async fn add_friend(&self, user_id: i64, friend_id: i64) -> Result<User>;

    /// Remove both sides of the friendship. Removing a membership
    /// that does not exist is a no-op at this level.
    async fn delete_friend(&self, user_id: i64, friend_id: i64) -> Result<User>;
}
