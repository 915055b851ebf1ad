//! In-memory storage backend
//!
//! Direct map mutation guarded by one coarse mutex per collection.
//! `BTreeMap` keeps enumeration in id order, which makes downstream
//! ordering (popularity ties in particular) deterministic across
//! repeated calls. Ids are assigned from a per-collection counter and
//! never reused.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::models::{Entity, Film, Genre, MpaRating, User};
use super::store::{FilmStore, Store, UserStore};
use crate::error::{AppError, Result};

struct Inner<T> {
    items: BTreeMap<i64, T>,
    next_id: i64,
}

/// Generic in-memory collection.
pub struct MemoryStore<T> {
    inner: Mutex<Inner<T>>,
}

pub type MemoryFilmStore = MemoryStore<Film>;

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // The maps hold plain values; a panic mid-mutation cannot
        // leave them structurally broken, so recover from poisoning.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> Store<T> for MemoryStore<T> {
    async fn find_all(&self) -> Result<Vec<T>> {
        Ok(self.lock().items.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<T>> {
        Ok(self.lock().items.get(&id).cloned())
    }

    async fn create(&self, mut obj: T) -> Result<T> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        obj.set_id(id);
        inner.items.insert(id, obj.clone());
        Ok(obj)
    }

    async fn update(&self, obj: T) -> Result<T> {
        let mut inner = self.lock();
        if !inner.items.contains_key(&obj.id()) {
            return Err(stale_write(obj.id()));
        }
        inner.items.insert(obj.id(), obj.clone());
        Ok(obj)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        if self.lock().items.remove(&id).is_none() {
            return Err(stale_write(id));
        }
        Ok(())
    }

    async fn find_equal(&self, probe: &T) -> Result<Option<T>> {
        Ok(self
            .lock()
            .items
            .values()
            .find(|item| item.same_identity(probe))
            .cloned())
    }
}

/// The service layer checks existence before mutating, so an absent
/// id at write time signals a storage-layer inconsistency.
fn stale_write(id: i64) -> AppError {
    AppError::Internal(anyhow::anyhow!("write affected no rows for id {id}"))
}

fn missing(id: i64) -> AppError {
    AppError::Internal(anyhow::anyhow!("entity {id} vanished during mutation"))
}

#[async_trait]
impl FilmStore for MemoryStore<Film> {
    async fn find_popular(&self, count: usize) -> Result<Vec<Film>> {
        let mut films: Vec<Film> = self.lock().items.values().cloned().collect();
        // Stable sort over id-ordered input keeps ties deterministic.
        films.sort_by(|a, b| b.likes_count().cmp(&a.likes_count()));
        films.truncate(count);
        Ok(films)
    }

    async fn add_like(&self, film_id: i64, user_id: i64) -> Result<Film> {
        let mut inner = self.lock();
        let film = inner.items.get_mut(&film_id).ok_or_else(|| missing(film_id))?;
        film.likes.insert(user_id);
        Ok(film.clone())
    }

    async fn delete_like(&self, film_id: i64, user_id: i64) -> Result<Film> {
        let mut inner = self.lock();
        let film = inner.items.get_mut(&film_id).ok_or_else(|| missing(film_id))?;
        film.likes.remove(&user_id);
        Ok(film.clone())
    }
}

impl MemoryStore<Film> {
    /// Drop every like left by a deleted user, mirroring the
    /// relational backend's foreign-key cascade.
    fn purge_likes_by(&self, user_id: i64) {
        for film in self.lock().items.values_mut() {
            film.likes.remove(&user_id);
        }
    }

    /// Drop a deleted genre from every film's tag set, mirroring the
    /// `genre_film` cascade.
    fn purge_genre(&self, genre_id: i64) {
        for film in self.lock().items.values_mut() {
            film.genres.retain(|g| g.id != genre_id);
        }
    }

    /// Detach a deleted rating from every film that carried it,
    /// mirroring the rating column's fall-back to NULL.
    fn clear_rating(&self, rating_id: i64) {
        for film in self.lock().items.values_mut() {
            if film.mpa.as_ref().is_some_and(|mpa| mpa.id == rating_id) {
                film.mpa = None;
            }
        }
    }
}

/// In-memory genre collection.
///
/// Holds a handle to the film collection so that deleting a genre
/// detaches its tags the same way the relational backend does.
pub struct MemoryGenreStore {
    genres: MemoryStore<Genre>,
    films: Arc<MemoryFilmStore>,
}

impl MemoryGenreStore {
    pub fn new(films: Arc<MemoryFilmStore>) -> Self {
        Self {
            genres: MemoryStore::new(),
            films,
        }
    }
}

#[async_trait]
impl Store<Genre> for MemoryGenreStore {
    async fn find_all(&self) -> Result<Vec<Genre>> {
        self.genres.find_all().await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Genre>> {
        self.genres.find_by_id(id).await
    }

    async fn create(&self, genre: Genre) -> Result<Genre> {
        self.genres.create(genre).await
    }

    async fn update(&self, genre: Genre) -> Result<Genre> {
        self.genres.update(genre).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.genres.delete(id).await?;
        self.films.purge_genre(id);
        Ok(())
    }

    async fn find_equal(&self, probe: &Genre) -> Result<Option<Genre>> {
        self.genres.find_equal(probe).await
    }
}

/// In-memory rating collection; deleting a rating detaches it from
/// films that carried it.
pub struct MemoryRatingStore {
    ratings: MemoryStore<MpaRating>,
    films: Arc<MemoryFilmStore>,
}

impl MemoryRatingStore {
    pub fn new(films: Arc<MemoryFilmStore>) -> Self {
        Self {
            ratings: MemoryStore::new(),
            films,
        }
    }
}

#[async_trait]
impl Store<MpaRating> for MemoryRatingStore {
    async fn find_all(&self) -> Result<Vec<MpaRating>> {
        self.ratings.find_all().await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MpaRating>> {
        self.ratings.find_by_id(id).await
    }

    async fn create(&self, rating: MpaRating) -> Result<MpaRating> {
        self.ratings.create(rating).await
    }

    async fn update(&self, rating: MpaRating) -> Result<MpaRating> {
        self.ratings.update(rating).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.ratings.delete(id).await?;
        self.films.clear_rating(id);
        Ok(())
    }

    async fn find_equal(&self, probe: &MpaRating) -> Result<Option<MpaRating>> {
        self.ratings.find_equal(probe).await
    }
}

/// In-memory user collection.
///
/// Holds a handle to the film collection so that deleting a user
/// cascades into like memberships the same way the relational
/// backend does.
pub struct MemoryUserStore {
    users: MemoryStore<User>,
    films: Arc<MemoryFilmStore>,
}

impl MemoryUserStore {
    pub fn new(films: Arc<MemoryFilmStore>) -> Self {
        Self {
            users: MemoryStore::new(),
            films,
        }
    }
}

#[async_trait]
impl Store<User> for MemoryUserStore {
    async fn find_all(&self) -> Result<Vec<User>> {
        self.users.find_all().await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.users.find_by_id(id).await
    }

    async fn create(&self, user: User) -> Result<User> {
        self.users.create(user).await
    }

    async fn update(&self, user: User) -> Result<User> {
        self.users.update(user).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        {
            let mut inner = self.users.lock();
            if inner.items.remove(&id).is_none() {
                return Err(stale_write(id));
            }
            // Friendship memberships are stored on both sides.
            for user in inner.items.values_mut() {
                user.friends.remove(&id);
            }
        }
        self.films.purge_likes_by(id);
        Ok(())
    }

    async fn find_equal(&self, probe: &User) -> Result<Option<User>> {
        self.users.find_equal(probe).await
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_ids(&self, ids: &HashSet<i64>) -> Result<Vec<User>> {
        let inner = self.users.lock();
        Ok(inner
            .items
            .values()
            .filter(|user| ids.contains(&user.id))
            .cloned()
            .collect())
    }

    async fn add_friend(&self, user_id: i64, friend_id: i64) -> Result<User> {
        let mut inner = self.users.lock();
        if !inner.items.contains_key(&friend_id) {
            return Err(missing(friend_id));
        }
        let user = inner
            .items
            .get_mut(&user_id)
            .ok_or_else(|| missing(user_id))?;
        user.friends.insert(friend_id);
        let updated = user.clone();
        if let Some(friend) = inner.items.get_mut(&friend_id) {
            friend.friends.insert(user_id);
        }
        Ok(updated)
    }

    async fn delete_friend(&self, user_id: i64, friend_id: i64) -> Result<User> {
        let mut inner = self.users.lock();
        let user = inner
            .items
            .get_mut(&user_id)
            .ok_or_else(|| missing(user_id))?;
        user.friends.remove(&friend_id);
        let updated = user.clone();
        if let Some(friend) = inner.items.get_mut(&friend_id) {
            friend.friends.remove(&user_id);
        }
        Ok(updated)
    }
}
