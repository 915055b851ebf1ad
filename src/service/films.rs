//! Film service
//!
//! Orchestrates the film catalog: referential checks against genres
//! and ratings, the (name, release date) duplicate guard, popularity
//! ranking, and like memberships.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::data::{
    Film, FilmPatch, FilmStore, Genre, GenreRef, MpaRating, NewFilm, RatingRef, Store, UserStore,
};
use crate::error::{AppError, Result};

const DEFAULT_POPULAR_COUNT: usize = 10;

/// Film service
pub struct FilmService {
    films: Arc<dyn FilmStore>,
    users: Arc<dyn UserStore>,
    genres: Arc<dyn Store<Genre>>,
    ratings: Arc<dyn Store<MpaRating>>,
}

impl FilmService {
    pub fn new(
        films: Arc<dyn FilmStore>,
        users: Arc<dyn UserStore>,
        genres: Arc<dyn Store<Genre>>,
        ratings: Arc<dyn Store<MpaRating>>,
    ) -> Self {
        Self {
            films,
            users,
            genres,
            ratings,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn find_all(&self) -> Result<Vec<Film>> {
        self.films.find_all().await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Film> {
        self.films
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("film with id {id} not found")))
    }

    /// Top films by like count, default 10. A count of zero is a
    /// valid request for an empty result.
    pub async fn find_popular(&self, count: Option<usize>) -> Result<Vec<Film>> {
        let count = count.unwrap_or(DEFAULT_POPULAR_COUNT);
        if count == 0 {
            return Ok(Vec::new());
        }
        self.films.find_popular(count).await
    }

    pub async fn create(&self, new_film: NewFilm) -> Result<Film> {
        tracing::debug!(name = %new_film.name, "create film");

        let genres = self.resolve_genres(new_film.genres.as_deref()).await?;
        let mpa = self.resolve_rating(new_film.mpa).await?;

        let mut film = Film {
            id: 0,
            name: new_film.name,
            description: new_film.description,
            release_date: new_film.release_date,
            duration: new_film.duration,
            likes: HashSet::new(),
            genres: Vec::new(),
            mpa,
        };
        for genre in genres.unwrap_or_default() {
            film.push_genre(genre);
        }

        film.validate(Self::today())?;

        if self.films.find_equal(&film).await?.is_some() {
            return Err(AppError::Duplicate(
                "film with the same name and release date already exists".into(),
            ));
        }

        self.films.create(film).await
    }

    /// Apply a partial update. Omitted fields keep their stored
    /// values; likes are never replaced through this path.
    pub async fn update(&self, patch: FilmPatch) -> Result<Film> {
        tracing::debug!(id = patch.id, "update film");

        let original = self.find_by_id(patch.id).await?;

        let genres = self.resolve_genres(patch.genres.as_deref()).await?;
        let mpa = match patch.mpa {
            Some(reference) => self.resolve_rating(Some(reference)).await?,
            None => original.mpa.clone(),
        };

        let mut merged = Film {
            id: original.id,
            name: patch.name.unwrap_or(original.name),
            description: patch.description.unwrap_or(original.description),
            release_date: patch.release_date.unwrap_or(original.release_date),
            duration: patch.duration.unwrap_or(original.duration),
            likes: original.likes,
            genres: Vec::new(),
            mpa,
        };
        match genres {
            Some(resolved) => {
                for genre in resolved {
                    merged.push_genre(genre);
                }
            }
            None => merged.genres = original.genres,
        }

        merged.validate(Self::today())?;

        // Post-merge duplicate guard: a patch that leaves the
        // identity fields unchanged must not collide with itself.
        if let Some(existing) = self.films.find_equal(&merged).await? {
            if existing.id != merged.id {
                return Err(AppError::Duplicate(
                    "film with the same name and release date already exists".into(),
                ));
            }
        }

        self.films.update(merged).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        tracing::debug!(id, "delete film");
        self.find_by_id(id).await?;
        self.films.delete(id).await
    }

    pub async fn add_like(&self, film_id: i64, user_id: i64) -> Result<Film> {
        tracing::debug!(film_id, user_id, "add like");

        let film = self.find_by_id(film_id).await?;
        self.require_user(user_id).await?;

        if film.likes.contains(&user_id) {
            return Err(AppError::Duplicate(format!(
                "like from user {user_id} was already added"
            )));
        }
        self.films.add_like(film_id, user_id).await
    }

    pub async fn delete_like(&self, film_id: i64, user_id: i64) -> Result<Film> {
        tracing::debug!(film_id, user_id, "delete like");

        let film = self.find_by_id(film_id).await?;
        self.require_user(user_id).await?;

        if !film.likes.contains(&user_id) {
            return Err(AppError::NotFound(format!(
                "like from user {user_id} not found"
            )));
        }
        self.films.delete_like(film_id, user_id).await
    }

    /// Resolve genre references to full entities, failing the write
    /// when a referenced genre does not exist. This is a validation
    /// failure, not a NotFound: the primary entity is fine, the
    /// reference is not.
    async fn resolve_genres(&self, refs: Option<&[GenreRef]>) -> Result<Option<Vec<Genre>>> {
        let Some(refs) = refs else {
            return Ok(None);
        };

        let mut resolved = Vec::with_capacity(refs.len());
        for reference in refs {
            let genre = self.genres.find_by_id(reference.id).await?.ok_or_else(|| {
                AppError::Validation(format!("film genre with id {} not found", reference.id))
            })?;
            resolved.push(genre);
        }
        Ok(Some(resolved))
    }

    async fn resolve_rating(&self, reference: Option<RatingRef>) -> Result<Option<MpaRating>> {
        let Some(reference) = reference else {
            return Ok(None);
        };

        let rating = self.ratings.find_by_id(reference.id).await?.ok_or_else(|| {
            AppError::Validation(format!("film rating with id {} not found", reference.id))
        })?;
        Ok(Some(rating))
    }

    async fn require_user(&self, user_id: i64) -> Result<()> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("user with id {user_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryFilmStore, MemoryGenreStore, MemoryRatingStore, MemoryUserStore, User};

    struct Fixture {
        films: FilmService,
        users: Arc<MemoryUserStore>,
    }

    async fn fixture() -> Fixture {
        let film_store = Arc::new(MemoryFilmStore::new());
        let user_store = Arc::new(MemoryUserStore::new(film_store.clone()));
        let genre_store = Arc::new(MemoryGenreStore::new(film_store.clone()));
        let rating_store = Arc::new(MemoryRatingStore::new(film_store.clone()));

        for name in ["Comedy", "Drama"] {
            genre_store
                .create(Genre {
                    id: 0,
                    name: name.to_string(),
                })
                .await
                .unwrap();
        }
        rating_store
            .create(MpaRating {
                id: 0,
                name: "G".to_string(),
                description: "No age restrictions".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            films: FilmService::new(film_store, user_store.clone(), genre_store, rating_store),
            users: user_store,
        }
    }

    fn new_film(name: &str, year: i32) -> NewFilm {
        NewFilm {
            name: name.to_string(),
            description: "a film".to_string(),
            release_date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
            duration: 100,
            genres: None,
            mpa: None,
        }
    }

    async fn seed_user(users: &MemoryUserStore, email: &str) -> User {
        let user = User {
            id: 0,
            email: email.to_string(),
            login: email.split('@').next().unwrap().to_string(),
            name: "user".to_string(),
            birthday: None,
            friends: HashSet::new(),
        };
        users.create(user).await.unwrap()
    }

    #[tokio::test]
    async fn create_defaults_to_empty_likes_and_genres() {
        let fx = fixture().await;
        let film = fx.films.create(new_film("Amelie", 2001)).await.unwrap();
        assert!(film.id > 0);
        assert!(film.likes.is_empty());
        assert!(film.genres.is_empty());
        assert!(film.mpa.is_none());
    }

    #[tokio::test]
    async fn create_resolves_and_deduplicates_genre_refs() {
        let fx = fixture().await;
        let mut input = new_film("Amelie", 2001);
        input.genres = Some(vec![GenreRef { id: 2 }, GenreRef { id: 1 }, GenreRef { id: 2 }]);
        input.mpa = Some(RatingRef { id: 1 });

        let film = fx.films.create(input).await.unwrap();
        assert_eq!(
            film.genres.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            vec!["Drama", "Comedy"]
        );
        assert_eq!(film.mpa.unwrap().name, "G");
    }

    #[tokio::test]
    async fn create_rejects_unknown_genre_or_rating() {
        let fx = fixture().await;

        let mut bad_genre = new_film("Amelie", 2001);
        bad_genre.genres = Some(vec![GenreRef { id: 99 }]);
        assert!(matches!(
            fx.films.create(bad_genre).await,
            Err(AppError::Validation(_))
        ));

        let mut bad_rating = new_film("Amelie", 2001);
        bad_rating.mpa = Some(RatingRef { id: 99 });
        assert!(matches!(
            fx.films.create(bad_rating).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_film_is_same_name_and_release_date() {
        let fx = fixture().await;
        fx.films.create(new_film("Solaris", 1972)).await.unwrap();

        // Same identity, different duration: still a duplicate.
        let mut twin = new_film("Solaris", 1972);
        twin.duration = 166;
        assert!(matches!(
            fx.films.create(twin).await,
            Err(AppError::Duplicate(_))
        ));

        // Same name, different release date: a different film.
        assert!(fx.films.create(new_film("Solaris", 2002)).await.is_ok());
    }

    #[tokio::test]
    async fn partial_update_preserves_omitted_fields_and_likes() {
        let fx = fixture().await;
        let mut input = new_film("Brazil", 1985);
        input.genres = Some(vec![GenreRef { id: 1 }]);
        let film = fx.films.create(input).await.unwrap();

        let user = seed_user(&fx.users, "fan@example.com").await;
        fx.films.add_like(film.id, user.id).await.unwrap();

        let updated = fx
            .films
            .update(FilmPatch {
                id: film.id,
                name: None,
                description: Some("dystopia".to_string()),
                release_date: None,
                duration: None,
                genres: None,
                mpa: None,
            })
            .await
            .unwrap();

        assert_eq!(updated.name, "Brazil");
        assert_eq!(updated.description, "dystopia");
        assert_eq!(updated.genres.len(), 1);
        assert!(updated.likes.contains(&user.id));
    }

    #[tokio::test]
    async fn update_does_not_collide_with_itself() {
        let fx = fixture().await;
        let film = fx.films.create(new_film("Solaris", 1972)).await.unwrap();

        // Identity fields untouched: the only match is the film itself.
        let patched = fx
            .films
            .update(FilmPatch {
                id: film.id,
                name: None,
                description: None,
                release_date: None,
                duration: Some(166),
                genres: None,
                mpa: None,
            })
            .await
            .unwrap();
        assert_eq!(patched.duration, 166);

        // Renaming onto another film's identity is a conflict.
        fx.films.create(new_film("Stalker", 1979)).await.unwrap();
        let collision = fx
            .films
            .update(FilmPatch {
                id: film.id,
                name: Some("Stalker".to_string()),
                description: None,
                release_date: Some(NaiveDate::from_ymd_opt(1979, 6, 1).unwrap()),
                duration: None,
                genres: None,
                mpa: None,
            })
            .await;
        assert!(matches!(collision, Err(AppError::Duplicate(_))));
    }

    #[tokio::test]
    async fn like_lifecycle_enforces_memberships() {
        let fx = fixture().await;
        let film = fx.films.create(new_film("Heat", 1995)).await.unwrap();
        let user = seed_user(&fx.users, "fan@example.com").await;

        assert!(matches!(
            fx.films.add_like(film.id, 999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.films.add_like(999, user.id).await,
            Err(AppError::NotFound(_))
        ));

        let liked = fx.films.add_like(film.id, user.id).await.unwrap();
        assert!(liked.likes.contains(&user.id));

        assert!(matches!(
            fx.films.add_like(film.id, user.id).await,
            Err(AppError::Duplicate(_))
        ));

        let unliked = fx.films.delete_like(film.id, user.id).await.unwrap();
        assert!(unliked.likes.is_empty());

        assert!(matches!(
            fx.films.delete_like(film.id, user.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn popular_ranks_by_like_count() {
        let fx = fixture().await;

        let mut user_ids = Vec::new();
        for i in 0..5 {
            user_ids.push(seed_user(&fx.users, &format!("u{i}@example.com")).await.id);
        }

        for (name, likes) in [("a", 5usize), ("b", 5), ("c", 2), ("d", 0)] {
            let film = fx.films.create(new_film(name, 1990)).await.unwrap();
            for user_id in &user_ids[..likes] {
                fx.films.add_like(film.id, *user_id).await.unwrap();
            }
        }

        let top = fx.films.find_popular(Some(3)).await.unwrap();
        assert_eq!(
            top.iter().map(Film::likes_count).collect::<Vec<_>>(),
            vec![5, 5, 2]
        );

        assert_eq!(fx.films.find_popular(Some(10)).await.unwrap().len(), 4);
        assert_eq!(fx.films.find_popular(None).await.unwrap().len(), 4);
        assert!(fx.films.find_popular(Some(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_requires_existing_film() {
        let fx = fixture().await;
        let film = fx.films.create(new_film("Heat", 1995)).await.unwrap();

        fx.films.delete(film.id).await.unwrap();
        assert!(matches!(
            fx.films.delete(film.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
