//! SQLite storage backend
//!
//! All relational access goes through this module. Films and users
//! are read through LEFT JOIN queries that flatten their child
//! relations (likes, genre tags, rating, friendships) into one row
//! per combination; the aggregator in [`super::aggregate`] folds the
//! rows back into nested entities. Multi-statement writes (a film row
//! plus its genre tags, the two directions of a friendship) run in a
//! single transaction.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, SqlitePool};

use super::aggregate::{FilmRow, UserRow, collect_films, collect_users};
use super::models::{Film, Genre, MpaRating, User};
use super::store::{FilmStore, Store, UserStore};
use crate::error::{AppError, Result};

/// Database connection pool wrapper.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the SQLite database file.
    ///
    /// Creates the file if it doesn't exist and runs pending
    /// migrations. Foreign keys are enabled on every connection;
    /// relation-row cleanup on delete depends on them.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// A write that affected zero rows when one was expected signals a
/// storage-layer inconsistency, not a caller error.
fn no_rows(context: &str, id: i64) -> AppError {
    AppError::Internal(anyhow::anyhow!("{context} affected no rows for id {id}"))
}

fn vanished(context: &str, id: i64) -> AppError {
    AppError::Internal(anyhow::anyhow!("{context}: entity {id} vanished mid-write"))
}

// =============================================================================
// Films
// =============================================================================

const FILM_SELECT: &str = "\
SELECT f.id,
       f.name,
       f.description,
       f.release_date,
       f.duration_minutes,
       r.id AS rating_id,
       r.name AS rating_name,
       r.description AS rating_description,
       l.user_id AS liked_user_id,
       g.id AS genre_id,
       g.name AS genre_name
FROM films AS f
LEFT JOIN likes AS l ON f.id = l.film_id
LEFT JOIN genre_film AS gf ON f.id = gf.film_id
LEFT JOIN genres AS g ON g.id = gf.genre_id
LEFT JOIN ratings AS r ON r.id = f.rating_id";

const FILM_POPULAR_SELECT: &str = "\
SELECT sub.id,
       sub.name,
       sub.description,
       sub.release_date,
       sub.duration_minutes,
       r.id AS rating_id,
       r.name AS rating_name,
       r.description AS rating_description,
       l.user_id AS liked_user_id,
       g.id AS genre_id,
       g.name AS genre_name
FROM (SELECT f.id,
             f.name,
             f.description,
             f.release_date,
             f.duration_minutes,
             f.rating_id,
             COUNT(l.user_id) AS liked_users_count
      FROM films AS f
      LEFT JOIN likes AS l ON f.id = l.film_id
      GROUP BY f.id
      ORDER BY liked_users_count DESC, f.id
      LIMIT ?) AS sub
LEFT JOIN likes AS l ON sub.id = l.film_id
LEFT JOIN genre_film AS gf ON sub.id = gf.film_id
LEFT JOIN genres AS g ON g.id = gf.genre_id
LEFT JOIN ratings AS r ON r.id = sub.rating_id
ORDER BY sub.id, gf.rowid";

/// Relational film collection.
#[derive(Clone)]
pub struct DbFilmStore {
    pool: SqlitePool,
}

impl DbFilmStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_films(&self, sql: String) -> Result<Vec<Film>> {
        let rows: Vec<FilmRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(collect_films(rows))
    }
}

#[async_trait]
impl Store<Film> for DbFilmStore {
    async fn find_all(&self) -> Result<Vec<Film>> {
        // gf.rowid reflects tag insertion order; the aggregator keeps
        // the first-seen order it sees here.
        self.fetch_films(format!("{FILM_SELECT} ORDER BY f.id, gf.rowid"))
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Film>> {
        let rows: Vec<FilmRow> =
            sqlx::query_as(&format!("{FILM_SELECT} WHERE f.id = ? ORDER BY gf.rowid"))
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(collect_films(rows).into_iter().next())
    }

    async fn create(&self, film: Film) -> Result<Film> {
        let mut tx = self.pool.begin().await?;

        let film_id = sqlx::query(
            "INSERT INTO films (name, description, release_date, duration_minutes, rating_id) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.duration)
        .bind(film.mpa.as_ref().map(|mpa| mpa.id))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for genre in &film.genres {
            sqlx::query("INSERT INTO genre_film (film_id, genre_id) VALUES (?, ?)")
                .bind(film_id)
                .bind(genre.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.find_by_id(film_id)
            .await?
            .ok_or_else(|| vanished("create film", film_id))
    }

    async fn update(&self, film: Film) -> Result<Film> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE films SET name = ?, description = ?, release_date = ?, \
             duration_minutes = ?, rating_id = ? WHERE id = ?",
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.duration)
        .bind(film.mpa.as_ref().map(|mpa| mpa.id))
        .bind(film.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(no_rows("update film", film.id));
        }

        // Genre tags are replaced wholesale with the updated set.
        sqlx::query("DELETE FROM genre_film WHERE film_id = ?")
            .bind(film.id)
            .execute(&mut *tx)
            .await?;
        for genre in &film.genres {
            sqlx::query("INSERT INTO genre_film (film_id, genre_id) VALUES (?, ?)")
                .bind(film.id)
                .bind(genre.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.find_by_id(film.id)
            .await?
            .ok_or_else(|| vanished("update film", film.id))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM films WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(no_rows("delete film", id));
        }
        Ok(())
    }

    async fn find_equal(&self, probe: &Film) -> Result<Option<Film>> {
        let rows: Vec<FilmRow> = sqlx::query_as(&format!(
            "{FILM_SELECT} WHERE f.name = ? AND f.release_date = ? ORDER BY f.id, gf.rowid"
        ))
                .bind(&probe.name)
                .bind(probe.release_date)
                .fetch_all(&self.pool)
                .await?;
        Ok(collect_films(rows).into_iter().next())
    }
}

#[async_trait]
impl FilmStore for DbFilmStore {
    async fn find_popular(&self, count: usize) -> Result<Vec<Film>> {
        let rows: Vec<FilmRow> = sqlx::query_as(FILM_POPULAR_SELECT)
            .bind(count as i64)
            .fetch_all(&self.pool)
            .await?;
        // The outer join does not promise to keep the subquery's
        // ordering, so rank again after reconstruction. The stable
        // sort keeps the subquery's id tie-break deterministic.
        let mut films = collect_films(rows);
        films.sort_by(|a, b| b.likes_count().cmp(&a.likes_count()));
        Ok(films)
    }

    async fn add_like(&self, film_id: i64, user_id: i64) -> Result<Film> {
        sqlx::query("INSERT INTO likes (film_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(film_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        self.find_by_id(film_id)
            .await?
            .ok_or_else(|| vanished("add like", film_id))
    }

    async fn delete_like(&self, film_id: i64, user_id: i64) -> Result<Film> {
        sqlx::query("DELETE FROM likes WHERE film_id = ? AND user_id = ?")
            .bind(film_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        self.find_by_id(film_id)
            .await?
            .ok_or_else(|| vanished("delete like", film_id))
    }
}

// =============================================================================
// Users
// =============================================================================

const USER_SELECT: &str = "\
SELECT u.id,
       u.name,
       u.email,
       u.login,
       u.birthday,
       f.candidate_id AS friend_id
FROM users AS u
LEFT JOIN friends AS f ON u.id = f.offered_by";

/// Relational user collection.
#[derive(Clone)]
pub struct DbUserStore {
    pool: SqlitePool,
}

impl DbUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store<User> for DbUserStore {
    async fn find_all(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("{USER_SELECT} ORDER BY u.id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(collect_users(rows))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("{USER_SELECT} WHERE u.id = ?"))
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(collect_users(rows).into_iter().next())
    }

    async fn create(&self, user: User) -> Result<User> {
        let id = sqlx::query("INSERT INTO users (name, email, login, birthday) VALUES (?, ?, ?, ?)")
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.login)
            .bind(user.birthday)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        self.find_by_id(id)
            .await?
            .ok_or_else(|| vanished("create user", id))
    }

    async fn update(&self, user: User) -> Result<User> {
        let updated =
            sqlx::query("UPDATE users SET name = ?, email = ?, login = ?, birthday = ? WHERE id = ?")
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.login)
                .bind(user.birthday)
                .bind(user.id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        if updated == 0 {
            return Err(no_rows("update user", user.id));
        }
        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| vanished("update user", user.id))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(no_rows("delete user", id));
        }
        Ok(())
    }

    async fn find_equal(&self, probe: &User) -> Result<Option<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("{USER_SELECT} WHERE u.email = ?"))
            .bind(&probe.email)
            .fetch_all(&self.pool)
            .await?;
        Ok(collect_users(rows).into_iter().next())
    }
}

#[async_trait]
impl UserStore for DbUserStore {
    async fn find_by_ids(&self, ids: &HashSet<i64>) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::new(USER_SELECT);
        builder.push(" WHERE u.id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY u.id");

        let rows: Vec<UserRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(collect_users(rows))
    }

    async fn add_friend(&self, user_id: i64, friend_id: i64) -> Result<User> {
        let offered_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        // One directional membership row per side.
        sqlx::query("INSERT INTO friends (offered_by, candidate_id, offered_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(friend_id)
            .bind(offered_at)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO friends (offered_by, candidate_id, offered_at) VALUES (?, ?, ?)")
            .bind(friend_id)
            .bind(user_id)
            .bind(offered_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| vanished("add friend", user_id))
    }

    async fn delete_friend(&self, user_id: i64, friend_id: i64) -> Result<User> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM friends WHERE (offered_by = ? AND candidate_id = ?) \
             OR (offered_by = ? AND candidate_id = ?)",
        )
        .bind(user_id)
        .bind(friend_id)
        .bind(friend_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| vanished("delete friend", user_id))
    }
}

// =============================================================================
// Genres
// =============================================================================

/// Relational genre collection.
#[derive(Clone)]
pub struct DbGenreStore {
    pool: SqlitePool,
}

impl DbGenreStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store<Genre> for DbGenreStore {
    async fn find_all(&self) -> Result<Vec<Genre>> {
        Ok(sqlx::query_as("SELECT id, name FROM genres ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Genre>> {
        Ok(sqlx::query_as("SELECT id, name FROM genres WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, mut genre: Genre) -> Result<Genre> {
        let id = sqlx::query("INSERT INTO genres (name) VALUES (?)")
            .bind(&genre.name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        genre.id = id;
        Ok(genre)
    }

    async fn update(&self, genre: Genre) -> Result<Genre> {
        let updated = sqlx::query("UPDATE genres SET name = ? WHERE id = ?")
            .bind(&genre.name)
            .bind(genre.id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(no_rows("update genre", genre.id));
        }
        Ok(genre)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM genres WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(no_rows("delete genre", id));
        }
        Ok(())
    }

    async fn find_equal(&self, probe: &Genre) -> Result<Option<Genre>> {
        Ok(sqlx::query_as("SELECT id, name FROM genres WHERE name = ?")
            .bind(&probe.name)
            .fetch_optional(&self.pool)
            .await?)
    }
}

// =============================================================================
// MPA ratings
// =============================================================================

/// Relational rating collection.
#[derive(Clone)]
pub struct DbRatingStore {
    pool: SqlitePool,
}

impl DbRatingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store<MpaRating> for DbRatingStore {
    async fn find_all(&self) -> Result<Vec<MpaRating>> {
        Ok(
            sqlx::query_as("SELECT id, name, description FROM ratings ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MpaRating>> {
        Ok(
            sqlx::query_as("SELECT id, name, description FROM ratings WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create(&self, mut rating: MpaRating) -> Result<MpaRating> {
        let id = sqlx::query("INSERT INTO ratings (name, description) VALUES (?, ?)")
            .bind(&rating.name)
            .bind(&rating.description)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        rating.id = id;
        Ok(rating)
    }

    async fn update(&self, rating: MpaRating) -> Result<MpaRating> {
        let updated = sqlx::query("UPDATE ratings SET name = ?, description = ? WHERE id = ?")
            .bind(&rating.name)
            .bind(&rating.description)
            .bind(rating.id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(no_rows("update rating", rating.id));
        }
        Ok(rating)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM ratings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(no_rows("delete rating", id));
        }
        Ok(())
    }

    async fn find_equal(&self, probe: &MpaRating) -> Result<Option<MpaRating>> {
        Ok(
            sqlx::query_as("SELECT id, name, description FROM ratings WHERE name = ?")
                .bind(&probe.name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
