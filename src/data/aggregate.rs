//! Row aggregation
//!
//! Reconstructs nested entities from flattened join rows. The film
//! query joins films ⋈ likes ⋈ genre tags ⋈ ratings, so one film
//! appears once per like×genre combination; the user query joins
//! users ⋈ friendships. Folding the rows back must yield exactly one
//! entity per distinct parent id with deduplicated child sets.
//!
//! A parent with no children still produces one row whose child key
//! columns are NULL; a NULL (or absent) key column means "no child on
//! this row", never a missing row. Rows with a child column but no
//! parent columns violate the join contract and are not handled here.

use std::collections::HashMap;
use std::collections::HashSet;

use chrono::NaiveDate;

use super::models::{Film, Genre, MpaRating, User};

/// One flat row of the film join query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FilmRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration_minutes: i64,
    pub rating_id: Option<i64>,
    pub rating_name: Option<String>,
    pub rating_description: Option<String>,
    pub liked_user_id: Option<i64>,
    pub genre_id: Option<i64>,
    pub genre_name: Option<String>,
}

/// One flat row of the user join query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub login: String,
    pub birthday: Option<NaiveDate>,
    pub friend_id: Option<i64>,
}

/// Fold film join rows into films, one per distinct id.
///
/// Films keep the order in which their first row appeared, so the
/// output order is deterministic for a given row stream. Duplicate
/// child references (a lossy join may repeat a like across genre
/// rows) collapse into their sets.
pub fn collect_films(rows: Vec<FilmRow>) -> Vec<Film> {
    let mut films: Vec<Film> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.id).or_insert_with(|| {
            films.push(Film {
                id: row.id,
                name: row.name.clone(),
                description: row.description.clone(),
                release_date: row.release_date,
                duration: row.duration_minutes,
                likes: HashSet::new(),
                genres: Vec::new(),
                mpa: None,
            });
            films.len() - 1
        });
        let film = &mut films[slot];

        if let Some(user_id) = row.liked_user_id {
            film.likes.insert(user_id);
        }

        if film.mpa.is_none() {
            if let (Some(id), Some(name)) = (row.rating_id, row.rating_name) {
                film.mpa = Some(MpaRating {
                    id,
                    name,
                    description: row.rating_description.unwrap_or_default(),
                });
            }
        }

        if let (Some(id), Some(name)) = (row.genre_id, row.genre_name) {
            film.push_genre(Genre { id, name });
        }
    }

    films
}

/// Fold user join rows into users, one per distinct id, preserving
/// first-seen order.
pub fn collect_users(rows: Vec<UserRow>) -> Vec<User> {
    let mut users: Vec<User> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.id).or_insert_with(|| {
            users.push(User {
                id: row.id,
                name: row.name.clone(),
                email: row.email.clone(),
                login: row.login.clone(),
                birthday: row.birthday,
                friends: HashSet::new(),
            });
            users.len() - 1
        });

        if let Some(friend_id) = row.friend_id {
            users[slot].friends.insert(friend_id);
        }
    }

    users
}
