//! Data models
//!
//! Value types for the catalog (films, genres, age ratings) and the
//! social graph (users, friendships), plus their identity and field
//! validation rules. All models serialize in camelCase wire format.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Earliest admissible film release date (first public film screening).
pub const FIRST_RELEASE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1895, 12, 28) {
    Some(date) => date,
    None => unreachable!(),
};

/// Maximum length of film and rating descriptions.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Identity accessor capability shared by all stored entities.
///
/// Ids are positive integers assigned by the store, never by the
/// caller. `same_identity` compares the identity-defining fields
/// (independent of the assigned id) and drives duplicate detection.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// Whether `other` is the same logical record, ignoring ids.
    fn same_identity(&self, other: &Self) -> bool;
}

// =============================================================================
// Film
// =============================================================================

/// A catalog entry
///
/// `likes` is a set of user ids; `genres` preserves first-insertion
/// order and is deduplicated by genre id; at most one MPA rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    /// Running time in minutes
    pub duration: i64,
    pub likes: HashSet<i64>,
    pub genres: Vec<Genre>,
    pub mpa: Option<MpaRating>,
}

impl Film {
    pub fn likes_count(&self) -> usize {
        self.likes.len()
    }

    /// Append a genre, collapsing duplicates by id and preserving
    /// first-insertion order.
    pub fn push_genre(&mut self, genre: Genre) {
        if !self.genres.iter().any(|g| g.id == genre.id) {
            self.genres.push(genre);
        }
    }

    /// Check the field constraints before the record is stored.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("film name must not be empty".into()));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "film description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.release_date < FIRST_RELEASE_DATE {
            return Err(AppError::Validation(format!(
                "release date must not be before {FIRST_RELEASE_DATE}"
            )));
        }
        if self.release_date >= today {
            return Err(AppError::Validation(
                "release date must be in the past".into(),
            ));
        }
        if self.duration < 1 {
            return Err(AppError::Validation(
                "duration must be at least one minute".into(),
            ));
        }
        Ok(())
    }
}

impl Entity for Film {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name && self.release_date == other.release_date
    }
}

/// Typed input for film creation; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFilm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: i64,
    #[serde(default)]
    pub genres: Option<Vec<GenreRef>>,
    #[serde(default)]
    pub mpa: Option<RatingRef>,
}

/// Partial film update; an omitted field means "unchanged".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmPatch {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub genres: Option<Vec<GenreRef>>,
    #[serde(default)]
    pub mpa: Option<RatingRef>,
}

/// Reference to an existing genre by id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenreRef {
    pub id: i64,
}

/// Reference to an existing MPA rating by id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatingRef {
    pub id: i64,
}

// =============================================================================
// Genre
// =============================================================================

/// A genre tag; identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

impl Genre {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("genre name must not be empty".into()));
        }
        Ok(())
    }
}

impl Entity for Genre {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// =============================================================================
// MPA rating
// =============================================================================

/// An MPA age rating; identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MpaRating {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl MpaRating {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation(
                "rating name must not be empty".into(),
            ));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "rating description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        Ok(())
    }
}

impl Entity for MpaRating {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered user
///
/// `friends` holds one directional membership per friendship; the
/// service layer always materializes the relation on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: Option<NaiveDate>,
    pub friends: HashSet<i64>,
}

impl User {
    /// Check the field constraints before the record is stored.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if !is_valid_email(&self.email) {
            return Err(AppError::Validation(format!(
                "email is not well-formed: {}",
                self.email
            )));
        }
        if self.login.trim().is_empty() {
            return Err(AppError::Validation("login must not be blank".into()));
        }
        if self.login.chars().any(char::is_whitespace) {
            return Err(AppError::Validation(
                "login must not contain whitespace".into(),
            ));
        }
        if let Some(birthday) = self.birthday {
            if birthday >= today {
                return Err(AppError::Validation("birthday must be in the past".into()));
            }
        }
        Ok(())
    }
}

impl Entity for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn same_identity(&self, other: &Self) -> bool {
        self.email == other.email
    }
}

/// Typed input for user creation; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
}

/// Partial user update; an omitted field means "unchanged".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
}

/// Minimal syntactic email check: one `@`, a non-empty local part,
/// a dotted domain, no whitespace.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
        && !email[local.len() + 1..].contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn film() -> Film {
        Film {
            id: 0,
            name: "Alien".to_string(),
            description: "In space no one can hear you scream".to_string(),
            release_date: NaiveDate::from_ymd_opt(1979, 5, 25).unwrap(),
            duration: 117,
            likes: HashSet::new(),
            genres: Vec::new(),
            mpa: None,
        }
    }

    #[test]
    fn film_validation_covers_field_constraints() {
        assert!(film().validate(today()).is_ok());

        let mut blank_name = film();
        blank_name.name = "   ".to_string();
        assert!(matches!(
            blank_name.validate(today()),
            Err(AppError::Validation(_))
        ));

        let mut long_description = film();
        long_description.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(long_description.validate(today()).is_err());

        let mut too_early = film();
        too_early.release_date = NaiveDate::from_ymd_opt(1895, 12, 27).unwrap();
        assert!(too_early.validate(today()).is_err());

        let mut on_first_screening = film();
        on_first_screening.release_date = FIRST_RELEASE_DATE;
        assert!(on_first_screening.validate(today()).is_ok());

        let mut not_released = film();
        not_released.release_date = today();
        assert!(not_released.validate(today()).is_err());

        let mut zero_duration = film();
        zero_duration.duration = 0;
        assert!(zero_duration.validate(today()).is_err());
    }

    #[test]
    fn film_identity_is_name_and_release_date() {
        let a = film();
        let mut b = film();
        b.description = "different".to_string();
        b.duration = 90;
        assert!(a.same_identity(&b));

        b.release_date = NaiveDate::from_ymd_opt(1986, 7, 18).unwrap();
        assert!(!a.same_identity(&b));
    }

    #[test]
    fn push_genre_collapses_duplicates_preserving_order() {
        let mut f = film();
        f.push_genre(Genre {
            id: 2,
            name: "Horror".to_string(),
        });
        f.push_genre(Genre {
            id: 1,
            name: "Sci-Fi".to_string(),
        });
        f.push_genre(Genre {
            id: 2,
            name: "Horror".to_string(),
        });
        assert_eq!(
            f.genres.iter().map(|g| g.id).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[test]
    fn user_validation_checks_email_login_birthday() {
        let user = User {
            id: 0,
            email: "ripley@weyland.example".to_string(),
            login: "ripley".to_string(),
            name: "Ellen Ripley".to_string(),
            birthday: NaiveDate::from_ymd_opt(1949, 1, 7),
            friends: HashSet::new(),
        };
        assert!(user.validate(today()).is_ok());

        let mut bad_email = user.clone();
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate(today()).is_err());

        let mut spaced_login = user.clone();
        spaced_login.login = "rip ley".to_string();
        assert!(spaced_login.validate(today()).is_err());

        let mut future_birthday = user.clone();
        future_birthday.birthday = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert!(future_birthday.validate(today()).is_err());
    }

    #[test]
    fn email_syntax_edge_cases() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@.co"));
        assert!(!is_valid_email("a@b.co."));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@b@c.co"));
    }
}
