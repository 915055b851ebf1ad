//! Service layer
//!
//! Business rules on top of the persistence port: cross-entity
//! referential checks, duplicate guards, and the derived read
//! queries (popularity, friend graph).

mod catalog;
mod films;
mod users;

pub use catalog::{CatalogEntity, CatalogService};
pub use films::FilmService;
pub use users::UserService;
