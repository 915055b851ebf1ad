//! Catalog service
//!
//! Generic CRUD orchestration for the small catalog entities (genres,
//! MPA ratings): field validation plus the equality-based duplicate
//! guard. Films and users have their own services with cross-entity
//! rules.

use std::sync::Arc;

use crate::data::{Entity, Genre, MpaRating, Store};
use crate::error::{AppError, Result};

/// A catalog entity with self-contained field validation.
pub trait CatalogEntity: Entity {
    /// Human-readable entity kind for error messages.
    const KIND: &'static str;

    fn check_fields(&self) -> Result<()>;
}

impl CatalogEntity for Genre {
    const KIND: &'static str = "genre";

    fn check_fields(&self) -> Result<()> {
        self.validate()
    }
}

impl CatalogEntity for MpaRating {
    const KIND: &'static str = "rating";

    fn check_fields(&self) -> Result<()> {
        self.validate()
    }
}

/// Generic catalog service over any `Store<T>` implementation.
pub struct CatalogService<T: CatalogEntity> {
    store: Arc<dyn Store<T>>,
}

impl<T: CatalogEntity> CatalogService<T> {
    pub fn new(store: Arc<dyn Store<T>>) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> Result<Vec<T>> {
        self.store.find_all().await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<T> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} with id {id} not found", T::KIND)))
    }

    pub async fn create(&self, obj: T) -> Result<T> {
        tracing::debug!(kind = T::KIND, "create");
        obj.check_fields()?;
        if self.store.find_equal(&obj).await?.is_some() {
            return Err(AppError::Duplicate(format!(
                "{} with the same name already exists",
                T::KIND
            )));
        }
        self.store.create(obj).await
    }

    pub async fn update(&self, obj: T) -> Result<T> {
        tracing::debug!(kind = T::KIND, id = obj.id(), "update");
        self.find_by_id(obj.id()).await?;
        obj.check_fields()?;

        // The guard must not trip on the entity's own stored row.
        if let Some(existing) = self.store.find_equal(&obj).await? {
            if existing.id() != obj.id() {
                return Err(AppError::Duplicate(format!(
                    "{} with the same name already exists",
                    T::KIND
                )));
            }
        }
        self.store.update(obj).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        tracing::debug!(kind = T::KIND, id, "delete");
        self.find_by_id(id).await?;
        self.store.delete(id).await
    }
}
