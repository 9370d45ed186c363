//! Entity Home
//!
//! CRUD access to the records of one entity type.

use crate::backend::StorageBackend;
use crate::entity::Entity;
use crate::identifier::EntityIdentifier;
use crate::StorageError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Persistence for entities of type `T`.
///
/// Homes are obtained from the [`HomeFactory`](crate::HomeFactory), which
/// guarantees one instance per entity type.
pub struct EntityHome<T: Entity> {
    backend: Arc<dyn StorageBackend>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityHome<T> {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            _entity: PhantomData,
        }
    }

    pub fn identifier(&self) -> EntityIdentifier {
        T::IDENTIFIER
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    fn kind(&self) -> &'static str {
        T::IDENTIFIER.as_str()
    }

    fn decode(&self, id: i64, payload: &[u8]) -> Result<T, StorageError> {
        let mut entity: T = postcard::from_bytes(payload)?;
        entity.set_id(id);
        Ok(entity)
    }

    /// Persist a new entity and assign its id
    pub async fn add(&self, entity: &mut T) -> Result<i64, StorageError> {
        let payload = postcard::to_allocvec(&*entity)?;
        let id = self.backend.insert(self.kind(), payload).await?;
        entity.set_id(id);

        debug!("Added {} with ID {}", T::IDENTIFIER, id);
        Ok(id)
    }

    pub async fn add_all(&self, entities: &mut [T]) -> Result<Vec<i64>, StorageError> {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities.iter_mut() {
            ids.push(self.add(entity).await?);
        }
        Ok(ids)
    }

    pub async fn get(&self, id: i64) -> Result<T, StorageError> {
        let payload = self.backend.fetch(self.kind(), id).await?;
        self.decode(id, &payload)
    }

    /// All entities of this type, ordered by id
    pub async fn get_all(&self) -> Result<Vec<T>, StorageError> {
        self.backend
            .fetch_all(self.kind())
            .await?
            .into_iter()
            .map(|(id, payload)| self.decode(id, &payload))
            .collect()
    }

    /// Overwrite the stored state of a persisted entity
    pub async fn update(&self, entity: &T) -> Result<(), StorageError> {
        let id = entity.id().ok_or_else(|| StorageError::Unsaved {
            kind: self.kind().to_string(),
        })?;

        let payload = postcard::to_allocvec(entity)?;
        self.backend.update(self.kind(), id, payload).await?;

        debug!("Updated {} {}", T::IDENTIFIER, id);
        Ok(())
    }

    /// Delete an entity, dropping its vector memberships
    pub async fn remove(&self, id: i64) -> Result<(), StorageError> {
        self.backend.delete(self.kind(), id).await?;
        debug!("Removed {} {}", T::IDENTIFIER, id);
        Ok(())
    }

    pub async fn remove_all(&self) -> Result<u64, StorageError> {
        let removed = self.backend.delete_all(self.kind()).await?;
        debug!("Removed {} {} records", removed, T::IDENTIFIER);
        Ok(removed)
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        self.backend.count(self.kind()).await
    }

    pub async fn contains(&self, id: i64) -> Result<bool, StorageError> {
        match self.backend.fetch(self.kind(), id).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<T: Entity> fmt::Debug for EntityHome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHome")
            .field("identifier", &T::IDENTIFIER)
            .field("backend", &self.backend.name())
            .finish()
    }
}
