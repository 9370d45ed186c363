//! Vector Homes
//!
//! Readings are not stored on their own: each one is a member of the
//! vector of the measurement it was taken in. A vector home binds an
//! entity type to its vector identifier and to the entity home that stores
//! the readings; the membership operations are shared by every binding.

use crate::entity::Entity;
use crate::home::EntityHome;
use crate::identifier::EntityIdentifier;
use crate::StorageError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Membership bookkeeping for entities stored as vector members.
///
/// Implementors only supply the identifier and the backing home; never
/// override the provided operations.
#[async_trait]
pub trait VectorHome<T: Entity>: Send + Sync {
    /// Identifier recorded in membership rows. Must be a fixed constant.
    fn contained_object_identifier(&self) -> EntityIdentifier;

    /// Home storing the member records, resolved through the factory
    fn object_home(&self) -> Option<Arc<EntityHome<T>>>;

    /// Backing home, or a configuration error if the binding is broken
    fn require_object_home(&self) -> Result<Arc<EntityHome<T>>, StorageError> {
        self.object_home().ok_or_else(|| {
            let identifier = self.contained_object_identifier();
            error!("No entity home bound for vector members of {}", identifier);
            StorageError::ConfigurationError(format!(
                "no entity home bound for vector members of {}",
                identifier
            ))
        })
    }

    /// Persist `member` and add it to vector `vector_id`
    async fn add_member(&self, vector_id: i64, member: &mut T) -> Result<i64, StorageError> {
        let home = self.require_object_home()?;
        let kind = self.contained_object_identifier();

        let id = home.add(member).await?;
        if let Err(err) = home.backend().link(vector_id, kind.as_str(), id).await {
            warn!("Linking {} {} to vector {} failed: {}", kind, id, vector_id, err);
            // Leave no orphan behind; the link error is what the caller sees
            if let Err(cleanup) = home.remove(id).await {
                warn!("Orphaned {} {} left behind: {}", kind, id, cleanup);
            }
            return Err(err);
        }

        debug!("Added {} {} to vector {}", kind, id, vector_id);
        Ok(id)
    }

    async fn add_vector(
        &self,
        vector_id: i64,
        members: &mut [T],
    ) -> Result<Vec<i64>, StorageError> {
        self.require_object_home()?;

        let mut ids = Vec::with_capacity(members.len());
        for member in members.iter_mut() {
            ids.push(self.add_member(vector_id, member).await?);
        }
        Ok(ids)
    }

    /// Ids of the members of a vector, ordered by id
    async fn member_ids(&self, vector_id: i64) -> Result<Vec<i64>, StorageError> {
        let home = self.require_object_home()?;
        let kind = self.contained_object_identifier();

        home.backend().members(vector_id, kind.as_str()).await
    }

    /// Fetch one member; `NotFound` unless it belongs to the vector
    async fn get_member(&self, vector_id: i64, member_id: i64) -> Result<T, StorageError> {
        let home = self.require_object_home()?;
        let kind = self.contained_object_identifier();

        let members = home.backend().members(vector_id, kind.as_str()).await?;
        if !members.contains(&member_id) {
            return Err(StorageError::not_found(kind.as_str(), member_id));
        }

        home.get(member_id).await
    }

    /// All members of a vector, ordered by id
    async fn get_vector(&self, vector_id: i64) -> Result<Vec<T>, StorageError> {
        let home = self.require_object_home()?;

        let ids = self.member_ids(vector_id).await?;
        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            members.push(home.get(id).await?);
        }
        Ok(members)
    }

    /// Take a member out of the vector and delete it
    async fn remove_member(&self, vector_id: i64, member_id: i64) -> Result<(), StorageError> {
        let home = self.require_object_home()?;
        let kind = self.contained_object_identifier();

        home.backend()
            .unlink(vector_id, kind.as_str(), member_id)
            .await?;
        home.remove(member_id).await
    }

    /// Delete every member of a vector, returning how many were removed
    async fn remove_vector(&self, vector_id: i64) -> Result<usize, StorageError> {
        let home = self.require_object_home()?;
        let kind = self.contained_object_identifier();

        let ids = self.member_ids(vector_id).await?;
        for id in &ids {
            home.backend().unlink(vector_id, kind.as_str(), *id).await?;
            home.remove(*id).await?;
        }

        debug!("Removed {} {} members of vector {}", ids.len(), kind, vector_id);
        Ok(ids.len())
    }

    async fn member_count(&self, vector_id: i64) -> Result<usize, StorageError> {
        Ok(self.member_ids(vector_id).await?.len())
    }
}

impl<T: Entity> fmt::Debug for dyn VectorHome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorHome")
            .field("identifier", &self.contained_object_identifier())
            .finish()
    }
}
