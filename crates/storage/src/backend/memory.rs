//! In-memory backend

use super::StorageBackend;
use crate::StorageError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug)]
struct MemoryState {
    /// Records by kind, then id
    records: HashMap<String, BTreeMap<i64, Vec<u8>>>,
    /// (vector id, kind, member id)
    memberships: BTreeSet<(i64, String, i64)>,
    next_id: i64,
}

/// Backend keeping everything in process memory.
///
/// Ids are allocated from one counter shared by all kinds, like the
/// autoincrement key of the SQLite backend.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        info!("Creating in-memory storage backend");
        Self {
            state: Mutex::new(MemoryState {
                records: HashMap::new(),
                memberships: BTreeSet::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }

    /// Link without checking that the member exists
    #[cfg(test)]
    pub(crate) fn force_link(&self, vector_id: i64, kind: &str, member_id: i64) {
        if let Ok(mut state) = self.state.lock() {
            state
                .memberships
                .insert((vector_id, kind.to_string(), member_id));
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, kind: &str, payload: Vec<u8>) -> Result<i64, StorageError> {
        let mut state = self.lock()?;

        let id = state.next_id;
        state.next_id += 1;

        state
            .records
            .entry(kind.to_string())
            .or_default()
            .insert(id, payload);
        debug!("Inserted {} record with ID {}", kind, id);

        Ok(id)
    }

    async fn fetch(&self, kind: &str, id: i64) -> Result<Vec<u8>, StorageError> {
        let state = self.lock()?;

        state
            .records
            .get(kind)
            .and_then(|records| records.get(&id))
            .cloned()
            .ok_or_else(|| StorageError::not_found(kind, id))
    }

    async fn fetch_all(&self, kind: &str) -> Result<Vec<(i64, Vec<u8>)>, StorageError> {
        let state = self.lock()?;

        Ok(state
            .records
            .get(kind)
            .map(|records| records.iter().map(|(id, p)| (*id, p.clone())).collect())
            .unwrap_or_default())
    }

    async fn update(&self, kind: &str, id: i64, payload: Vec<u8>) -> Result<(), StorageError> {
        let mut state = self.lock()?;

        match state.records.get_mut(kind).and_then(|records| records.get_mut(&id)) {
            Some(stored) => {
                *stored = payload;
                Ok(())
            }
            None => Err(StorageError::not_found(kind, id)),
        }
    }

    async fn delete(&self, kind: &str, id: i64) -> Result<(), StorageError> {
        let mut state = self.lock()?;

        let removed = state
            .records
            .get_mut(kind)
            .and_then(|records| records.remove(&id));
        if removed.is_none() {
            return Err(StorageError::not_found(kind, id));
        }

        state
            .memberships
            .retain(|(_, member_kind, member_id)| !(member_kind == kind && *member_id == id));
        Ok(())
    }

    async fn delete_all(&self, kind: &str) -> Result<u64, StorageError> {
        let mut state = self.lock()?;

        let removed = state
            .records
            .remove(kind)
            .map(|records| records.len() as u64)
            .unwrap_or(0);
        state
            .memberships
            .retain(|(_, member_kind, _)| member_kind != kind);

        Ok(removed)
    }

    async fn count(&self, kind: &str) -> Result<u64, StorageError> {
        let state = self.lock()?;
        Ok(state.records.get(kind).map_or(0, |records| records.len() as u64))
    }

    async fn link(&self, vector_id: i64, kind: &str, member_id: i64) -> Result<(), StorageError> {
        let mut state = self.lock()?;

        let exists = state
            .records
            .get(kind)
            .is_some_and(|records| records.contains_key(&member_id));
        if !exists {
            return Err(StorageError::not_found(kind, member_id));
        }

        state
            .memberships
            .insert((vector_id, kind.to_string(), member_id));
        Ok(())
    }

    async fn unlink(
        &self,
        vector_id: i64,
        kind: &str,
        member_id: i64,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;

        if state
            .memberships
            .remove(&(vector_id, kind.to_string(), member_id))
        {
            Ok(())
        } else {
            Err(StorageError::not_found(kind, member_id))
        }
    }

    async fn members(&self, vector_id: i64, kind: &str) -> Result<Vec<i64>, StorageError> {
        let state = self.lock()?;

        Ok(state
            .memberships
            .iter()
            .filter(|(vector, member_kind, _)| *vector == vector_id && member_kind == kind)
            .map(|(_, _, member_id)| *member_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let backend = MemoryBackend::new();

        let id = backend.insert("reading", vec![1, 2, 3]).await.unwrap();
        assert_eq!(id, 1);

        let payload = backend.fetch("reading", id).await.unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
        assert_eq!(backend.count("reading").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_is_scoped_by_kind() {
        let backend = MemoryBackend::new();
        let id = backend.insert("reading", vec![1]).await.unwrap();

        let err = backend.fetch("location", id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let backend = MemoryBackend::new();
        let err = backend.update("reading", 42, vec![]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_drops_memberships() {
        let backend = MemoryBackend::new();
        let id = backend.insert("reading", vec![0]).await.unwrap();
        backend.link(7, "reading", id).await.unwrap();
        assert_eq!(backend.members(7, "reading").await.unwrap(), vec![id]);

        backend.delete("reading", id).await.unwrap();

        assert!(backend.members(7, "reading").await.unwrap().is_empty());
        assert!(backend.delete("reading", id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_link_requires_member() {
        let backend = MemoryBackend::new();
        let err = backend.link(1, "reading", 99).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unlink_unknown_member() {
        let backend = MemoryBackend::new();
        let id = backend.insert("reading", vec![0]).await.unwrap();
        backend.link(1, "reading", id).await.unwrap();

        assert!(backend.unlink(2, "reading", id).await.unwrap_err().is_not_found());
        backend.unlink(1, "reading", id).await.unwrap();
        assert!(backend.members(1, "reading").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all() {
        let backend = MemoryBackend::new();
        for _ in 0..5 {
            backend.insert("reading", vec![0]).await.unwrap();
        }
        backend.insert("location", vec![0]).await.unwrap();

        assert_eq!(backend.delete_all("reading").await.unwrap(), 5);
        assert_eq!(backend.count("reading").await.unwrap(), 0);
        assert_eq!(backend.count("location").await.unwrap(), 1);
    }
}
