//! Storage backends
//!
//! A backend stores opaque payloads keyed by entity kind and id, plus the
//! membership rows that tie vector members to their vector.

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::StorageError;
use async_trait::async_trait;
use std::fmt;

/// Persistence engine behind every home.
///
/// Lookups of absent records return [`StorageError::NotFound`]; engine
/// failures return [`StorageError::DatabaseError`]. Implementations do not
/// retry.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Store a new record and return its id
    async fn insert(&self, kind: &str, payload: Vec<u8>) -> Result<i64, StorageError>;

    async fn fetch(&self, kind: &str, id: i64) -> Result<Vec<u8>, StorageError>;

    /// All records of a kind, ordered by id
    async fn fetch_all(&self, kind: &str) -> Result<Vec<(i64, Vec<u8>)>, StorageError>;

    async fn update(&self, kind: &str, id: i64, payload: Vec<u8>) -> Result<(), StorageError>;

    /// Delete a record together with any membership rows pointing at it
    async fn delete(&self, kind: &str, id: i64) -> Result<(), StorageError>;

    /// Delete every record of a kind, returning how many were removed
    async fn delete_all(&self, kind: &str) -> Result<u64, StorageError>;

    async fn count(&self, kind: &str) -> Result<u64, StorageError>;

    /// Record that `member_id` belongs to vector `vector_id`.
    /// The member record must exist; linking twice is a no-op.
    async fn link(&self, vector_id: i64, kind: &str, member_id: i64) -> Result<(), StorageError>;

    /// Remove a membership row; `NotFound` if the member was not linked
    async fn unlink(&self, vector_id: i64, kind: &str, member_id: i64)
        -> Result<(), StorageError>;

    /// Member ids of one kind in a vector, ordered by id
    async fn members(&self, vector_id: i64, kind: &str) -> Result<Vec<i64>, StorageError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Backend whose engine is unreachable
    #[derive(Debug, Default)]
    pub(crate) struct UnavailableBackend;

    fn unavailable<T>() -> Result<T, StorageError> {
        Err(StorageError::DatabaseError("connection refused".to_string()))
    }

    #[async_trait]
    impl StorageBackend for UnavailableBackend {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        async fn insert(&self, _kind: &str, _payload: Vec<u8>) -> Result<i64, StorageError> {
            unavailable()
        }

        async fn fetch(&self, _kind: &str, _id: i64) -> Result<Vec<u8>, StorageError> {
            unavailable()
        }

        async fn fetch_all(&self, _kind: &str) -> Result<Vec<(i64, Vec<u8>)>, StorageError> {
            unavailable()
        }

        async fn update(
            &self,
            _kind: &str,
            _id: i64,
            _payload: Vec<u8>,
        ) -> Result<(), StorageError> {
            unavailable()
        }

        async fn delete(&self, _kind: &str, _id: i64) -> Result<(), StorageError> {
            unavailable()
        }

        async fn delete_all(&self, _kind: &str) -> Result<u64, StorageError> {
            unavailable()
        }

        async fn count(&self, _kind: &str) -> Result<u64, StorageError> {
            unavailable()
        }

        async fn link(
            &self,
            _vector_id: i64,
            _kind: &str,
            _member_id: i64,
        ) -> Result<(), StorageError> {
            unavailable()
        }

        async fn unlink(
            &self,
            _vector_id: i64,
            _kind: &str,
            _member_id: i64,
        ) -> Result<(), StorageError> {
            unavailable()
        }

        async fn members(&self, _vector_id: i64, _kind: &str) -> Result<Vec<i64>, StorageError> {
            unavailable()
        }
    }

    /// Memory backend whose writes can be made to fail on demand
    #[derive(Debug, Default)]
    pub(crate) struct FlakyBackend {
        inner: MemoryBackend,
        inserts_left: Mutex<Option<usize>>,
        fail_links: AtomicBool,
        fail_deletes: AtomicBool,
    }

    impl FlakyBackend {
        /// Let `n` more inserts through, then fail every insert
        pub(crate) fn fail_inserts_after(&self, n: usize) {
            *self.inserts_left.lock().unwrap() = Some(n);
        }

        pub(crate) fn fail_links(&self) {
            self.fail_links.store(true, Ordering::SeqCst);
        }

        pub(crate) fn fail_deletes(&self) {
            self.fail_deletes.store(true, Ordering::SeqCst);
        }
    }

    fn disk_full<T>() -> Result<T, StorageError> {
        Err(StorageError::DatabaseError("disk full".to_string()))
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn insert(&self, kind: &str, payload: Vec<u8>) -> Result<i64, StorageError> {
            {
                let mut left = self.inserts_left.lock().unwrap();
                match left.as_mut() {
                    Some(0) => return disk_full(),
                    Some(n) => *n -= 1,
                    None => {}
                }
            }
            self.inner.insert(kind, payload).await
        }

        async fn fetch(&self, kind: &str, id: i64) -> Result<Vec<u8>, StorageError> {
            self.inner.fetch(kind, id).await
        }

        async fn fetch_all(&self, kind: &str) -> Result<Vec<(i64, Vec<u8>)>, StorageError> {
            self.inner.fetch_all(kind).await
        }

        async fn update(&self, kind: &str, id: i64, payload: Vec<u8>) -> Result<(), StorageError> {
            self.inner.update(kind, id, payload).await
        }

        async fn delete(&self, kind: &str, id: i64) -> Result<(), StorageError> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return disk_full();
            }
            self.inner.delete(kind, id).await
        }

        async fn delete_all(&self, kind: &str) -> Result<u64, StorageError> {
            self.inner.delete_all(kind).await
        }

        async fn count(&self, kind: &str) -> Result<u64, StorageError> {
            self.inner.count(kind).await
        }

        async fn link(
            &self,
            vector_id: i64,
            kind: &str,
            member_id: i64,
        ) -> Result<(), StorageError> {
            if self.fail_links.load(Ordering::SeqCst) {
                return disk_full();
            }
            self.inner.link(vector_id, kind, member_id).await
        }

        async fn unlink(
            &self,
            vector_id: i64,
            kind: &str,
            member_id: i64,
        ) -> Result<(), StorageError> {
            self.inner.unlink(vector_id, kind, member_id).await
        }

        async fn members(&self, vector_id: i64, kind: &str) -> Result<Vec<i64>, StorageError> {
            self.inner.members(vector_id, kind).await
        }
    }
}
