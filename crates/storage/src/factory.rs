//! Home Factory
//!
//! Registry of every home in the process. Homes are registered up front and
//! constructed on first request; each slot holds its instance in a
//! `OnceLock`, so concurrent first requests construct exactly one home and
//! every later lookup returns that same instance.

use crate::backend::StorageBackend;
use crate::bindings::{BluetoothReadingVectorHome, GsmReadingVectorHome, WifiReadingVectorHome};
use crate::entity::{Entity, MeasurementRecord};
use crate::home::EntityHome;
use crate::identifier::{EntityIdentifier, MEASUREMENT};
use crate::measurement::MeasurementHome;
use crate::vector::VectorHome;
use crate::StorageError;
use model::{BluetoothReading, Fingerprint, GsmReading, Location, Map, WifiReading};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock, Weak};
use tracing::{debug, error, info};

/// Role of a registered home
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HomeKind {
    /// Plain CRUD home ([`EntityHome`])
    Entity,
    /// Vector membership home ([`VectorHome`])
    Vector,
    /// Home assembling an aggregate from other homes ([`MeasurementHome`])
    Aggregate,
}

/// Registry key: one home per kind and identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HomeKey {
    pub kind: HomeKind,
    pub identifier: EntityIdentifier,
}

impl HomeKey {
    pub fn new(kind: HomeKind, identifier: EntityIdentifier) -> Self {
        Self { kind, identifier }
    }
}

impl fmt::Display for HomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} home for {}", self.kind, self.identifier)
    }
}

type SharedHome = Arc<dyn Any + Send + Sync>;
type Constructor = Box<dyn Fn(&HomeFactory) -> SharedHome + Send + Sync>;

struct HomeSlot {
    /// Rust type the slot was registered for
    type_name: &'static str,
    construct: Constructor,
    instance: OnceLock<SharedHome>,
}

struct FactoryInner {
    backend: Arc<dyn StorageBackend>,
    slots: RwLock<HashMap<HomeKey, Arc<HomeSlot>>>,
    constructed: AtomicUsize,
}

/// Process-wide home registry.
///
/// Cloning is cheap and every clone refers to the same registry. Homes that
/// need other homes hold a [`FactoryHandle`] instead of a clone, so the
/// registry is dropped once the last `HomeFactory` goes away.
#[derive(Clone)]
pub struct HomeFactory {
    inner: Arc<FactoryInner>,
}

/// Non-owning reference to a [`HomeFactory`]
#[derive(Clone, Default)]
pub struct FactoryHandle {
    inner: Weak<FactoryInner>,
}

impl FactoryHandle {
    /// The factory, unless it has been dropped
    pub fn upgrade(&self) -> Option<HomeFactory> {
        self.inner.upgrade().map(|inner| HomeFactory { inner })
    }
}

impl fmt::Debug for FactoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl HomeFactory {
    /// Create an empty registry over `backend`
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        info!("Creating home factory on {} backend", backend.name());
        Self {
            inner: Arc::new(FactoryInner {
                backend,
                slots: RwLock::new(HashMap::new()),
                constructed: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a registry with every built-in home registered
    pub fn with_default_bindings(backend: Arc<dyn StorageBackend>) -> Result<Self, StorageError> {
        let factory = Self::new(backend);

        factory.register_entity::<GsmReading>()?;
        factory.register_entity::<WifiReading>()?;
        factory.register_entity::<BluetoothReading>()?;
        factory.register_entity::<Map>()?;
        factory.register_entity::<Location>()?;
        factory.register_entity::<Fingerprint>()?;
        factory.register_entity::<MeasurementRecord>()?;

        factory.register_vector::<GsmReading, _>(GsmReadingVectorHome::new)?;
        factory.register_vector::<WifiReading, _>(WifiReadingVectorHome::new)?;
        factory.register_vector::<BluetoothReading, _>(BluetoothReadingVectorHome::new)?;

        factory.register_measurement_home()?;

        info!("Registered {} homes", factory.registered()?.len());
        Ok(factory)
    }

    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.inner.backend)
    }

    pub fn downgrade(&self) -> FactoryHandle {
        FactoryHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Registered keys, sorted
    pub fn registered(&self) -> Result<Vec<HomeKey>, StorageError> {
        let slots = self.inner.slots.read().map_err(|e| {
            StorageError::ConfigurationError(format!("Registry lock error: {}", e))
        })?;

        let mut keys: Vec<HomeKey> = slots.keys().copied().collect();
        keys.sort();
        Ok(keys)
    }

    /// Number of homes constructed so far
    pub fn constructed_homes(&self) -> usize {
        self.inner.constructed.load(Ordering::SeqCst)
    }

    /// Register the [`EntityHome`] of `T`
    pub fn register_entity<T: Entity>(&self) -> Result<(), StorageError> {
        self.register_slot(
            HomeKey::new(HomeKind::Entity, T::IDENTIFIER),
            type_name::<T>(),
            Box::new(|factory: &HomeFactory| {
                Arc::new(EntityHome::<T>::new(factory.backend())) as SharedHome
            }),
        )
    }

    /// Register the vector home of `T`, built by `construct` on first use
    pub fn register_vector<T, V>(
        &self,
        construct: fn(FactoryHandle) -> V,
    ) -> Result<(), StorageError>
    where
        T: Entity,
        V: VectorHome<T> + 'static,
    {
        self.register_slot(
            HomeKey::new(HomeKind::Vector, T::IDENTIFIER),
            type_name::<T>(),
            Box::new(move |factory: &HomeFactory| {
                let home: Arc<dyn VectorHome<T>> = Arc::new(construct(factory.downgrade()));
                Arc::new(home) as SharedHome
            }),
        )
    }

    /// Register the measurement home; it resolves its parts on each call
    pub fn register_measurement_home(&self) -> Result<(), StorageError> {
        self.register_slot(
            HomeKey::new(HomeKind::Aggregate, MEASUREMENT),
            type_name::<MeasurementHome>(),
            Box::new(|factory: &HomeFactory| {
                Arc::new(MeasurementHome::new(factory.downgrade())) as SharedHome
            }),
        )
    }

    fn register_slot(
        &self,
        key: HomeKey,
        type_name: &'static str,
        construct: Constructor,
    ) -> Result<(), StorageError> {
        key.identifier.validate()?;

        let mut slots = self.inner.slots.write().map_err(|e| {
            StorageError::ConfigurationError(format!("Registry lock error: {}", e))
        })?;

        if let Some(existing) = slots.get(&key) {
            error!(
                "Duplicate registration of {} ({} conflicts with {})",
                key, type_name, existing.type_name
            );
            return Err(StorageError::ConfigurationError(format!(
                "{} is already registered for {}",
                key, existing.type_name
            )));
        }

        slots.insert(
            key,
            Arc::new(HomeSlot {
                type_name,
                construct,
                instance: OnceLock::new(),
            }),
        );
        debug!("Registered {} ({})", key, type_name);
        Ok(())
    }

    /// Instance for `key`, constructing it on first request
    fn resolve(&self, key: HomeKey) -> Result<SharedHome, StorageError> {
        // The registry lock is released before construction
        let slot = {
            let slots = self.inner.slots.read().map_err(|e| {
                StorageError::ConfigurationError(format!("Registry lock error: {}", e))
            })?;
            slots.get(&key).cloned()
        };

        let slot = slot.ok_or_else(|| {
            error!("No {} registered", key);
            StorageError::ConfigurationError(format!("no {} registered", key))
        })?;

        let instance = slot.instance.get_or_init(|| {
            self.inner.constructed.fetch_add(1, Ordering::SeqCst);
            debug!("Constructing {} ({})", key, slot.type_name);
            (slot.construct)(self)
        });
        Ok(Arc::clone(instance))
    }

    fn type_mismatch(key: HomeKey, requested: &'static str) -> StorageError {
        error!("{} was requested as {}", key, requested);
        StorageError::ConfigurationError(format!("{} does not store {}", key, requested))
    }

    /// The entity home of `T`
    pub fn entity_home<T: Entity>(&self) -> Result<Arc<EntityHome<T>>, StorageError> {
        let key = HomeKey::new(HomeKind::Entity, T::IDENTIFIER);
        self.resolve(key)?
            .downcast::<EntityHome<T>>()
            .map_err(|_| Self::type_mismatch(key, type_name::<T>()))
    }

    /// The vector home of `T`
    pub fn vector_home<T: Entity>(&self) -> Result<Arc<dyn VectorHome<T>>, StorageError> {
        let key = HomeKey::new(HomeKind::Vector, T::IDENTIFIER);
        let shared = self.resolve(key)?;
        (*shared)
            .downcast_ref::<Arc<dyn VectorHome<T>>>()
            .cloned()
            .ok_or_else(|| Self::type_mismatch(key, type_name::<T>()))
    }

    pub fn measurement_home(&self) -> Result<Arc<MeasurementHome>, StorageError> {
        let key = HomeKey::new(HomeKind::Aggregate, MEASUREMENT);
        self.resolve(key)?
            .downcast::<MeasurementHome>()
            .map_err(|_| Self::type_mismatch(key, type_name::<MeasurementHome>()))
    }

    pub fn gsm_reading_home(&self) -> Result<Arc<EntityHome<GsmReading>>, StorageError> {
        self.entity_home::<GsmReading>()
    }

    pub fn wifi_reading_home(&self) -> Result<Arc<EntityHome<WifiReading>>, StorageError> {
        self.entity_home::<WifiReading>()
    }

    pub fn bluetooth_reading_home(
        &self,
    ) -> Result<Arc<EntityHome<BluetoothReading>>, StorageError> {
        self.entity_home::<BluetoothReading>()
    }

    pub fn map_home(&self) -> Result<Arc<EntityHome<Map>>, StorageError> {
        self.entity_home::<Map>()
    }

    pub fn location_home(&self) -> Result<Arc<EntityHome<Location>>, StorageError> {
        self.entity_home::<Location>()
    }

    pub fn fingerprint_home(&self) -> Result<Arc<EntityHome<Fingerprint>>, StorageError> {
        self.entity_home::<Fingerprint>()
    }

    pub fn gsm_reading_vector_home(
        &self,
    ) -> Result<Arc<dyn VectorHome<GsmReading>>, StorageError> {
        self.vector_home::<GsmReading>()
    }

    pub fn wifi_reading_vector_home(
        &self,
    ) -> Result<Arc<dyn VectorHome<WifiReading>>, StorageError> {
        self.vector_home::<WifiReading>()
    }

    pub fn bluetooth_reading_vector_home(
        &self,
    ) -> Result<Arc<dyn VectorHome<BluetoothReading>>, StorageError> {
        self.vector_home::<BluetoothReading>()
    }
}

impl fmt::Debug for HomeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeFactory")
            .field("backend", &self.inner.backend.name())
            .field("registered", &self.registered().map(|keys| keys.len()).ok())
            .field("constructed", &self.constructed_homes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::identifier::GSM_READING;
    use serde::{Deserialize, Serialize};

    fn factory() -> HomeFactory {
        HomeFactory::with_default_bindings(Arc::new(MemoryBackend::new())).unwrap()
    }

    /// Entity that claims the GSM identifier
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Impostor {
        id: Option<i64>,
    }

    impl Entity for Impostor {
        const IDENTIFIER: EntityIdentifier = GSM_READING;

        fn id(&self) -> Option<i64> {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = Some(id);
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Nameless {
        id: Option<i64>,
    }

    impl Entity for Nameless {
        const IDENTIFIER: EntityIdentifier = EntityIdentifier::new("");

        fn id(&self) -> Option<i64> {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = Some(id);
        }
    }

    #[test]
    fn test_homes_are_constructed_lazily() {
        let factory = factory();
        assert_eq!(factory.registered().unwrap().len(), 11);
        assert_eq!(factory.constructed_homes(), 0);

        factory.gsm_reading_home().unwrap();
        assert_eq!(factory.constructed_homes(), 1);
    }

    #[test]
    fn test_registered_keys_are_sorted() {
        let keys = factory().registered().unwrap();

        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(keys.contains(&HomeKey::new(HomeKind::Vector, GSM_READING)));
        assert!(keys.contains(&HomeKey::new(HomeKind::Aggregate, MEASUREMENT)));
    }

    #[test]
    fn test_poisoned_registry_is_configuration_error() {
        let factory = factory();
        let holder = factory.clone();
        let _ = std::thread::spawn(move || {
            let _slots = holder.inner.slots.write().unwrap();
            panic!("registry writer died");
        })
        .join();

        assert!(factory.registered().unwrap_err().is_configuration());
        assert!(factory.gsm_reading_home().unwrap_err().is_configuration());
        assert!(factory.register_entity::<Impostor>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_lookup_returns_same_instance() {
        let factory = factory();

        let first = factory.gsm_reading_home().unwrap();
        let second = factory.entity_home::<GsmReading>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let first = factory.wifi_reading_vector_home().unwrap();
        let second = factory.vector_home::<WifiReading>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let first = factory.measurement_home().unwrap();
        let second = factory.clone().measurement_home().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert_eq!(factory.constructed_homes(), 3);
    }

    #[test]
    fn test_unregistered_home_is_configuration_error() {
        let factory = HomeFactory::new(Arc::new(MemoryBackend::new()));

        assert!(factory.map_home().unwrap_err().is_configuration());
        assert!(factory.gsm_reading_vector_home().unwrap_err().is_configuration());
        assert!(factory.measurement_home().unwrap_err().is_configuration());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let factory = factory();

        assert!(factory.register_entity::<GsmReading>().unwrap_err().is_configuration());
        assert!(factory.register_entity::<Impostor>().unwrap_err().is_configuration());
        assert!(factory
            .register_vector::<GsmReading, _>(GsmReadingVectorHome::new)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let factory = factory();
        assert!(factory.register_entity::<Nameless>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_shared_identifier_of_another_type() {
        let factory = factory();

        let err = factory.entity_home::<Impostor>().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_handle_outlives_factory() {
        let factory = factory();
        let handle = factory.downgrade();
        assert!(handle.upgrade().is_some());

        drop(factory);
        assert!(handle.upgrade().is_none());
    }
}
