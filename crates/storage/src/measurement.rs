//! Measurement Home
//!
//! A measurement is stored as a header record plus one vector per reading
//! type, keyed by the header id.

use crate::entity::{Entity, MeasurementRecord};
use crate::factory::{FactoryHandle, HomeFactory};
use crate::home::EntityHome;
use crate::identifier::MEASUREMENT;
use crate::vector::VectorHome;
use crate::StorageError;
use model::{BluetoothReading, GsmReading, Measurement, WifiReading};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Reading ids linked to one measurement, per reading type
#[derive(Debug, Default)]
struct Members {
    gsm: Vec<i64>,
    wifi: Vec<i64>,
    bluetooth: Vec<i64>,
}

/// Best-effort removal of every member of a vector not in `kept`.
/// Failures are only logged.
async fn discard_added<T: Entity>(home: &dyn VectorHome<T>, vector_id: i64, kept: &[i64]) {
    let current = match home.member_ids(vector_id).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(
                "Could not list {} members of measurement {}: {}",
                home.contained_object_identifier(),
                vector_id,
                err
            );
            return;
        }
    };

    for id in current.into_iter().filter(|id| !kept.contains(id)) {
        if let Err(err) = home.remove_member(vector_id, id).await {
            warn!(
                "Could not roll back {} {} of measurement {}: {}",
                home.contained_object_identifier(),
                id,
                vector_id,
                err
            );
        }
    }
}

/// Homes a measurement is spread over
struct Parts {
    headers: Arc<EntityHome<MeasurementRecord>>,
    gsm: Arc<dyn VectorHome<GsmReading>>,
    wifi: Arc<dyn VectorHome<WifiReading>>,
    bluetooth: Arc<dyn VectorHome<BluetoothReading>>,
}

impl Parts {
    async fn assemble(&self, header: MeasurementRecord) -> Result<Measurement, StorageError> {
        let id = header.id.ok_or_else(|| StorageError::Unsaved {
            kind: MEASUREMENT.to_string(),
        })?;

        Ok(Measurement {
            id: Some(id),
            timestamp_ms: header.timestamp_ms,
            gsm_readings: self.gsm.get_vector(id).await?,
            wifi_readings: self.wifi.get_vector(id).await?,
            bluetooth_readings: self.bluetooth.get_vector(id).await?,
        })
    }

    async fn members(&self, id: i64) -> Result<Members, StorageError> {
        Ok(Members {
            gsm: self.gsm.member_ids(id).await?,
            wifi: self.wifi.member_ids(id).await?,
            bluetooth: self.bluetooth.member_ids(id).await?,
        })
    }

    async fn add_vectors(
        &self,
        id: i64,
        measurement: &mut Measurement,
    ) -> Result<(), StorageError> {
        self.gsm.add_vector(id, &mut measurement.gsm_readings).await?;
        self.wifi.add_vector(id, &mut measurement.wifi_readings).await?;
        self.bluetooth
            .add_vector(id, &mut measurement.bluetooth_readings)
            .await?;
        Ok(())
    }

    async fn remove_members(&self, id: i64, members: &Members) -> Result<(), StorageError> {
        for member in &members.gsm {
            self.gsm.remove_member(id, *member).await?;
        }
        for member in &members.wifi {
            self.wifi.remove_member(id, *member).await?;
        }
        for member in &members.bluetooth {
            self.bluetooth.remove_member(id, *member).await?;
        }
        Ok(())
    }

    /// Drop every reading of vector `id` that is not in `kept`
    async fn roll_back(&self, id: i64, kept: &Members) {
        discard_added(&*self.gsm, id, &kept.gsm).await;
        discard_added(&*self.wifi, id, &kept.wifi).await;
        discard_added(&*self.bluetooth, id, &kept.bluetooth).await;
    }

    async fn remove_vectors(&self, id: i64) -> Result<usize, StorageError> {
        Ok(self.gsm.remove_vector(id).await?
            + self.wifi.remove_vector(id).await?
            + self.bluetooth.remove_vector(id).await?)
    }
}

/// Persistence for whole measurements.
///
/// Writes go to a copy of the caller's measurement; the caller only sees
/// new ids once every part is stored. A failed write removes what it added
/// and leaves the caller's measurement untouched.
#[derive(Debug)]
pub struct MeasurementHome {
    factory: FactoryHandle,
}

impl MeasurementHome {
    pub fn new(factory: FactoryHandle) -> Self {
        Self { factory }
    }

    fn factory(&self) -> Result<HomeFactory, StorageError> {
        self.factory.upgrade().ok_or_else(|| {
            error!("Measurement home used after its factory was dropped");
            StorageError::ConfigurationError("home factory is gone".to_string())
        })
    }

    /// Resolve every part before touching storage
    fn parts(&self) -> Result<Parts, StorageError> {
        let factory = self.factory()?;
        Ok(Parts {
            headers: factory.entity_home::<MeasurementRecord>()?,
            gsm: factory.gsm_reading_vector_home()?,
            wifi: factory.wifi_reading_vector_home()?,
            bluetooth: factory.bluetooth_reading_vector_home()?,
        })
    }

    /// Persist a measurement and all of its readings, assigning ids
    pub async fn add(&self, measurement: &mut Measurement) -> Result<i64, StorageError> {
        let parts = self.parts()?;

        let mut header = MeasurementRecord::from(&*measurement);
        let id = parts.headers.add(&mut header).await?;

        let mut staged = measurement.clone();
        staged.clear_ids();
        staged.id = Some(id);
        if let Err(err) = parts.add_vectors(id, &mut staged).await {
            warn!("Storing readings of measurement {} failed: {}", id, err);
            parts.roll_back(id, &Members::default()).await;
            if let Err(cleanup) = parts.headers.remove(id).await {
                warn!("Orphaned measurement {} left behind: {}", id, cleanup);
            }
            return Err(err);
        }
        *measurement = staged;

        debug!(
            "Added measurement {} with {} readings",
            id,
            measurement.reading_count()
        );
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Measurement, StorageError> {
        let parts = self.parts()?;
        let header = parts.headers.get(id).await?;
        parts.assemble(header).await
    }

    /// All measurements, ordered by id
    pub async fn get_all(&self) -> Result<Vec<Measurement>, StorageError> {
        let parts = self.parts()?;

        let mut measurements = Vec::new();
        for header in parts.headers.get_all().await? {
            measurements.push(parts.assemble(header).await?);
        }
        Ok(measurements)
    }

    /// Rewrite the header and replace every reading vector.
    ///
    /// The new readings are stored before the header is rewritten and the
    /// old readings are removed last, so a failure never loses the stored
    /// measurement.
    pub async fn update(&self, measurement: &mut Measurement) -> Result<(), StorageError> {
        let parts = self.parts()?;
        let id = measurement.id.ok_or_else(|| StorageError::Unsaved {
            kind: MEASUREMENT.to_string(),
        })?;

        if !parts.headers.contains(id).await? {
            return Err(StorageError::not_found(MEASUREMENT.as_str(), id));
        }
        let previous = parts.members(id).await?;

        let mut staged = measurement.clone();
        staged.clear_ids();
        staged.id = Some(id);
        let mut written = parts.add_vectors(id, &mut staged).await;
        if written.is_ok() {
            written = parts.headers.update(&MeasurementRecord::from(&staged)).await;
        }
        if let Err(err) = written {
            warn!("Updating measurement {} failed: {}", id, err);
            parts.roll_back(id, &previous).await;
            return Err(err);
        }
        *measurement = staged;

        // Header and new readings are committed; stale readings go last
        if let Err(err) = parts.remove_members(id, &previous).await {
            warn!("Stale readings of measurement {} remain: {}", id, err);
            return Err(err);
        }

        debug!("Updated measurement {}", id);
        Ok(())
    }

    /// Delete a measurement together with its readings
    pub async fn remove(&self, id: i64) -> Result<(), StorageError> {
        let parts = self.parts()?;

        if !parts.headers.contains(id).await? {
            return Err(StorageError::not_found(MEASUREMENT.as_str(), id));
        }
        let readings = parts.remove_vectors(id).await?;
        parts.headers.remove(id).await?;

        debug!("Removed measurement {} and {} readings", id, readings);
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        self.parts()?.headers.count().await
    }
}
