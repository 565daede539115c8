pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::logger::warn_if_slow;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::BookingError;
use crate::model::{BookingRecord, SalonId};
use crate::notifier::ChangeNotifier;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Every booking the customer has made, as a JSON array.
pub const USER_BOOKINGS_KEY: &str = "userBookings";
/// Per-salon live queues, as a JSON object of salonId -> array.
pub const SALON_QUEUE_KEY: &str = "salon_queue_data";

pub type SalonQueues = BTreeMap<SalonId, Vec<BookingRecord>>;

/// Raw text key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Replaces the whole value in one write.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Typed collections over a [`KeyValueStore`].
///
/// Reads fail soft: a missing, unreadable or corrupt collection loads as
/// empty. Writes serialize the full collection before touching the backend,
/// so a failed save leaves the previous value in place. `save` and `clear`
/// are the only mutation points and are serialized by `write_gate`, which also
/// keeps change events for one key in save order.
pub struct RecordStore {
    backend: Arc<dyn KeyValueStore>,
    notifier: Arc<ChangeNotifier>,
    write_gate: Mutex<()>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            backend,
            notifier,
            write_gate: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    #[instrument(skip(self))]
    pub async fn load<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        match self.try_load(key).await {
            Ok(Some(v)) => v,
            Ok(None) => {
                debug!("collection absent; starting empty");
                T::default()
            }
            Err(e) => {
                warn!(error = %e, "collection unreadable; treating as empty");
                T::default()
            }
        }
    }

    /// Strict read used by `load`; `Ok(None)` when the key is absent.
    pub async fn try_load<T>(&self, key: &str) -> Result<Option<T>, BookingError>
    where
        T: DeserializeOwned,
    {
        let raw = warn_if_slow("kv_get", Duration::from_millis(50), self.backend.get(key))
            .await
            .map_err(|e| BookingError::StorageRead {
                key: key.to_string(),
                reason: format!("{e:#}"),
            })?;

        let Some(raw) = raw else { return Ok(None) };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| BookingError::StorageRead {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    #[instrument(skip(self, value))]
    pub async fn save<T>(&self, key: &str, value: &T) -> Result<(), BookingError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value).map_err(|e| BookingError::write(key, e))?;

        let _gate = self.write_gate.lock().await;

        warn_if_slow("kv_set", Duration::from_millis(50), self.backend.set(key, &encoded))
            .await
            .map_err(|e| {
                error!(error = %e, "collection save failed; previous value kept");
                BookingError::write(key, e)
            })?;

        debug!(bytes = encoded.len(), "collection saved");
        self.notifier.notify(key, Some(encoded));
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, key: &str) -> Result<(), BookingError> {
        let _gate = self.write_gate.lock().await;

        self.backend
            .remove(key)
            .await
            .map_err(|e| BookingError::write(key, e))?;

        info!("collection cleared");
        self.notifier.notify(key, None);
        Ok(())
    }

    pub async fn load_bookings(&self) -> Vec<BookingRecord> {
        self.load(USER_BOOKINGS_KEY).await
    }

    pub async fn save_bookings(&self, bookings: &[BookingRecord]) -> Result<(), BookingError> {
        self.save(USER_BOOKINGS_KEY, bookings).await
    }

    pub async fn load_queues(&self) -> SalonQueues {
        self.load(SALON_QUEUE_KEY).await
    }

    pub async fn save_queues(&self, queues: &SalonQueues) -> Result<(), BookingError> {
        self.save(SALON_QUEUE_KEY, queues).await
    }
}
