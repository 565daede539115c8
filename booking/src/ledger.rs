use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::BookingError;
use crate::model::{BookingId, BookingRecord, SalonId};
use crate::store::{RecordStore, SalonQueues};

/// Average minutes per customer, per salon, with a fallback default.
///
/// Values normally come from the salon catalog; the default comes from config.
#[derive(Debug, Clone)]
pub struct ServiceTimes {
    default_minutes: u32,
    per_salon: HashMap<SalonId, u32>,
}

impl ServiceTimes {
    pub fn new(default_minutes: u32) -> Self {
        Self {
            default_minutes,
            per_salon: HashMap::new(),
        }
    }

    pub fn with_salon(mut self, salon_id: impl Into<SalonId>, minutes: u32) -> Self {
        self.per_salon.insert(salon_id.into(), minutes);
        self
    }

    pub fn average_for(&self, salon_id: &str) -> u32 {
        self.per_salon
            .get(salon_id)
            .copied()
            .unwrap_or(self.default_minutes)
    }
}

/// Assigns 1-indexed positions in join order and the matching wait estimate.
fn reindex(entries: &mut [BookingRecord], avg_minutes: u32) {
    for (i, entry) in entries.iter_mut().enumerate() {
        let position = i as u32 + 1;
        entry.queue_position = Some(position);
        entry.estimated_wait_time = Some(position.saturating_mul(avg_minutes));
    }
}

/// Per-salon FIFO of live queue bookings, persisted under `salon_queue_data`.
///
/// Every mutation rewrites positions and wait estimates for the whole salon
/// queue before saving, so stored positions are never stale.
pub struct QueueLedger {
    store: Arc<RecordStore>,
    times: ServiceTimes,
    /// Serializes load-modify-save cycles.
    ops: Mutex<()>,
}

impl QueueLedger {
    pub fn new(store: Arc<RecordStore>, times: ServiceTimes) -> Self {
        Self {
            store,
            times,
            ops: Mutex::new(()),
        }
    }

    pub fn estimate_wait(&self, salon_id: &str, position: u32) -> u32 {
        position.saturating_mul(self.times.average_for(salon_id))
    }

    pub async fn queue(&self, salon_id: &str) -> Vec<BookingRecord> {
        self.store
            .load_queues()
            .await
            .remove(salon_id)
            .unwrap_or_default()
    }

    pub async fn queues(&self) -> SalonQueues {
        self.store.load_queues().await
    }

    /// Appends `record` to the salon's queue and returns its position.
    #[instrument(skip(self, record), fields(booking_id = %record.id))]
    pub async fn join(&self, salon_id: &str, record: BookingRecord) -> Result<u32, BookingError> {
        if !record.is_queue() {
            return Err(BookingError::InvalidBooking(format!(
                "{} is not a queue booking",
                record.id
            )));
        }
        if record.salon_id != salon_id {
            return Err(BookingError::InvalidBooking(format!(
                "{} belongs to salon {}",
                record.id, record.salon_id
            )));
        }
        if record.status.is_terminal() {
            return Err(BookingError::InvalidBooking(format!(
                "{} is already {}",
                record.id, record.status
            )));
        }

        let _op = self.ops.lock().await;
        let mut queues = self.store.load_queues().await;

        if queues.values().flatten().any(|e| e.id == record.id) {
            warn!("booking already present in a queue");
            return Err(BookingError::DuplicateId(record.id));
        }

        let entries = queues.entry(salon_id.to_string()).or_default();
        entries.push(record);
        reindex(entries, self.times.average_for(salon_id));
        let position = entries.len() as u32;

        self.store.save_queues(&queues).await?;

        info!(position, "joined queue");
        Ok(position)
    }

    /// Removes the entry; later entries move up one place. Returns false and
    /// writes nothing when the booking is not in this salon's queue.
    #[instrument(skip(self))]
    pub async fn leave(&self, salon_id: &str, booking_id: &BookingId) -> Result<bool, BookingError> {
        let _op = self.ops.lock().await;
        let mut queues = self.store.load_queues().await;

        let Some(entries) = queues.get_mut(salon_id) else {
            debug!("salon has no queue; leave is a no-op");
            return Ok(false);
        };
        let Some(idx) = entries.iter().position(|e| &e.id == booking_id) else {
            debug!("booking not queued; leave is a no-op");
            return Ok(false);
        };

        entries.remove(idx);
        reindex(entries, self.times.average_for(salon_id));
        if entries.is_empty() {
            queues.remove(salon_id);
        }

        self.store.save_queues(&queues).await?;

        info!(from_position = idx + 1, "left queue");
        Ok(true)
    }

    /// Replaces the stored copy of a queued booking, keeping its place.
    #[instrument(skip(self, record), fields(booking_id = %record.id, status = %record.status))]
    pub async fn update_entry(&self, record: &BookingRecord) -> Result<bool, BookingError> {
        let _op = self.ops.lock().await;
        let mut queues = self.store.load_queues().await;

        let Some(entries) = queues.get_mut(&record.salon_id) else {
            return Ok(false);
        };
        let Some(slot) = entries.iter_mut().find(|e| e.id == record.id) else {
            return Ok(false);
        };

        *slot = record.clone();
        reindex(entries, self.times.average_for(&record.salon_id));

        self.store.save_queues(&queues).await?;
        Ok(true)
    }

    /// Puts a salon queue back to a previously read snapshot. Used to undo a
    /// ledger change whose matching booking-list save failed.
    #[instrument(skip(self, snapshot), fields(entries = snapshot.len()))]
    pub async fn restore(
        &self,
        salon_id: &str,
        snapshot: Vec<BookingRecord>,
    ) -> Result<(), BookingError> {
        let _op = self.ops.lock().await;
        let mut queues = self.store.load_queues().await;

        if snapshot.is_empty() {
            queues.remove(salon_id);
        } else {
            queues.insert(salon_id.to_string(), snapshot);
        }

        self.store.save_queues(&queues).await?;
        warn!("salon queue restored from snapshot");
        Ok(())
    }
}
