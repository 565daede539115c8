use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::error::BookingError;
use crate::factory::{BookingDraft, BookingFactory, cart_totals};
use crate::ledger::QueueLedger;
use crate::lifecycle;
use crate::model::{BookingId, BookingRecord, BookingStatus, BookingType, Customer, ServiceItem};
use crate::payment::PaymentGateway;
use crate::salon::SalonDirectory;
use crate::store::{RecordStore, SALON_QUEUE_KEY, USER_BOOKINGS_KEY};

/// What the customer submits from the booking modal.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub salon_id: String,
    pub customer: Customer,
    pub services: Vec<ServiceItem>,
    pub kind: BookingType,
    /// Pay now through the gateway, or settle at the salon.
    pub prepay: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Copies live queue positions from the ledger onto the user's records of
/// one salon; records no longer queued lose their queue fields.
fn mirror_queue(bookings: &mut [BookingRecord], salon_id: &str, queue: &[BookingRecord]) {
    for b in bookings
        .iter_mut()
        .filter(|b| b.salon_id == salon_id && b.is_queue())
    {
        match queue.iter().find(|e| e.id == b.id) {
            Some(entry) => {
                b.queue_position = entry.queue_position;
                b.estimated_wait_time = entry.estimated_wait_time;
            }
            None => b.clear_queue_view(),
        }
    }
}

/// Coordinates payment, construction, persistence and queueing of bookings.
///
/// `userBookings` and `salon_queue_data` are kept in step: every ledger
/// mutation is followed by one `userBookings` save carrying the new positions.
pub struct BookingService {
    store: Arc<RecordStore>,
    ledger: Arc<QueueLedger>,
    factory: BookingFactory,
    directory: Arc<SalonDirectory>,
    payments: Arc<dyn PaymentGateway>,
    /// Serializes read-modify-write of `userBookings`.
    ops: Mutex<()>,
}

impl BookingService {
    pub fn new(
        store: Arc<RecordStore>,
        ledger: Arc<QueueLedger>,
        factory: BookingFactory,
        directory: Arc<SalonDirectory>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            ledger,
            factory,
            directory,
            payments,
            ops: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<QueueLedger> {
        &self.ledger
    }

    pub fn directory(&self) -> &Arc<SalonDirectory> {
        &self.directory
    }

    /// Pays (when prepaid), builds and persists a booking, and queues it for
    /// walk-ins. Nothing is stored when payment fails.
    #[instrument(skip(self, req), fields(salon_id = %req.salon_id, kind = %req.kind, prepay = req.prepay))]
    pub async fn checkout(&self, req: CheckoutRequest) -> Result<BookingRecord, BookingError> {
        let salon = self
            .directory
            .get(&req.salon_id)
            .ok_or_else(|| BookingError::SalonNotFound(req.salon_id.clone()))?;

        if req.services.is_empty() {
            return Err(BookingError::InvalidBooking("no services selected".into()));
        }
        req.customer.validate()?;
        let (amount, _) = cart_totals(&req.services)?;

        let payment_id = if req.prepay {
            let receipt = self
                .payments
                .process_payment(amount, &req.customer)
                .await
                .inspect_err(|e| warn!(error = %e, amount, "payment failed; booking not created"))?;
            Some(receipt.payment_id)
        } else {
            None
        };

        let mut record = self.factory.create_booking(BookingDraft {
            salon_id: salon.id.clone(),
            salon_name: salon.name.clone(),
            customer: req.customer,
            services: req.services,
            kind: req.kind,
            payment_id,
            is_prepaid: req.prepay,
            scheduled_for: req.scheduled_for,
        })?;

        let _op = self.ops.lock().await;
        let mut bookings = self.store.load_bookings().await;

        if bookings.iter().any(|b| b.id == record.id) {
            error!(booking_id = %record.id, "booking id collision");
            return Err(BookingError::DuplicateId(record.id));
        }

        let mut snapshot = None;
        if record.is_queue() {
            snapshot = Some(self.ledger.queue(&record.salon_id).await);
            self.ledger.join(&record.salon_id, record.clone()).await?;
            let queue = self.ledger.queue(&record.salon_id).await;
            mirror_queue(&mut bookings, &record.salon_id, &queue);
            mirror_queue(std::slice::from_mut(&mut record), &salon.id, &queue);
        }

        bookings.push(record.clone());
        self.commit_bookings(&bookings, &record.salon_id, snapshot).await?;

        info!(
            booking_id = %record.id,
            total_amount = record.total_amount,
            queue_position = ?record.queue_position,
            "booking confirmed"
        );
        Ok(record)
    }

    /// Applies a status change and keeps the salon queue in step.
    /// Terminal statuses remove the booking from the queue.
    #[instrument(skip(self), fields(booking_id = %id, to = %next))]
    pub async fn transition(
        &self,
        id: &BookingId,
        next: BookingStatus,
    ) -> Result<BookingRecord, BookingError> {
        let _op = self.ops.lock().await;
        let mut bookings = self.store.load_bookings().await;

        let idx = bookings
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| BookingError::NotFound(id.clone()))?;

        let from = bookings[idx].status;
        if !bookings[idx].totals_consistent() {
            warn!("stored totals do not match the cart");
        }
        lifecycle::transition(&mut bookings[idx], next)
            .inspect_err(|e| warn!(error = %e, "status change rejected"))?;

        let record = bookings[idx].clone();
        let mut snapshot = None;
        if record.is_queue() {
            snapshot = Some(self.ledger.queue(&record.salon_id).await);
            if next.is_terminal() {
                self.ledger.leave(&record.salon_id, &record.id).await?;
            } else {
                self.ledger.update_entry(&record).await?;
            }
            let queue = self.ledger.queue(&record.salon_id).await;
            mirror_queue(&mut bookings, &record.salon_id, &queue);
        }

        self.commit_bookings(&bookings, &record.salon_id, snapshot).await?;

        info!(%from, "booking status changed");
        Ok(bookings.swap_remove(idx))
    }

    pub async fn start_service(&self, id: &BookingId) -> Result<BookingRecord, BookingError> {
        self.transition(id, BookingStatus::InService).await
    }

    pub async fn complete(&self, id: &BookingId) -> Result<BookingRecord, BookingError> {
        self.transition(id, BookingStatus::Completed).await
    }

    pub async fn cancel(&self, id: &BookingId) -> Result<BookingRecord, BookingError> {
        self.transition(id, BookingStatus::Cancelled).await
    }

    /// Records a payment settled after booking (pay-at-salon). Never
    /// overwrites an existing payment id.
    #[instrument(skip(self))]
    pub async fn attach_payment(
        &self,
        id: &BookingId,
        payment_id: &str,
    ) -> Result<BookingRecord, BookingError> {
        let _op = self.ops.lock().await;
        let mut bookings = self.store.load_bookings().await;

        let record = bookings
            .iter_mut()
            .find(|b| &b.id == id)
            .ok_or_else(|| BookingError::NotFound(id.clone()))?;
        record.attach_payment(payment_id)?;
        let record = record.clone();

        let mut snapshot = None;
        if record.is_queue() {
            snapshot = Some(self.ledger.queue(&record.salon_id).await);
            self.ledger.update_entry(&record).await?;
        }
        self.commit_bookings(&bookings, &record.salon_id, snapshot).await?;

        Ok(record)
    }

    pub async fn my_bookings(&self) -> Vec<BookingRecord> {
        self.store.load_bookings().await
    }

    pub async fn booking(&self, id: &BookingId) -> Option<BookingRecord> {
        self.store
            .load_bookings()
            .await
            .into_iter()
            .find(|b| &b.id == id)
    }

    pub async fn queue(&self, salon_id: &str) -> Vec<BookingRecord> {
        self.ledger.queue(salon_id).await
    }

    pub fn estimate_wait(&self, salon_id: &str, position: u32) -> u32 {
        self.ledger.estimate_wait(salon_id, position)
    }

    /// Saves the booking list. When that fails after the salon queue was
    /// already changed, the queue is put back to `snapshot` so the two
    /// collections keep agreeing.
    async fn commit_bookings(
        &self,
        bookings: &[BookingRecord],
        salon_id: &str,
        snapshot: Option<Vec<BookingRecord>>,
    ) -> Result<(), BookingError> {
        let Err(e) = self.store.save_bookings(bookings).await else {
            return Ok(());
        };

        if let Some(snapshot) = snapshot {
            if let Err(rollback) = self.ledger.restore(salon_id, snapshot).await {
                error!(error = %rollback, salon_id, "queue rollback failed");
            }
        }
        Err(e)
    }

    /// Drops every booking and every queue.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<(), BookingError> {
        let _op = self.ops.lock().await;
        self.store.clear(USER_BOOKINGS_KEY).await?;
        self.store.clear(SALON_QUEUE_KEY).await?;
        info!("all bookings and queues cleared");
        Ok(())
    }
}
