use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::BookingError;
use crate::model::{BookingId, BookingRecord, BookingStatus, BookingType, Customer, SalonId, ServiceItem};
use crate::time::{Clock, SystemClock};

/// Source of booking ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> BookingId;
}

/// UUID v7: a millisecond timestamp followed by random bits, so ids sort by
/// creation time and do not collide within a session.
#[derive(Debug, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> BookingId {
        BookingId::new(Uuid::now_v7().to_string())
    }
}

/// Monotonic `<prefix>-<n>` ids, starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> BookingId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        BookingId::new(format!("{}-{}", self.prefix, n))
    }
}

/// Everything needed to build a booking after payment has been settled.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub salon_id: SalonId,
    pub salon_name: String,
    pub customer: Customer,
    pub services: Vec<ServiceItem>,
    pub kind: BookingType,
    pub payment_id: Option<String>,
    pub is_prepaid: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Sum of prices and durations over a cart, failing on overflow.
pub fn cart_totals(services: &[ServiceItem]) -> Result<(u64, u32), BookingError> {
    services.iter().try_fold((0u64, 0u32), |(amount, duration), s| {
        let amount = amount
            .checked_add(s.price)
            .ok_or_else(|| BookingError::InvalidBooking("total amount overflows".into()))?;
        let duration = duration
            .checked_add(s.duration)
            .ok_or_else(|| BookingError::InvalidBooking("total duration overflows".into()))?;
        Ok((amount, duration))
    })
}

/// Builds booking records. Pure construction; persisting the result is the
/// caller's job.
pub struct BookingFactory {
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Default for BookingFactory {
    fn default() -> Self {
        Self::new(Arc::new(UuidIds), Arc::new(SystemClock))
    }
}

impl BookingFactory {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { ids, clock }
    }

    pub fn create_booking(&self, draft: BookingDraft) -> Result<BookingRecord, BookingError> {
        if draft.services.is_empty() {
            return Err(BookingError::InvalidBooking("no services selected".into()));
        }
        draft.customer.validate()?;

        let payment_id = draft.payment_id.filter(|p| !p.trim().is_empty());
        if draft.is_prepaid && payment_id.is_none() {
            return Err(BookingError::InvalidBooking(
                "prepaid booking requires a payment id".into(),
            ));
        }

        let scheduled_for = match draft.kind {
            BookingType::Appointment => Some(draft.scheduled_for.ok_or_else(|| {
                BookingError::InvalidBooking("appointment requires a time slot".into())
            })?),
            BookingType::Queue => None,
        };

        let (total_amount, total_duration) = cart_totals(&draft.services)?;

        Ok(BookingRecord {
            id: self.ids.next_id(),
            salon_id: draft.salon_id,
            salon_name: draft.salon_name,
            customer: draft.customer,
            selected_services: draft.services,
            total_amount,
            total_duration,
            kind: draft.kind,
            status: BookingStatus::Waiting,
            payment_id,
            is_prepaid: draft.is_prepaid,
            created_at: self.clock.now(),
            scheduled_for,
            queue_position: None,
            estimated_wait_time: None,
        })
    }
}
