use thiserror::Error;

use crate::model::{BookingId, BookingStatus, SalonId};
use crate::payment::PaymentError;

#[derive(Error, Debug)]
pub enum BookingError {
    /// Unreadable or corrupt collection. `RecordStore::load` recovers from this
    /// locally; it is only surfaced by callers that want to report it.
    #[error("failed to read collection '{key}': {reason}")]
    StorageRead { key: String, reason: String },

    #[error("failed to save collection '{key}'")]
    StorageWrite {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("booking {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("payment failed: {0}")]
    PaymentFailure(#[from] PaymentError),

    #[error("duplicate booking id: {0}")]
    DuplicateId(BookingId),

    #[error("invalid booking: {0}")]
    InvalidBooking(String),

    #[error("payment already recorded for booking {0}")]
    PaymentAlreadyRecorded(BookingId),

    #[error("booking not found: {0}")]
    NotFound(BookingId),

    #[error("salon not found: {0}")]
    SalonNotFound(SalonId),
}

impl BookingError {
    pub(crate) fn write(
        key: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        BookingError::StorageWrite {
            key: key.to_string(),
            source: source.into(),
        }
    }

    /// Errors that indicate corrupted invariants rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BookingError::DuplicateId(_))
    }
}
