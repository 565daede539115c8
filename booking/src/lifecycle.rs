//! Booking status transitions.
//!
//! ```text
//! waiting ──> in_service ──> completed
//!    │            │
//!    └────────────┴────────> cancelled
//! ```
//!
//! Nothing returns to `waiting`, and the two terminal states accept no
//! further transitions.

use crate::error::BookingError;
use crate::model::{BookingRecord, BookingStatus};

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Waiting, InService) | (Waiting, Cancelled) | (InService, Completed) | (InService, Cancelled)
        )
    }
}

/// Moves `record` to `next`. On rejection the record is left untouched.
pub fn transition(record: &mut BookingRecord, next: BookingStatus) -> Result<(), BookingError> {
    if !record.status.can_transition_to(next) {
        return Err(BookingError::InvalidTransition {
            id: record.id.clone(),
            from: record.status,
            to: next,
        });
    }
    record.status = next;
    Ok(())
}
