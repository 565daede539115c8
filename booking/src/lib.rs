//! Booking and queue state for salon walk-ins and appointments.
//!
//! Records live in a key-value [`store::RecordStore`]; queue bookings are also
//! held in a per-salon [`ledger::QueueLedger`]. Every save is announced on the
//! [`notifier::ChangeNotifier`] so views can re-render.

pub mod error;
pub mod factory;
pub mod ledger;
pub mod lifecycle;
pub mod location;
pub mod model;
pub mod notifier;
pub mod payment;
pub mod salon;
pub mod service;
pub mod simulate;
pub mod store;
pub mod time;

pub use error::BookingError;
