use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BookingError;

pub type SalonId = String;

/// Opaque booking identifier. Serialized as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for BookingId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// One line of the cart: a service offered by a salon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub name: String,
    pub price: u64,
    /// Minutes.
    pub duration: u32,
}

impl ServiceItem {
    pub fn new(name: impl Into<String>, price: u64, duration: u32) -> Self {
        Self {
            name: name.into(),
            price,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl Customer {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
        }
    }

    pub fn validate(&self) -> Result<(), BookingError> {
        if self.name.trim().is_empty() {
            return Err(BookingError::InvalidBooking("customer name is required".into()));
        }
        if self.phone.trim().is_empty() {
            return Err(BookingError::InvalidBooking("customer phone is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    Queue,
    Appointment,
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            BookingType::Queue => "queue",
            BookingType::Appointment => "appointment",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Waiting,
    InService,
    Completed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Waiting => "waiting",
            BookingStatus::InService => "in_service",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        f.pad(s)
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(BookingStatus::Waiting),
            "in_service" => Ok(BookingStatus::InService),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(BookingError::InvalidBooking(format!(
                "unknown booking status: {other}"
            ))),
        }
    }
}

/// A customer's confirmed reservation, either a walk-in queue spot or a
/// scheduled appointment.
///
/// Identity, cart and totals are fixed at construction. `status` only moves
/// through [`crate::lifecycle`], `payment_id` is written at most once, and the
/// queue fields are owned by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: BookingId,

    // Salon
    pub salon_id: SalonId,
    pub salon_name: String,

    pub customer: Customer,

    // Cart
    pub selected_services: Vec<ServiceItem>,
    pub total_amount: u64,
    pub total_duration: u32,

    #[serde(rename = "type")]
    pub kind: BookingType,
    pub status: BookingStatus,

    // Payment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub is_prepaid: bool,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,

    // Queue view, recomputed by the ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u32>,
}

impl BookingRecord {
    pub fn is_queue(&self) -> bool {
        self.kind == BookingType::Queue
    }

    /// Records a payment confirmation. Refuses to overwrite an existing one.
    pub fn attach_payment(&mut self, payment_id: impl Into<String>) -> Result<(), BookingError> {
        let payment_id = payment_id.into();
        if payment_id.trim().is_empty() {
            return Err(BookingError::InvalidBooking("payment id is empty".into()));
        }
        if self.payment_id.is_some() {
            return Err(BookingError::PaymentAlreadyRecorded(self.id.clone()));
        }
        self.payment_id = Some(payment_id);
        Ok(())
    }

    /// Totals recomputed from the cart; must match the stored ones. A cart
    /// whose sums overflow is never consistent.
    pub fn totals_consistent(&self) -> bool {
        crate::factory::cart_totals(&self.selected_services)
            .is_ok_and(|totals| totals == (self.total_amount, self.total_duration))
    }

    pub(crate) fn clear_queue_view(&mut self) {
        self.queue_position = None;
        self.estimated_wait_time = None;
    }
}
