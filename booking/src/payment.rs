use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::Customer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment cancelled by customer")]
    Cancelled,

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub amount: u64,
}

/// External payment processor. Opaque to the booking core.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn process_payment(
        &self,
        amount: u64,
        customer: &Customer,
    ) -> Result<PaymentReceipt, PaymentError>;
}

/// Offline gateway for demos and tests. Approves everything up to
/// `decline_above` and issues `pay_<hex>` ids.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    decline_above: Option<u64>,
}

impl SimulatedGateway {
    pub fn new(decline_above: Option<u64>) -> Self {
        Self { decline_above }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn process_payment(
        &self,
        amount: u64,
        customer: &Customer,
    ) -> Result<PaymentReceipt, PaymentError> {
        if amount == 0 {
            return Err(PaymentError::Declined("amount must be positive".into()));
        }
        if let Some(limit) = self.decline_above.filter(|limit| amount > *limit) {
            warn!(amount, limit, "simulated payment declined");
            return Err(PaymentError::Declined(format!("amount {amount} exceeds limit {limit}")));
        }

        let payment_id = format!("pay_{}", &Uuid::new_v4().simple().to_string()[..14]);
        info!(amount, customer = %customer.name, payment_id = %payment_id, "simulated payment captured");

        Ok(PaymentReceipt { payment_id, amount })
    }
}
