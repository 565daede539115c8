//! Drives a salon queue without a UI: seeds walk-in customers and moves the
//! queue forward, so anything subscribed to the change notifier sees the same
//! stream of updates a live salon would produce.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::BookingError;
use crate::model::{BookingId, BookingRecord, BookingStatus, BookingType, Customer, ServiceItem};
use crate::service::{BookingService, CheckoutRequest};

/// Result of one [`QueueSimulator::advance`] step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceOutcome {
    pub completed: Option<BookingId>,
    pub started: Option<BookingId>,
}

impl AdvanceOutcome {
    pub fn is_idle(&self) -> bool {
        self.completed.is_none() && self.started.is_none()
    }
}

pub struct QueueSimulator {
    service: Arc<BookingService>,
    seeded: usize,
}

impl QueueSimulator {
    pub fn new(service: Arc<BookingService>) -> Self {
        Self { service, seeded: 0 }
    }

    /// Joins `count` synthetic pay-at-salon walk-ins, each taking the salon's
    /// first offered service.
    #[instrument(skip(self))]
    pub async fn seed_walk_ins(
        &mut self,
        salon_id: &str,
        count: usize,
    ) -> Result<Vec<BookingRecord>, BookingError> {
        let service = self
            .service
            .directory()
            .get(salon_id)
            .ok_or_else(|| BookingError::SalonNotFound(salon_id.to_string()))?
            .services
            .first()
            .cloned()
            .unwrap_or_else(|| ServiceItem::new("Haircut", 300, 30));

        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            self.seeded += 1;
            let n = self.seeded;
            let record = self
                .service
                .checkout(CheckoutRequest {
                    salon_id: salon_id.to_string(),
                    customer: Customer::new(
                        format!("Walk-in {n}"),
                        format!("90000{n:05}"),
                        String::new(),
                    ),
                    services: vec![service.clone()],
                    kind: BookingType::Queue,
                    prepay: false,
                    scheduled_for: None,
                })
                .await?;
            created.push(record);
        }

        info!(count, "walk-ins seeded");
        Ok(created)
    }

    /// Completes the customer currently in service (if any) and starts the
    /// first one still waiting (if any).
    #[instrument(skip(self))]
    pub async fn advance(&self, salon_id: &str) -> Result<AdvanceOutcome, BookingError> {
        let queue = self.service.queue(salon_id).await;
        let mut outcome = AdvanceOutcome::default();

        if let Some(current) = queue.iter().find(|e| e.status == BookingStatus::InService) {
            self.service.complete(&current.id).await?;
            outcome.completed = Some(current.id.clone());
        }

        if let Some(next) = queue.iter().find(|e| e.status == BookingStatus::Waiting) {
            self.service.start_service(&next.id).await?;
            outcome.started = Some(next.id.clone());
        }

        info!(
            completed = ?outcome.completed,
            started = ?outcome.started,
            "queue advanced"
        );
        Ok(outcome)
    }

    /// Advances until the queue is empty or `max_steps` is reached; returns
    /// the number of productive steps.
    pub async fn drain(&self, salon_id: &str, max_steps: usize) -> Result<usize, BookingError> {
        let mut steps = 0;
        while steps < max_steps {
            if self.advance(salon_id).await?.is_idle() {
                break;
            }
            steps += 1;
        }
        Ok(steps)
    }
}
