use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Root span for one user-facing flow (a checkout, a queue advance, a CLI command).
pub fn flow_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "flow",
        name = %name,
        trace_id = %trace_id,
        salon_id = field::Empty,
        booking_id = field::Empty
    )
}

/// Child span; inherits trace_id from the enclosing flow.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "child",
        name = %name,
        salon_id = field::Empty,
        booking_id = field::Empty
    )
}

/// Records salon / booking identifiers on the current span once they are known.
pub fn annotate_span(salon_id: &str, booking_id: Option<&str>) {
    let span = Span::current();
    span.record("salon_id", field::display(salon_id));
    if let Some(bid) = booking_id {
        span.record("booking_id", field::display(bid));
    }
}

/// Awaits `fut` and emits a `performance` warning when it takes longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
