use std::sync::Arc;

use chrono::TimeZone;
use parking_lot::Mutex;
use tokio::test;

use booking::BookingError;
use booking::model::{BookingId, BookingRecord, BookingStatus, BookingType, ServiceItem};
use booking::payment::PaymentError;
use booking::service::CheckoutRequest;
use booking::store::{KeyValueStore, SALON_QUEUE_KEY, USER_BOOKINGS_KEY};

use mock_store::{beard_trim, customer, harness, haircut, service_over};

fn walk_in(name: &str, services: Vec<ServiceItem>) -> CheckoutRequest {
    CheckoutRequest {
        salon_id: "fade-factory".into(),
        customer: customer(name),
        services,
        kind: BookingType::Queue,
        prepay: true,
        scheduled_for: None,
    }
}

fn positions(records: &[BookingRecord]) -> Vec<Option<u32>> {
    records.iter().map(|r| r.queue_position).collect()
}

#[test]
async fn checkout_into_empty_queue() -> anyhow::Result<()> {
    let h = harness();

    let r = h
        .service
        .checkout(walk_in("Ravi", vec![haircut(), beard_trim()]))
        .await?;

    assert_eq!(r.total_amount, 450);
    assert_eq!(r.total_duration, 50);
    assert_eq!(r.status, BookingStatus::Waiting);
    assert_eq!(r.queue_position, Some(1));
    assert_eq!(r.estimated_wait_time, Some(25));
    assert!(r.is_prepaid);
    assert!(r.payment_id.as_deref().unwrap().starts_with("pay_"));
    assert_eq!(r.salon_name, "Fade Factory");

    // Both collections carry the booking.
    assert_eq!(h.service.my_bookings().await, vec![r.clone()]);
    assert_eq!(h.service.queue("fade-factory").await, vec![r]);

    Ok(())
}

#[test]
async fn fourth_walk_in_gets_position_four() -> anyhow::Result<()> {
    let h = harness();
    for name in ["A", "B", "C"] {
        h.service.checkout(walk_in(name, vec![haircut()])).await?;
    }

    let fourth = h.service.checkout(walk_in("D", vec![haircut()])).await?;

    assert_eq!(fourth.queue_position, Some(4));
    assert_eq!(fourth.estimated_wait_time, Some(100));
    assert_eq!(h.service.estimate_wait("fade-factory", 4), 100);

    let mine = h.service.my_bookings().await;
    assert_eq!(positions(&mine), vec![Some(1), Some(2), Some(3), Some(4)]);

    Ok(())
}

#[test]
async fn declined_payment_creates_nothing() -> anyhow::Result<()> {
    let h = harness();
    let expensive = ServiceItem::new("Bridal Package", 5_000, 180);

    let err = h
        .service
        .checkout(walk_in("Ravi", vec![expensive]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BookingError::PaymentFailure(PaymentError::Declined(_))
    ));
    assert!(h.service.my_bookings().await.is_empty());
    assert!(h.service.queue("fade-factory").await.is_empty());
    assert!(h.backend.get(USER_BOOKINGS_KEY).await?.is_none());

    Ok(())
}

#[test]
async fn pay_at_salon_skips_gateway_and_can_attach_later() -> anyhow::Result<()> {
    let h = harness();
    let mut req = walk_in("Ravi", vec![haircut()]);
    req.prepay = false;

    let r = h.service.checkout(req).await?;
    assert!(!r.is_prepaid);
    assert!(r.payment_id.is_none());

    let paid = h.service.attach_payment(&r.id, "pay_counter01").await?;
    assert_eq!(paid.payment_id.as_deref(), Some("pay_counter01"));
    assert_eq!(
        h.service.queue("fade-factory").await[0].payment_id.as_deref(),
        Some("pay_counter01")
    );

    let err = h
        .service
        .attach_payment(&r.id, "pay_other")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::PaymentAlreadyRecorded(_)));
    assert_eq!(
        h.service.booking(&r.id).await.unwrap().payment_id.as_deref(),
        Some("pay_counter01")
    );

    Ok(())
}

#[test]
async fn unknown_salon_and_empty_cart_are_rejected() {
    let h = harness();

    let mut req = walk_in("Ravi", vec![haircut()]);
    req.salon_id = "nowhere".into();
    assert!(matches!(
        h.service.checkout(req).await,
        Err(BookingError::SalonNotFound(_))
    ));

    assert!(matches!(
        h.service.checkout(walk_in("Ravi", vec![])).await,
        Err(BookingError::InvalidBooking(_))
    ));
}

#[test]
async fn appointment_is_not_queued() -> anyhow::Result<()> {
    let h = harness();
    let slot = chrono::Utc.with_ymd_and_hms(2024, 6, 2, 16, 30, 0).unwrap();

    let mut req = walk_in("Ravi", vec![haircut()]);
    req.kind = BookingType::Appointment;
    req.scheduled_for = Some(slot);

    let r = h.service.checkout(req).await?;

    assert_eq!(r.kind, BookingType::Appointment);
    assert_eq!(r.scheduled_for, Some(slot));
    assert!(r.queue_position.is_none());
    assert!(h.service.queue("fade-factory").await.is_empty());
    assert_eq!(h.service.my_bookings().await.len(), 1);

    Ok(())
}

#[test]
async fn completing_head_moves_everyone_up() -> anyhow::Result<()> {
    let h = harness();
    let a = h.service.checkout(walk_in("A", vec![haircut()])).await?;
    let b = h.service.checkout(walk_in("B", vec![haircut()])).await?;
    let c = h.service.checkout(walk_in("C", vec![haircut()])).await?;

    let started = h.service.start_service(&a.id).await?;
    assert_eq!(started.status, BookingStatus::InService);
    assert_eq!(started.queue_position, Some(1));

    let done = h.service.complete(&a.id).await?;
    assert_eq!(done.status, BookingStatus::Completed);
    assert!(done.queue_position.is_none());
    assert!(done.estimated_wait_time.is_none());

    let queue = h.service.queue("fade-factory").await;
    let ids: Vec<_> = queue.iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids, vec![b.id.clone(), c.id.clone()]);

    let b_now = h.service.booking(&b.id).await.unwrap();
    let c_now = h.service.booking(&c.id).await.unwrap();
    assert_eq!(b_now.queue_position, Some(1));
    assert_eq!(b_now.estimated_wait_time, Some(25));
    assert_eq!(c_now.queue_position, Some(2));

    Ok(())
}

#[test]
async fn cancelling_middle_entry_shifts_only_later_ones() -> anyhow::Result<()> {
    let h = harness();
    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        ids.push(h.service.checkout(walk_in(name, vec![haircut()])).await?.id);
    }

    h.service.cancel(&ids[1]).await?;

    let mine = h.service.my_bookings().await;
    assert_eq!(positions(&mine), vec![Some(1), None, Some(2), Some(3)]);
    assert_eq!(mine[1].status, BookingStatus::Cancelled);

    Ok(())
}

#[test]
async fn invalid_transitions_leave_state_untouched() -> anyhow::Result<()> {
    let h = harness();
    let a = h.service.checkout(walk_in("A", vec![haircut()])).await?;
    let before = h.service.my_bookings().await;

    let err = h.service.complete(&a.id).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: BookingStatus::Waiting,
            to: BookingStatus::Completed,
            ..
        }
    ));
    assert_eq!(h.service.my_bookings().await, before);

    h.service.cancel(&a.id).await?;
    for next in [
        BookingStatus::Waiting,
        BookingStatus::InService,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ] {
        assert!(h.service.transition(&a.id, next).await.is_err());
    }

    assert!(matches!(
        h.service.cancel(&BookingId::new("ghost")).await,
        Err(BookingError::NotFound(_))
    ));

    Ok(())
}

#[test]
async fn save_failure_keeps_previous_state() -> anyhow::Result<()> {
    let h = harness();
    let a = h.service.checkout(walk_in("A", vec![haircut()])).await?;
    let bookings_before = h.service.my_bookings().await;
    let queue_before = h.service.queue("fade-factory").await;

    h.backend.fail_writes(true);
    let err = h
        .service
        .checkout(walk_in("B", vec![haircut()]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::StorageWrite { .. }));
    assert!(h.service.start_service(&a.id).await.is_err());
    h.backend.fail_writes(false);

    assert_eq!(h.service.my_bookings().await, bookings_before);
    assert_eq!(h.service.queue("fade-factory").await, queue_before);

    Ok(())
}

#[test]
async fn failed_booking_save_restores_salon_queue() -> anyhow::Result<()> {
    let h = harness();
    let a = h.service.checkout(walk_in("A", vec![haircut()])).await?;
    let mut req = walk_in("B", vec![haircut()]);
    req.prepay = false;
    let b = h.service.checkout(req).await?;

    let bookings_before = h.service.my_bookings().await;
    let queue_before = h.service.queue("fade-factory").await;

    // The queue write succeeds, the booking list write does not.
    h.backend.fail_writes_for(Some(USER_BOOKINGS_KEY));

    let err = h.service.cancel(&a.id).await.unwrap_err();
    assert!(matches!(err, BookingError::StorageWrite { .. }));
    assert_eq!(h.service.queue("fade-factory").await, queue_before);

    assert!(h.service.start_service(&a.id).await.is_err());
    assert_eq!(h.service.queue("fade-factory").await, queue_before);

    assert!(h.service.attach_payment(&b.id, "pay_counter01").await.is_err());
    let queue = h.service.queue("fade-factory").await;
    assert_eq!(queue, queue_before);
    assert!(queue[1].payment_id.is_none());

    assert_eq!(h.service.my_bookings().await, bookings_before);

    // Once storage recovers the same operations go through.
    h.backend.fail_writes_for(None);
    h.service.attach_payment(&b.id, "pay_counter01").await?;
    h.service.cancel(&a.id).await?;

    let queue = h.service.queue("fade-factory").await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, b.id);
    assert_eq!(queue[0].queue_position, Some(1));
    assert_eq!(queue[0].payment_id.as_deref(), Some("pay_counter01"));
    assert_eq!(
        h.service.booking(&b.id).await.unwrap().queue_position,
        Some(1)
    );

    Ok(())
}

#[test]
async fn id_collision_with_stored_booking_is_fatal() -> anyhow::Result<()> {
    let h = harness();
    let other_tab = service_over(h.store.clone());

    let first = h.service.checkout(walk_in("A", vec![haircut()])).await?;
    let appt = h
        .service
        .checkout(CheckoutRequest {
            kind: BookingType::Appointment,
            scheduled_for: Some(chrono::Utc.with_ymd_and_hms(2024, 6, 2, 10, 0, 0).unwrap()),
            ..walk_in("B", vec![haircut()])
        })
        .await?;
    assert_eq!(first.id.as_str(), "bk-1");
    assert_eq!(appt.id.as_str(), "bk-2");

    let bookings_before = h.service.my_bookings().await;
    let queues_before = h.service.ledger().queues().await;

    // The second service's sequence starts over and re-issues bk-1, bk-2.
    let err = other_tab
        .checkout(walk_in("C", vec![haircut()]))
        .await
        .unwrap_err();
    assert!(matches!(&err, BookingError::DuplicateId(id) if id.as_str() == "bk-1"));
    assert!(err.is_fatal());

    let err = other_tab
        .checkout(CheckoutRequest {
            kind: BookingType::Appointment,
            scheduled_for: Some(chrono::Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()),
            ..walk_in("D", vec![haircut()])
        })
        .await
        .unwrap_err();
    assert!(matches!(&err, BookingError::DuplicateId(id) if id.as_str() == "bk-2"));
    assert!(err.is_fatal());

    assert_eq!(h.service.my_bookings().await, bookings_before);
    assert_eq!(h.service.ledger().queues().await, queues_before);

    Ok(())
}

#[test]
async fn corrupt_bookings_load_as_empty() -> anyhow::Result<()> {
    let h = harness();
    h.backend.set(USER_BOOKINGS_KEY, "[{\"id\": ").await?;

    assert!(h.service.my_bookings().await.is_empty());

    // The next checkout starts a fresh collection.
    h.service.checkout(walk_in("A", vec![haircut()])).await?;
    assert_eq!(h.service.my_bookings().await.len(), 1);

    Ok(())
}

#[test]
async fn clear_all_wipes_both_collections_and_notifies() -> anyhow::Result<()> {
    let h = harness();
    h.service.checkout(walk_in("A", vec![haircut()])).await?;

    let cleared = Arc::new(Mutex::new(Vec::new()));
    for key in [USER_BOOKINGS_KEY, SALON_QUEUE_KEY] {
        let sink = Arc::clone(&cleared);
        h.store
            .notifier()
            .subscribe(key, move |e| sink.lock().push((e.key.clone(), e.new_value.clone())));
    }

    h.service.clear_all().await?;

    assert!(h.service.my_bookings().await.is_empty());
    assert!(h.service.ledger().queues().await.is_empty());
    assert_eq!(
        *cleared.lock(),
        vec![
            (USER_BOOKINGS_KEY.to_string(), None),
            (SALON_QUEUE_KEY.to_string(), None)
        ]
    );

    Ok(())
}

#[test]
async fn observers_see_queue_then_bookings_for_each_checkout() -> anyhow::Result<()> {
    let h = harness();
    let order = Arc::new(Mutex::new(Vec::new()));
    for key in [USER_BOOKINGS_KEY, SALON_QUEUE_KEY] {
        let sink = Arc::clone(&order);
        h.store
            .notifier()
            .subscribe(key, move |e| sink.lock().push(e.key.clone()));
    }

    h.service.checkout(walk_in("A", vec![haircut()])).await?;

    assert_eq!(
        *order.lock(),
        vec![SALON_QUEUE_KEY.to_string(), USER_BOOKINGS_KEY.to_string()]
    );

    Ok(())
}

#[test]
async fn booking_ids_are_unique_across_checkouts() -> anyhow::Result<()> {
    let h = harness();
    let mut seen = std::collections::HashSet::new();
    for i in 0..20 {
        let r = h
            .service
            .checkout(walk_in(&format!("C{i}"), vec![haircut()]))
            .await?;
        assert!(seen.insert(r.id));
    }
    Ok(())
}
