use std::sync::Arc;

use anyhow::{Context, bail};
use booking::location::LocationProvider;
use booking::model::{BookingId, BookingRecord, BookingType};
use booking::service::CheckoutRequest;
use booking::simulate::QueueSimulator;
use booking::store::{SALON_QUEUE_KEY, SalonQueues, USER_BOOKINGS_KEY};
use common::logger::{annotate_span, child_span};
use tracing::{Instrument, info};

use crate::App;
use crate::cli::{Command, JoinArgs, SearchArgs, SimulateArgs};

pub async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search(args) => search(app, args).await,
        Command::Join(args) => join(app, args).await,
        Command::Bookings => {
            let bookings = app.service.my_bookings().await;
            if bookings.is_empty() {
                println!("No bookings yet.");
            }
            for b in &bookings {
                print_booking(b);
            }
            Ok(())
        }
        Command::Queue { salon } => {
            annotate_span(&salon, None);
            print_queue(&salon, &app.service.queue(&salon).await);
            Ok(())
        }
        Command::Start { booking_id } => {
            let id = BookingId::new(booking_id);
            print_booking(&app.service.start_service(&id).await?);
            Ok(())
        }
        Command::Complete { booking_id } => {
            let id = BookingId::new(booking_id);
            print_booking(&app.service.complete(&id).await?);
            Ok(())
        }
        Command::Cancel { booking_id } => {
            let id = BookingId::new(booking_id);
            print_booking(&app.service.cancel(&id).await?);
            Ok(())
        }
        Command::Pay {
            booking_id,
            payment_id,
        } => {
            let id = BookingId::new(booking_id);
            print_booking(&app.service.attach_payment(&id, &payment_id).await?);
            Ok(())
        }
        Command::Simulate(args) => simulate(app, args).await,
        Command::Clear => {
            app.service.clear_all().await?;
            println!("All bookings and queues cleared.");
            Ok(())
        }
    }
}

async fn search(app: &App, args: SearchArgs) -> anyhow::Result<()> {
    let (origin, label) = match (&args.near, args.detect) {
        (Some(query), _) => {
            let place = app.locations.search_location(query).await?;
            (place.coordinates, place.formatted_address)
        }
        (None, true) => {
            let here = app.locations.detect_location().await?;
            (here, "your location".to_string())
        }
        (None, false) => bail!("pass --near <place> or --detect"),
    };

    let hits = app
        .service
        .directory()
        .search_nearby(&origin, args.radius_km);

    println!("Salons within {:.1} km of {label}:", args.radius_km);
    if hits.is_empty() {
        println!("  none");
    }
    for hit in hits {
        let waiting = app.service.queue(&hit.salon.id).await.len();
        println!(
            "  {:<16} {:<24} {:>5.2} km  {} in queue",
            hit.salon.id, hit.salon.name, hit.distance_km, waiting
        );
    }
    Ok(())
}

async fn join(app: &App, args: JoinArgs) -> anyhow::Result<()> {
    annotate_span(&args.salon, None);

    let salon = app
        .service
        .directory()
        .get(&args.salon)
        .with_context(|| format!("unknown salon: {}", args.salon))?;
    let services = salon
        .pick_services(&args.services)
        .map_err(anyhow::Error::msg)?;

    let kind = if args.at.is_some() {
        BookingType::Appointment
    } else {
        BookingType::Queue
    };

    let record = app
        .service
        .checkout(CheckoutRequest {
            salon_id: args.salon.clone(),
            customer: booking::model::Customer::new(args.name, args.phone, args.email),
            services,
            kind,
            prepay: !args.pay_at_salon,
            scheduled_for: args.at,
        })
        .await?;

    annotate_span(&record.salon_id, Some(record.id.as_str()));
    info!("booking created from cli");
    print_booking(&record);
    Ok(())
}

async fn simulate(app: &App, args: SimulateArgs) -> anyhow::Result<()> {
    annotate_span(&args.salon, None);

    let notifier = app.service.store().notifier();
    let salon = args.salon.clone();
    let queue_sub = notifier.subscribe(SALON_QUEUE_KEY, move |event| {
        let queues: SalonQueues = event
            .new_value
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        let line: Vec<String> = queues
            .get(&salon)
            .map(|q| {
                q.iter()
                    .map(|e| format!("#{} {} ({})", e.queue_position.unwrap_or(0), e.customer.name, e.status))
                    .collect()
            })
            .unwrap_or_default();
        println!("[{}] {}", event.key, line.join(" | "));
    });
    let bookings_sub = notifier.subscribe(USER_BOOKINGS_KEY, |event| {
        let count = event
            .new_value
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<serde_json::Value>>(raw).ok())
            .map_or(0, |v| v.len());
        println!("[{}] {count} bookings stored", event.key);
    });

    let mut sim = QueueSimulator::new(Arc::clone(&app.service));
    let result = async {
        sim.seed_walk_ins(&args.salon, args.customers).await?;
        if args.rounds == 0 {
            let steps = sim.drain(&args.salon, usize::MAX).await?;
            println!("Queue drained in {steps} steps.");
        } else {
            for _ in 0..args.rounds {
                sim.advance(&args.salon).await?;
            }
            print_queue(&args.salon, &app.service.queue(&args.salon).await);
        }
        anyhow::Ok(())
    }
    .instrument(child_span("simulate"))
    .await;

    notifier.unsubscribe(queue_sub);
    notifier.unsubscribe(bookings_sub);
    result
}

fn print_booking(b: &BookingRecord) {
    let services: Vec<&str> = b.selected_services.iter().map(|s| s.name.as_str()).collect();
    print!(
        "{}  {:<10} {:<12} {}  ₹{} / {} min  [{}]",
        b.id,
        b.kind,
        b.status,
        b.salon_name,
        b.total_amount,
        b.total_duration,
        services.join(", ")
    );
    if let Some(pos) = b.queue_position {
        print!("  position {pos}, ~{} min", b.estimated_wait_time.unwrap_or(0));
    }
    if let Some(at) = b.scheduled_for {
        print!("  at {}", at.to_rfc3339());
    }
    match &b.payment_id {
        Some(p) => println!("  paid {p}"),
        None => println!("  pay at salon"),
    }
}

fn print_queue(salon_id: &str, queue: &[BookingRecord]) {
    println!("Queue for {salon_id}: {} in queue", queue.len());
    for e in queue {
        println!(
            "  #{:<3} {:<20} {:<10} ~{} min  ({})",
            e.queue_position.unwrap_or(0),
            e.customer.name,
            e.status,
            e.estimated_wait_time.unwrap_or(0),
            e.id
        );
    }
}
