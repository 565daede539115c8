mod cli;
mod commands;
mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use booking::BookingError;
use booking::factory::BookingFactory;
use booking::ledger::QueueLedger;
use booking::location::StaticLocationProvider;
use booking::notifier::ChangeNotifier;
use booking::payment::SimulatedGateway;
use booking::salon::{Catalog, SalonDirectory};
use booking::service::BookingService;
use booking::store::{RecordStore, SqliteStore};
use common::logger::{TraceId, flow_span, init_logger};
use tracing::Instrument;

use crate::cli::Cli;
use crate::config::AppConfig;

/// Everything a command needs, wired once per process.
pub struct App {
    pub service: Arc<BookingService>,
    pub locations: StaticLocationProvider,
}

/// Opens storage, loads the catalog and assembles the booking service.
async fn init_app(cfg: &AppConfig) -> anyhow::Result<App> {
    let backend = SqliteStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("failed to open {}", cfg.database_url))?;

    let notifier = Arc::new(ChangeNotifier::new(cfg.change_bridge_capacity));
    let store = Arc::new(RecordStore::new(Arc::new(backend), notifier));

    let catalog = Catalog::from_file(&cfg.salon_catalog)?;
    let directory = Arc::new(SalonDirectory::new(catalog.salons));
    let ledger = Arc::new(QueueLedger::new(
        store.clone(),
        directory.service_times(cfg.default_service_minutes),
    ));

    let service = Arc::new(BookingService::new(
        store,
        ledger,
        BookingFactory::default(),
        directory,
        Arc::new(SimulatedGateway::new(cfg.payment_decline_above)),
    ));

    Ok(App {
        service,
        locations: StaticLocationProvider::new(catalog.places, cfg.home_location),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("salon-queue", is_production);

    let mut cfg = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        cfg.database_url = db;
    }
    if let Some(catalog) = cli.catalog {
        cfg.salon_catalog = catalog;
    }

    let app = init_app(&cfg).await?;

    let trace_id = TraceId::new();
    let result = commands::run(&app, cli.command)
        .instrument(flow_span("command", &trace_id))
        .await;

    if let Err(e) = &result {
        if e.downcast_ref::<BookingError>().is_some_and(BookingError::is_fatal) {
            tracing::error!(error = %e, %trace_id, "booking state is inconsistent; stop and inspect storage");
        }
    }
    result
}
