use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::Context;
use booking::location::Coordinates;
use tracing::info;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Where bookings and queues are persisted (SQLite URL).
    pub database_url: String,

    /// JSON catalog of salons and searchable places.
    pub salon_catalog: String,

    // =========================
    // Queue configuration
    // =========================
    /// Minutes per customer for salons whose catalog entry has no
    /// historical average. Wait estimate = position × this value.
    pub default_service_minutes: u32,

    /// Capacity of the cross-tab change bridge.
    ///
    /// Receivers that fall further behind than this lose events; delivery
    /// across tabs is best-effort.
    pub change_bridge_capacity: usize,

    // =========================
    // Boundary configuration
    // =========================
    /// Simulated gateway declines payments above this amount. Unset means
    /// every positive amount is approved.
    pub payment_decline_above: Option<u64>,

    /// Device position reported by location detection, as "lat,lng".
    pub home_location: Option<Coordinates>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: var_or("DATABASE_URL", "sqlite://salon_queue.db"),
            salon_catalog: var_or("SALON_CATALOG", "data/salons.json"),

            default_service_minutes: parse_or("DEFAULT_SERVICE_MINUTES", 15)?,
            change_bridge_capacity: parse_or("CHANGE_BRIDGE_CAPACITY", 64)?,

            payment_decline_above: parse_opt("PAYMENT_DECLINE_ABOVE")?,
            home_location: parse_opt("HOME_LOCATION")?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(key)?.unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default
    }))
}

fn parse_opt<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid {key} value: {raw}")),
        _ => Ok(None),
    }
}
