use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "salon-queue", version, about = "Find salons and join their queues")]
pub struct Cli {
    /// Override DATABASE_URL.
    #[clap(long, global = true)]
    pub db: Option<String>,

    /// Override SALON_CATALOG.
    #[clap(long, global = true)]
    pub catalog: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List salons near a place, coordinates, or the detected device position.
    Search(SearchArgs),

    /// Book a queue spot (or an appointment with --at).
    Join(JoinArgs),

    /// Show every booking made from this device.
    Bookings,

    /// Show a salon's live queue.
    Queue {
        #[clap(long)]
        salon: String,
    },

    /// Mark a booking as being served.
    Start { booking_id: String },

    /// Mark a booking as finished.
    Complete { booking_id: String },

    /// Cancel a waiting or in-service booking.
    Cancel { booking_id: String },

    /// Record a payment settled at the salon.
    Pay {
        booking_id: String,
        payment_id: String,
    },

    /// Seed walk-ins and advance a salon queue, printing every change event.
    Simulate(SimulateArgs),

    /// Remove all bookings and queues.
    Clear,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Address or area to search around, or "lat,lng".
    #[clap(long, conflicts_with = "detect")]
    pub near: Option<String>,

    /// Use the device position (HOME_LOCATION).
    #[clap(long)]
    pub detect: bool,

    #[clap(long, default_value = "5.0")]
    pub radius_km: f64,
}

#[derive(Debug, Args)]
pub struct JoinArgs {
    #[clap(long)]
    pub salon: String,

    #[clap(long)]
    pub name: String,

    #[clap(long)]
    pub phone: String,

    #[clap(long, default_value = "")]
    pub email: String,

    /// Service name from the salon's menu; repeat for several.
    #[clap(long = "service", required = true)]
    pub services: Vec<String>,

    /// Settle at the salon instead of paying now.
    #[clap(long)]
    pub pay_at_salon: bool,

    /// Book an appointment for this RFC 3339 time instead of queueing.
    #[clap(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[clap(long)]
    pub salon: String,

    /// Walk-ins to add before advancing.
    #[clap(long, default_value_t = 3)]
    pub customers: usize,

    /// Queue advances to perform; 0 drains the queue.
    #[clap(long, default_value_t = 0)]
    pub rounds: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn join_collects_repeated_services() {
        let cli = Cli::try_parse_from([
            "salon-queue",
            "join",
            "--salon",
            "fade-factory",
            "--name",
            "Ravi",
            "--phone",
            "98765",
            "--service",
            "Haircut",
            "--service",
            "BeardTrim",
        ])
        .unwrap();

        let Command::Join(args) = cli.command else {
            panic!("expected join");
        };
        assert_eq!(args.services, vec!["Haircut", "BeardTrim"]);
        assert!(!args.pay_at_salon);
        assert!(args.at.is_none());
    }

    #[test]
    fn appointment_time_parses_rfc3339() {
        let cli = Cli::try_parse_from([
            "salon-queue",
            "join",
            "--salon",
            "s",
            "--name",
            "n",
            "--phone",
            "p",
            "--service",
            "Haircut",
            "--at",
            "2024-06-02T16:30:00Z",
        ])
        .unwrap();

        let Command::Join(args) = cli.command else {
            panic!("expected join");
        };
        assert_eq!(args.at.unwrap().to_rfc3339(), "2024-06-02T16:30:00+00:00");
    }

    #[test]
    fn search_near_and_detect_conflict() {
        assert!(
            Cli::try_parse_from(["salon-queue", "search", "--near", "x", "--detect"]).is_err()
        );
    }
}
