use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use roomslot::calendar::SystemClock;
use roomslot::config::Config;
use roomslot::engine::{Engine, EngineError};
use roomslot::model::{BookingRequest, PriorityTier, Requester, TimeRange, format_minute, parse_minute};
use roomslot::store::WalStore;

#[derive(Parser)]
#[command(name = "roomslot")]
#[command(about = "Priority-aware booking for a single meeting room")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request a 90-minute slot
    Book {
        /// Meeting date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Earliest acceptable start, HH:MM
        #[arg(long, default_value = "08:00")]
        from: String,
        /// Latest acceptable end, HH:MM
        #[arg(long, default_value = "17:00")]
        to: String,
        /// Priority tier, 1 (supervision) to 4 (general)
        #[arg(long)]
        tier: PriorityTier,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        attendees: u32,
        #[arg(long)]
        purpose: String,
    },
    /// Show placed bookings for a date
    List {
        #[arg(long)]
        date: NaiveDate,
        /// Print JSON instead of one line per booking
        #[arg(long)]
        json: bool,
    },
    /// Show free slots for a date
    Slots {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "08:00")]
        from: String,
        #[arg(long, default_value = "17:00")]
        to: String,
    },
    /// Rewrite the booking log with one entry per booking
    Compact,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "roomslot=debug,info" } else { "roomslot=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_window(from: &str, to: &str) -> Result<TimeRange, String> {
    match (parse_minute(from), parse_minute(to)) {
        (Some(start), Some(end)) => Ok(TimeRange::new(start, end)),
        _ => Err(format!("invalid time range {from}-{to}, expected HH:MM")),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(WalStore::open(&config.wal_path())?);
    let engine = Engine::new(store.clone(), Arc::new(SystemClock::new(config.tz)));
    info!(data_dir = %config.data_dir.display(), tz = %config.tz, "roomslot ready");

    let code = match cli.command {
        Command::Book {
            date,
            from,
            to,
            tier,
            name,
            email,
            attendees,
            purpose,
        } => {
            let preferred = parse_window(&from, &to)?;
            let request = BookingRequest {
                requester: Requester { name, email },
                date,
                preferred,
                tier,
                attendees,
                purpose,
            };
            match engine.submit(request).await {
                Ok(placement) => {
                    println!("{} {} {}", placement.booking.id, date, placement.assigned);
                    for moved in &placement.relocated {
                        let to = moved.booking.assigned.map_or_else(String::new, |r| r.to_string());
                        println!("  moved {} {} -> {}", moved.booking.id, moved.previous, to);
                    }
                    ExitCode::SUCCESS
                }
                Err(EngineError::Rejected(rejection)) => {
                    eprintln!("rejected: {rejection}");
                    ExitCode::from(2)
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::List { date, json } => {
            let bookings = engine.bookings_on(date).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&bookings)?);
            } else {
                for b in &bookings {
                    let slot = b.assigned.map_or_else(String::new, |r| r.to_string());
                    println!("{} {} tier {} {} <{}> {}", b.id, slot, b.tier.level(), b.requester.name, b.requester.email, b.purpose);
                }
            }
            ExitCode::SUCCESS
        }
        Command::Slots { date, from, to } => {
            let window = parse_window(&from, &to)?;
            for slot in engine.free_slots(date, window).await? {
                println!("{}-{}", format_minute(slot.start), format_minute(slot.end));
            }
            ExitCode::SUCCESS
        }
        Command::Compact => {
            store.compact().await?;
            info!("booking log compacted");
            return Ok(ExitCode::SUCCESS);
        }
    };

    let appends = store.appends_since_compact().await;
    if appends >= config.compact_threshold {
        store.compact().await?;
        info!(appends, "booking log compacted");
    }
    Ok(code)
}
