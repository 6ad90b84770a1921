//! Out-of-band station administration. Devices can never register
//! themselves; stations are created here.

use anyhow::{bail, Context};
use chrono::{Days, Local};
use clap::{Parser, Subcommand};
use meteo_server::config::{DEFAULT_DATABASE_URL, MEMORY_DATABASE_URL};
use meteo_server::model::NewStation;
use meteo_server::seed::seed_demo_data;
use meteo_server::store::{PgStore, Store};
use meteo_server::validate::{format_date, format_timestamp};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "station-admin", about = "Manage registered weather stations")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new station
    Register {
        /// External reference used by the device, e.g. esp32-001
        station_ref: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: Option<String>,
        /// Address the device calls from, e.g. http://192.168.1.20:5000
        #[arg(long)]
        address: Option<String>,
    },
    /// List registered stations
    List,
    /// Show stored data for one station
    Inspect {
        station_ref: String,
        /// Days of pushed min/max records to show
        #[arg(long, default_value_t = 7)]
        days: u64,
    },
    /// Populate demo stations and readings
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if cli.database_url == MEMORY_DATABASE_URL {
        bail!("station-admin needs a persistent database, not the in-memory store");
    }
    let store = PgStore::connect(&cli.database_url, 2)
        .await
        .context("connecting to database")?;

    match cli.command {
        Command::Register {
            station_ref,
            name,
            location,
            address,
        } => {
            let station = store
                .create_station(NewStation {
                    station_ref,
                    name,
                    location,
                    address,
                })
                .await?;
            println!("Registered {} ({})", station.station_ref, station.name);
        }
        Command::List => {
            for station in store.list_stations().await? {
                println!(
                    "{:<20} {:<28} {:<16} {}",
                    station.station_ref,
                    station.name,
                    station.location.as_deref().unwrap_or("-"),
                    station.address.as_deref().unwrap_or("-"),
                );
            }
        }
        Command::Inspect { station_ref, days } => {
            let Some(station) = store.find_station(&station_ref).await? else {
                bail!("station {} is not registered", station_ref);
            };
            println!("{} ({})", station.station_ref, station.name);
            println!("  samples: {}", store.sample_count(station.id).await?);

            if let Some(sample) = store.latest_sample(station.id).await? {
                println!(
                    "  latest sample: {} {:.1}°C {:.1}%",
                    format_timestamp(&sample.timestamp),
                    sample.temperature,
                    sample.humidity
                );
            }
            if let Some(status) = store.latest_status(station.id).await? {
                println!(
                    "  latest status: {} uptime={}ms heap={}B rssi={}",
                    format_timestamp(&status.timestamp),
                    status.uptime_ms,
                    status.free_heap,
                    status.wifi_rssi
                );
            }

            let today = Local::now().date_naive();
            let since = today
                .checked_sub_days(Days::new(days))
                .unwrap_or(today);
            for aggregate in store.daily_aggregates(station.id, since).await? {
                let entry = aggregate.to_entry();
                println!(
                    "  {} tmp {}..{} hum {}..{}",
                    format_date(&aggregate.day),
                    entry.tmin,
                    entry.tmax,
                    entry.hmin,
                    entry.hmax
                );
            }
        }
        Command::Seed => {
            let now = Local::now().naive_local();
            let summary = seed_demo_data(&store, now, &mut rand::thread_rng()).await?;
            println!(
                "Seeded {} new stations, {} samples, {} daily records, {} status reports",
                summary.stations_created, summary.samples, summary.aggregates, summary.statuses
            );
        }
    }

    Ok(())
}
