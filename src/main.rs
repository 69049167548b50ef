//! infinitime-timesync - set the clock of an InfiniTime watch over BLE
//!
//! Commands:
//! - sync: Scan for the watch and write the current local time (default)
//! - scan: List advertising BLE devices
//! - show-time: Print the Current Time record for now

mod domain;
mod error;
mod infrastructure;

use anyhow::Context;
use clap::{Parser, Subcommand};
use domain::cts::CtsTimeRecord;
use domain::models::WriteMode;
use domain::settings::{Settings, SettingsOverrides, SettingsService};
use infrastructure::bluetooth::{BtleplugStack, SessionConfig, TimeSyncService};
use infrastructure::logging::init_logger;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "infinitime-timesync")]
#[command(about = "Set the time of an InfiniTime watch over Bluetooth LE", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Advertised name of the watch
    #[arg(short, long)]
    name: Option<String>,

    /// Current Time characteristic UUID (full or 16-bit short form)
    #[arg(short = 'u', long)]
    characteristic: Option<String>,

    /// Scan timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Bluetooth adapter index
    #[arg(short, long)]
    adapter: Option<usize>,

    /// Write with response instead of a write command
    #[arg(long)]
    with_response: bool,

    /// Settings file (JSON)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More console output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for the watch and write the current local time
    Sync,
    /// List advertising BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value_t = 5)]
        duration: u64,
    },
    /// Print the Current Time record for the local time and exit
    ShowTime,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            device_name: self.name.clone(),
            characteristic_uuid: self.characteristic.clone(),
            adapter_index: self.adapter,
            scan_timeout_secs: self.timeout,
            write_mode: self.with_response.then_some(WriteMode::WithResponse),
            log_level: match self.verbose {
                0 => None,
                1 => Some("debug".to_string()),
                _ => Some("trace".to_string()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let logging = match init_logger(&settings.log_settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command.unwrap_or(Commands::Sync), &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if !logging.console_enabled() {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = SettingsService::load(cli.config.as_deref())?;
    settings.apply(cli.overrides());
    Ok(settings)
}

async fn run(command: Commands, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::ShowTime => {
            show_time();
            Ok(())
        }
        Commands::Sync => sync(settings).await,
        Commands::Scan { duration } => scan(settings, Duration::from_secs(duration)).await,
    }
}

fn show_time() {
    let record = CtsTimeRecord::now();
    println!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} weekday {}",
        record.year(),
        record.month(),
        record.day(),
        record.hour(),
        record.minute(),
        record.second(),
        record.weekday()
    );
    println!("{}", record);
}

async fn sync(settings: &Settings) -> anyhow::Result<()> {
    let config = SessionConfig::try_from(settings).context("Invalid characteristic UUID")?;
    let mut service = TimeSyncService::new(BtleplugStack::new(settings.adapter_index), config);

    let outcome = service.sync().await;
    debug!("Session finished in state {:?}", service.state());

    let report = outcome.map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("Time sync failed at {} stage", stage))
    })?;

    info!(
        "Time set on {} ({}) via {}: {}",
        report.device_name,
        report.address.as_deref().unwrap_or("unknown address"),
        report.characteristic,
        report.record
    );
    Ok(())
}

async fn scan(settings: &Settings, duration: Duration) -> anyhow::Result<()> {
    let config = SessionConfig::try_from(settings).context("Invalid characteristic UUID")?;
    let mut service = TimeSyncService::new(BtleplugStack::new(settings.adapter_index), config);

    info!("Scanning for {:?}...", duration);
    let devices = service.scan_devices(duration).await?;

    if devices.is_empty() {
        println!("No devices found");
    }
    for device in &devices {
        let target = Some(service.config().device_name.as_str());
        let marker = if device.local_name.as_deref() == target { "*" } else { " " };
        println!(
            "{} {:<20} {:<17} {}",
            marker,
            device.display_name(),
            device.address.as_deref().unwrap_or("-"),
            device
                .rssi
                .map(|rssi| format!("{} dBm", rssi))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}
