use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use directories::ProjectDirs;
use parkgate_registry::{
    RegistryConfig, DEFAULT_CAPACITY, DEFAULT_GRACE_MINUTES, DEFAULT_HOURLY_RATE,
};
use parkgate_types::Money;
use serde::{Deserialize, Serialize};

/// Ports probed when none are configured, in order.
pub const DEFAULT_PORTS: [&str; 8] = [
    "/dev/ttyUSB0",
    "/dev/ttyACM0",
    "COM3",
    "COM4",
    "COM5",
    "COM6",
    "COM7",
    "COM8",
];
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// CLI flags (user-provided override persisted config)
#[derive(Parser, Debug)]
#[command(name = "parkgate", about = "Parking gate operator terminal")]
pub struct Args {
    /// Serial port to probe for the gate controller (repeatable, tried in order)
    #[arg(long = "port")]
    pub ports: Vec<String>,

    /// Number of parking bays
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Charge per started hour, in cents
    #[arg(long)]
    pub hourly_rate_cents: Option<u64>,

    /// Free stay in minutes
    #[arg(long)]
    pub grace_minutes: Option<u32>,

    /// Control loop period
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Start with an empty lot instead of the demo vehicles
    #[arg(long)]
    pub no_seed: bool,

    /// Do not open a device port
    #[arg(long)]
    pub simulate: bool,

    /// Where to write the log (defaults to the platform data dir)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub ports: Option<Vec<String>>,
    pub capacity: Option<usize>,
    pub hourly_rate_cents: Option<u64>,
    pub grace_minutes: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub verbose: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub ports: Vec<String>,
    pub registry: RegistryConfig,
    pub poll_interval: Duration,
    pub seed: bool,
    pub simulate: bool,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

/// Merges flags over the persisted config and validates the result.
pub fn build_config(args: &Args, persisted: &PersistedConfig) -> Result<Config> {
    let ports = if args.ports.is_empty() {
        persisted
            .ports
            .clone()
            .filter(|ports| !ports.is_empty())
            .unwrap_or_else(|| DEFAULT_PORTS.iter().map(|p| p.to_string()).collect())
    } else {
        args.ports.clone()
    };
    let capacity = args
        .capacity
        .or(persisted.capacity)
        .unwrap_or(DEFAULT_CAPACITY);
    if capacity == 0 || capacity > usize::from(u16::MAX) {
        bail!("capacity must be between 1 and {} (got {capacity})", u16::MAX);
    }
    let poll_interval_ms = args
        .poll_interval_ms
        .or(persisted.poll_interval_ms)
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if poll_interval_ms == 0 {
        bail!("poll_interval_ms must be > 0");
    }
    let hourly_rate = args
        .hourly_rate_cents
        .or(persisted.hourly_rate_cents)
        .map(Money::from_cents)
        .unwrap_or(DEFAULT_HOURLY_RATE);
    let grace_minutes = args
        .grace_minutes
        .or(persisted.grace_minutes)
        .unwrap_or(DEFAULT_GRACE_MINUTES);

    Ok(Config {
        ports,
        registry: RegistryConfig {
            capacity,
            hourly_rate,
            grace_minutes,
        },
        poll_interval: Duration::from_millis(poll_interval_ms),
        seed: !args.no_seed,
        simulate: args.simulate,
        log_file: args.log_file.clone().or_else(|| persisted.log_file.clone()),
        verbose: args.verbose || persisted.verbose.unwrap_or(false),
    })
}

impl From<&Config> for PersistedConfig {
    fn from(config: &Config) -> Self {
        Self {
            ports: Some(config.ports.clone()),
            capacity: Some(config.registry.capacity),
            hourly_rate_cents: Some(config.registry.hourly_rate.cents()),
            grace_minutes: Some(config.registry.grace_minutes),
            poll_interval_ms: Some(config.poll_interval.as_millis() as u64),
            log_file: config.log_file.clone(),
            verbose: Some(config.verbose),
        }
    }
}

pub fn load_config() -> Option<PersistedConfig> {
    let path = config_path()?;
    let data = std::fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

pub fn save_config(cfg: &PersistedConfig) -> Result<()> {
    if let Some(path) = config_path() {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        std::fs::write(path, data)?;
    }
    Ok(())
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "parkgate", "parkgate")
}

fn config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.json"))
}

/// Log file used when none is configured.
pub fn default_log_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().join("parkgate.log"))
}
