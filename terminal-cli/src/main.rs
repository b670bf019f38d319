use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use parkgate_device::{DeviceLink, SerialConnector};
use parkgate_registry::{SeedEntry, SlotRegistry};
use parkgate_terminal::ControlLoop;
use tokio::time::MissedTickBehavior;
use tracing::info;

mod config;
mod ui;

use config::{
    build_config, default_log_path, load_config, save_config, Args, Config, PersistedConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let persisted = load_config().unwrap_or_default();
    let config = build_config(&args, &persisted)?;
    save_config(&PersistedConfig::from(&config)).context("save config")?;
    init_tracing(&config)?;

    let mut registry = SlotRegistry::new(config.registry).context("create slot registry")?;
    if config.seed {
        let now = registry.now();
        registry.seed(&SeedEntry::demo_set(now));
    }

    let mut link = DeviceLink::disconnected();
    if config.simulate {
        info!("simulation mode requested; not probing device ports");
    } else if let Ok(port) = link.connect(&SerialConnector::default(), &config.ports) {
        info!(%port, "gate controller attached");
    }

    let mut control = ControlLoop::new(registry, link);
    let mut tui = ui::Tui::enter()?;
    let mut input = ui::CrosstermInput;
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_ms = config.poll_interval.as_millis() as u64, "control loop started");
    while control.is_running() {
        ticker.tick().await;
        control.tick(&mut input);
        tui.draw(&control)?;
    }
    Ok(())
}

fn init_tracing(config: &Config) -> Result<()> {
    let level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // The terminal is in raw mode, so logs go to a file.
    let Some(path) = config.log_file.clone().or_else(default_log_path) else {
        return Ok(());
    };
    let file = open_log(&path).with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
