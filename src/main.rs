mod args;
mod config;
mod dispatcher;
mod gestures;
mod input;
mod panel;
mod session;
mod tracker;
mod tunables;

use std::fs::File;
use std::sync::Arc;
use clap::Parser;
use fs2::FileExt;
use crate::args::Args;
use crate::config::Config;
use crate::dispatcher::TriggerDispatcher;
use crate::gestures::Classifier;
use crate::input::{get_screen_size, get_touchscreen_device, pump_events, UinputPowerKey};
use crate::session::SessionController;
use crate::tunables::Tunables;

fn init_logger(args: &Args) {
    let level_filter = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(level_filter)
        .parse_default_env()
        .init();
}

/// Held for the life of the process; a second daemon would fight over the power key.
fn acquire_instance_lock() -> Result<File, Box<dyn std::error::Error>> {
    let dir = std::env::var_os("XDG_RUNTIME_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    let path = dir.join("swiped.lock");
    let file = File::create(&path).map_err(|e| format!("Failed to create lock file {:?}: {}", path, e))?;
    file.try_lock_exclusive()
        .map_err(|_| format!("Another instance is already running (lock {:?} is held)", path))?;
    Ok(file)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_logger(&args);

    let _instance_lock = acquire_instance_lock()?;

    let (config, config_path) = match &args.config_file {
        Some(path) => {
            let config = Config::parse_from_file(path).map_err(|e| format!("Failed to parse config file {:?}: {}", path, e))?;
            (config, Some(path.clone()))
        }
        None => match Config::get_config_path() {
            Some(path) if path.exists() => {
                let config = Config::parse_from_file(&path).map_err(|e| format!("Failed to parse config file {:?}: {}", path, e))?;
                (config, Some(path))
            }
            _ => (Config::default(), None),
        },
    };

    log::debug!("Using config file: {:?}", config_path);
    log::debug!("Loaded config: {:#?}", config);

    let tunables = Arc::new(Tunables::default());
    for e in config.apply_tunables(&tunables) {
        log::warn!("Rejected setting in config file: {}", e);
    }
    for (name, value) in &args.overrides {
        tunables.set(name, value).map_err(|e| format!("Invalid --set {}={}: {}", name, value, e))?;
    }
    log::info!("Tunables: {}", tunables.describe());

    let device_path = args.device.as_deref().or(config.device.as_deref());
    let touchscreen = get_touchscreen_device(device_path)?;
    let (x_max, y_max) = get_screen_size(&touchscreen)?;
    let geometry = config.geometry.with_extent(x_max, y_max);
    log::info!("Using touchscreen {:?} with {:?}", touchscreen.name().unwrap_or("unknown"), geometry);

    let mut power_key = UinputPowerKey::create().map_err(|e| format!("Failed to create virtual power key: {}", e))?;
    if let Ok(path) = power_key.device_mut().get_syspath() {
        log::info!("Created virtual power key at {:?}", path);
    }

    let event_stream = touchscreen.into_event_stream()?;

    let classifier = Classifier::new(geometry);
    log::debug!("Corridor geometry: {:?}", classifier.geometry());
    let (session, controller) = SessionController::new(classifier, TriggerDispatcher::new(power_key), Arc::clone(&tunables));
    tokio::spawn(controller.run());

    let _panel_watcher = panel::start_panel_monitor(&config.panel, session.clone());
    let _config_watcher = config_path.and_then(|path| {
        config::watch_config_file(&path, Arc::clone(&tunables))
            .inspect_err(|e| log::warn!("Failed to watch config file {:?}: {}", path, e))
            .ok()
    });

    tokio::select! {
        res = pump_events(event_stream, session) => res.map_err(|e| format!("Touchscreen event stream failed: {}", e))?,
        _ = tokio::signal::ctrl_c() => log::info!("Interrupted, shutting down"),
    }

    Ok(())
}
