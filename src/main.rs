//! Emulator Watcher - Main entry point
//!
//! Validates configuration, picks the device to watch and runs capture cycles
//! until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Watch the only attached emulator every 30 seconds
//! emulator-watcher
//!
//! # Pick a device and interval explicitly
//! emulator-watcher --device emulator-5554 --interval 10
//! ```

use emulator_watcher::{
    select_device, AdbBridge, Config, CycleState, StoreClient, VisionClient, Watcher,
    WatcherSettings,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Command line overrides
#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    device: Option<String>,
    interval: Option<u64>,
    screenshot_dir: Option<PathBuf>,
    no_change_detection: bool,
    once: bool,
}

/// Parse command line arguments
fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("Emulator Watcher v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    cli.config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--device" | "-d" => {
                i += 1;
                if i < args.len() {
                    cli.device = Some(args[i].clone());
                }
            }
            "--interval" => {
                i += 1;
                if i < args.len() {
                    match args[i].parse() {
                        Ok(interval) => cli.interval = Some(interval),
                        Err(_) => eprintln!("Ignoring invalid interval: {}", args[i]),
                    }
                }
            }
            "--dir" => {
                i += 1;
                if i < args.len() {
                    cli.screenshot_dir = Some(PathBuf::from(&args[i]));
                }
            }
            "--no-change-detection" => {
                cli.no_change_detection = true;
            }
            "--once" => {
                cli.once = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn print_help() {
    println!(
        r#"Emulator Watcher - turn on-screen stat tables into database rows

USAGE:
    emulator-watcher [OPTIONS]

OPTIONS:
    -h, --help                Show this help message
    -v, --version             Show version
    -c, --config <PATH>       Path to configuration file
    -d, --device <SERIAL>     adb device serial (default: the only attached device)
    --interval <SECS>         Seconds between captures (default: 30)
    --dir <PATH>              Screenshot/artifact directory (default: ./screenshots)
    --no-change-detection     Run OCR even when the screen did not change
    --once                    Run a single cycle and exit

ENVIRONMENT:
    SUPABASE_URL, SUPABASE_ANON_KEY, SUPABASE_TABLE
    CLAUDE_API_KEY, CLAUDE_MODEL
    ADB_DEVICE, WATCH_INTERVAL, SCREENSHOT_DIR, ENABLE_CHANGE_DETECTION
"#
    );
}

/// Install the subscriber at `info` (or `RUST_LOG`) before anything logs.
/// The returned handle lets the configured level take over once it is known.
fn init_logging() -> reload::Handle<EnvFilter, Registry> {
    let filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    handle
}

/// Switch to the configured level unless `RUST_LOG` was given explicitly
fn apply_log_level(handle: &reload::Handle<EnvFilter, Registry>, level: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    if let Err(e) = handle.reload(EnvFilter::new(level)) {
        warn!("Failed to apply log level {:?}: {}", level, e);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_args();
    let log_handle = init_logging();

    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(Config::default_config_path);
    let mut config = Config::load_from_path(config_path.clone());
    config.apply_env();

    if let Some(device) = cli.device {
        config.device.serial = Some(device);
    }
    if let Some(interval) = cli.interval {
        config.watch.interval_seconds = interval;
    }
    if let Some(dir) = cli.screenshot_dir {
        config.watch.screenshot_dir = dir;
    }
    if cli.no_change_detection {
        config.watch.change_detection = false;
    }

    apply_log_level(&log_handle, &config.general.log_level);

    info!("{}", "=".repeat(60));
    info!("Emulator Watcher");
    info!("{}", "=".repeat(60));
    info!("Configuration: {:?}", config_path);

    if let Err(e) = config.validate() {
        error!("Configuration check failed: {}", e);
        return Err(e.into());
    }

    std::fs::create_dir_all(&config.watch.screenshot_dir)?;

    let bridge = AdbBridge::new(&config.device.adb_path, config.device.remote_path.clone());
    let devices = match bridge.list_devices().await {
        Ok(devices) => devices,
        Err(e) if config.device.serial.is_some() => {
            warn!("Failed to list devices: {}", e);
            Vec::new()
        }
        Err(e) => {
            error!("Failed to list devices: {}", e);
            return Err(e.into());
        }
    };
    let device = match select_device(config.device.serial.as_deref(), &devices) {
        Ok(device) => device,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let extractor = VisionClient::from_config(&config.ocr)?;
    let sink = StoreClient::from_config(&config.store)?;
    let ocr_model = extractor.model().to_string();
    let insert_url = sink.insert_url().to_string();
    let watcher = Watcher::new(
        WatcherSettings::from_config(device, &config.watch),
        bridge,
        extractor,
        sink,
    );
    let settings = watcher.settings();

    info!("Using device: {}", settings.device);
    info!("Watch interval: {} seconds", settings.interval.as_secs());
    info!(
        "Change detection: {}",
        if settings.change_detection { "enabled" } else { "disabled" }
    );
    info!("Screenshot directory: {}", settings.artifact_dir.display());
    info!("OCR model: {}", ocr_model);
    info!("Store endpoint: {}", insert_url);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        println!("\nStopping after the current cycle...");
        handler_token.cancel();
    })?;

    if cli.once {
        let (state, outcome) = watcher.run_cycle(CycleState::new(), &cancel).await;
        info!("Cycle {} finished: {:?}", state.cycle, outcome);
        return Ok(());
    }

    warn!("Press Ctrl+C to stop watching");
    watcher.run(cancel).await;

    Ok(())
}
