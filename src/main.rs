//! MixLink deck daemon
//!
//! Connects to the deck over a serial port and runs the device loop:
//! handshake, initial session sync, icon transfer, then steady-state diffs
//! and volume commands.

use mixlink::app::DeckApp;
use mixlink::config::AppConfig;
use mixlink::error::{Error, Result};
use mixlink::media::{media_channel, run_sink, NullSink};
use mixlink::transport::SerialTransport;
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Parse config path from command line arguments.
///
/// Supports:
/// - `mixlink <path>` (positional)
/// - `mixlink --config <path>` (flag-based)
/// - `mixlink -c <path>` (short flag)
///
/// Falls back to built-in defaults if not specified.
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return Some(args[1].clone());
    }

    None
}

fn main() -> Result<()> {
    let config = match parse_config_path() {
        Some(path) => {
            let config = AppConfig::from_file(&path)?;
            init_logger(&config.logging.level);
            log::info!("Using config: {}", path);
            config
        }
        None => {
            let config = AppConfig::cdc_defaults();
            init_logger(&config.logging.level);
            log::info!("No config given, using built-in defaults");
            config
        }
    };

    log::info!(
        "MixLink starting on {} @ {} baud",
        config.link.port,
        config.link.baud
    );

    let transport = SerialTransport::open(&config.link.port, config.link.baud)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Input events come from the deck's physical controls; the daemon builds
    // the channel so a UI/input layer can be attached on top.
    let (_input_tx, input_rx) = crossbeam_channel::unbounded();

    // Media keys bypass the session link entirely. The worker drains the
    // channel until every sender is dropped.
    let (_media_tx, media_rx) = media_channel();
    let media_worker = std::thread::Builder::new()
        .name("media-sink".to_string())
        .spawn(move || run_sink(media_rx, NullSink))
        .map_err(|e| Error::Other(format!("Failed to spawn media sink: {}", e)))?;

    let mut app = DeckApp::new(&config, transport, input_rx);

    log::info!("MixLink running. Press Ctrl-C to stop.");
    let result = app.run(running);

    drop(_media_tx);
    if media_worker.join().is_err() {
        log::warn!("Media sink worker panicked");
    }
    result
}

fn init_logger(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
