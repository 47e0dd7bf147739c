//! Configuration for the MixLink daemon
//!
//! Loads configuration from a TOML file: the serial link, protocol timing
//! tunables, and logging. Timing values are tunables for a specific hardware
//! stack, not protocol invariants.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
}

/// Serial link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Serial port path (e.g. `/dev/ttyACM0`, `COM7`)
    pub port: String,
    /// Baud rate
    pub baud: u32,
}

/// Protocol timing and retry tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Bounded wait for each protocol step (handshake reply, config ack,
    /// each icon ack) in milliseconds
    pub step_timeout_ms: u64,
    /// Delay before retrying after a timeout or disconnect, in milliseconds
    pub retry_backoff_ms: u64,
    /// How many times the host retries a failed icon transfer before
    /// skipping the icon
    pub icon_retry_limit: u32,
    /// Host-side audio snapshot poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Minimum interval between outbound control messages per app, in
    /// milliseconds (encoder ticks are coalesced within this window)
    pub debounce_ms: u64,
    /// Device loop housekeeping tick in milliseconds
    pub tick_ms: u64,
    /// Host icon write chunk length in bytes (slow-link pacing)
    pub icon_chunk_len: usize,
    /// Delay between icon write chunks in milliseconds
    pub icon_chunk_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log output (stdout, stderr, or file path)
    pub output: String,
}

/// Protocol timings resolved to [`Duration`]s
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub step_timeout: Duration,
    pub retry_backoff: Duration,
    pub icon_retry_limit: u32,
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub tick: Duration,
    pub icon_chunk_len: usize,
    pub icon_chunk_delay: Duration,
}

impl ProtocolConfig {
    /// Resolve millisecond fields into [`Timings`]
    pub fn timings(&self) -> Timings {
        Timings {
            step_timeout: Duration::from_millis(self.step_timeout_ms),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            icon_retry_limit: self.icon_retry_limit,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            debounce: Duration::from_millis(self.debounce_ms),
            tick: Duration::from_millis(self.tick_ms),
            icon_chunk_len: self.icon_chunk_len,
            icon_chunk_delay: Duration::from_millis(self.icon_chunk_delay_ms),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        AppConfig::default().protocol.timings()
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for a USB CDC attached deck
    ///
    /// Suitable for testing and development. Production deployments should
    /// use a proper TOML configuration file.
    pub fn cdc_defaults() -> Self {
        Self {
            link: LinkConfig {
                port: "/dev/ttyACM0".to_string(),
                baud: 115_200,
            },
            protocol: ProtocolConfig {
                step_timeout_ms: 5000,
                retry_backoff_ms: 1000,
                icon_retry_limit: 2,
                poll_interval_ms: 1000,
                debounce_ms: 50,
                tick_ms: 10,
                icon_chunk_len: 64,
                icon_chunk_delay_ms: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                output: "stdout".to_string(),
            },
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::cdc_defaults()
    }
}
