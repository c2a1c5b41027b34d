//! Configuration handling for the link tool.
//!
//! This module reads defaults from a YAML file and environment variables;
//! command-line flags take precedence and are merged in main.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Link tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Serial device path, e.g. /dev/ttyUSB0
    pub port: Option<String>,
    /// Baud rate
    pub baud: u32,
    /// Delay between transmitted frames, in milliseconds
    pub per_frame_delay_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115200,
            per_frame_delay_ms: 10,
        }
    }
}

/// File structure (all keys optional, unknown keys ignored)
#[derive(Debug, Deserialize)]
struct FileConfig {
    port: Option<String>,
    baud: Option<u32>,
    per_frame_delay_ms: Option<u64>,
}

impl LinkConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Self {
        let mut config = Self::default();

        // Try to read the config file
        if let Ok(content) = std::fs::read_to_string(&config_path) {
            if let Ok(file_config) = serde_yaml::from_str::<FileConfig>(&content) {
                config.apply_file_config(file_config);
                info!("Loaded configuration from {:?}", config_path.as_ref());
            } else {
                warn!(
                    "Failed to parse config file {:?}, using defaults",
                    config_path.as_ref()
                );
            }
        } else {
            warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            );
        }

        // Override with environment variables
        config.apply_environment_overrides();

        info!(
            "Final link configuration: port={:?}, baud={}, per_frame_delay={}ms",
            config.port, config.baud, config.per_frame_delay_ms
        );

        config
    }

    fn apply_file_config(&mut self, file_config: FileConfig) {
        if let Some(port) = file_config.port {
            self.port = Some(port);
        }
        if let Some(baud) = file_config.baud {
            self.baud = baud;
        }
        if let Some(delay) = file_config.per_frame_delay_ms {
            self.per_frame_delay_ms = delay;
        }
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("LINK_PORT") {
            info!("Serial port overridden by environment: {}", port);
            self.port = Some(port);
        }

        if let Some(baud) = var("LINK_BAUD") {
            if let Ok(baud) = baud.parse::<u32>() {
                info!("Baud rate overridden by environment: {}", baud);
                self.baud = baud;
            }
        }

        if let Some(delay) = var("LINK_PER_FRAME_DELAY_MS") {
            if let Ok(delay) = delay.parse::<u64>() {
                info!("Per-frame delay overridden by environment: {}ms", delay);
                self.per_frame_delay_ms = delay;
            }
        }
    }
}
