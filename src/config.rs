use crate::report::DEFAULT_DEAD_ZONE;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILENAME: &str = "joytest.json";

/// Open every attached joystick and print its axis, ball, hat and button activity.
/// Press Escape to quit.
#[derive(Debug, Parser)]
#[command(name = "joytest", version)]
pub struct Args {
    /// Print every axis value once per poll interval instead of reporting extremes.
    /// Use this when a stick never reaches its extreme values.
    #[arg(short, long)]
    pub poll_axes: bool,

    /// Also write report lines to this file (truncated at startup)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Only print to the console
    #[arg(long, conflicts_with = "log_file")]
    pub no_log: bool,

    /// Axis magnitude that must be exceeded before a movement is reported
    #[arg(long, value_name = "N")]
    pub dead_zone: Option<u16>,
}

/// Read-only settings from `joytest.json` next to the executable
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dead_zone: u16,
    pub poll_interval_ms: u64,
    /// Empty disables the log file
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dead_zone: DEFAULT_DEAD_ZONE,
            poll_interval_ms: 1000,
            log_file: Some(PathBuf::from("joytest.log")),
        }
    }
}

impl Settings {
    /// Defaults when the file is missing or unreadable
    pub fn load() -> Self {
        Self::load_from(&Self::settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {:?}", path);
                    return settings;
                }
                Err(e) => {
                    log::error!("Failed to parse settings: {}", e);
                }
            },
            Err(e) => {
                log::error!("Failed to read settings file: {}", e);
            }
        }
        Self::default()
    }

    pub fn settings_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_FILENAME)
    }
}

/// Everything the control loop needs, after command line overrides
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub poll_axes: bool,
    pub poll_interval: Duration,
    pub dead_zone: u16,
    pub log_file: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(settings: Settings, args: &Args) -> Self {
        let log_file = if args.no_log {
            None
        } else {
            args.log_file
                .clone()
                .or(settings.log_file)
                .filter(|p| !p.as_os_str().is_empty())
        };

        Self {
            poll_axes: args.poll_axes,
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            dead_zone: args.dead_zone.unwrap_or(settings.dead_zone),
            log_file,
        }
    }
}
