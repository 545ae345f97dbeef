//! Kernel build configuration
//!
//! The configuration lives in a JSON file (`kernel_conf.json` by default) and is consumed by build
//! scripts, which turn it into constants for the crates being built.

use serde_derive::Deserialize;
use std::{fmt::Write, path::Path};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debug: bool,
    /// One of `error`, `warn`, `info`, `debug`, `trace`
    pub log_level: String,
    pub dummy_console: DummyConsoleConfig,
    pub gameport: GameportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DummyConsoleConfig {
    pub columns: u16,
    pub rows: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameportConfig {
    /// Noise tolerance declared to the gameport core
    pub fuzz: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".into(),
            dummy_console: DummyConsoleConfig::default(),
            gameport: GameportConfig::default(),
        }
    }
}

impl Default for DummyConsoleConfig {
    fn default() -> Self {
        Self { columns: 80, rows: 25 }
    }
}

impl Default for GameportConfig {
    fn default() -> Self {
        Self { fuzz: 64 }
    }
}

const LOG_LEVELS: &[(&str, &str)] = &[
    ("error", "Error"),
    ("warn", "Warn"),
    ("info", "Info"),
    ("debug", "Debug"),
    ("trace", "Trace"),
];

impl Config {
    pub fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from `path`, or the defaults if the file doesn't exist
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::parse(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.dummy_console.columns == 0 || self.dummy_console.rows == 0 {
            return Err(format!(
                "dummy console geometry must be non-zero, got {}x{}",
                self.dummy_console.columns, self.dummy_console.rows
            ));
        }
        if self.log_level_variant().is_none() {
            return Err(format!("unknown log level `{}`", self.log_level));
        }
        Ok(())
    }

    fn log_level_variant(&self) -> Option<&'static str> {
        LOG_LEVELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.log_level))
            .map(|(_, variant)| *variant)
    }

    /// Renders the configuration as Rust constants, to be `include!`d by the crate being built
    pub fn to_rust_consts(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// Generated from the kernel configuration, do not edit");
        let _ = writeln!(out, "pub const DEBUG: bool = {};", self.debug);
        let _ = writeln!(
            out,
            "pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::{};",
            self.log_level_variant().unwrap_or("Info")
        );
        let _ = writeln!(out, "pub const DUMMY_CONSOLE_COLUMNS: u16 = {};", self.dummy_console.columns);
        let _ = writeln!(out, "pub const DUMMY_CONSOLE_ROWS: u16 = {};", self.dummy_console.rows);
        let _ = writeln!(out, "pub const GAMEPORT_FUZZ: i32 = {};", self.gameport.fuzz);
        out
    }
}
