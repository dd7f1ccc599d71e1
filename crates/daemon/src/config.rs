use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Effective daemon configuration (usually loaded from `printdash.toml`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: SocketAddr,
    /// Pause between two aggregation cycles.
    pub tick_interval_ms: u64,
    /// Upper bound for any single source within one cycle.
    pub cycle_timeout_ms: u64,
    pub printers: Vec<PrinterConfig>,
    pub weather: WeatherConfig,
    pub system: SystemConfig,
    pub hub: HubConfig,
    pub commands: CommandsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_printer_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub units: String,
    pub ttl_secs: u64,
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Any path on the filesystem whose usage is reported.
    pub disk_mount: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Frames buffered per subscriber before it is skipped for a tick.
    pub subscriber_buffer: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Jog feed rate in mm/min.
    pub jog_speed: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one printer must be configured")]
    NoPrinters,
    #[error("printer name must be non-empty and free of whitespace: {0:?}")]
    BadPrinterName(String),
    #[error("duplicate printer name: {0}")]
    DuplicatePrinter(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

fn default_printer_timeout_ms() -> u64 {
    3_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8100)),
            tick_interval_ms: 2_000,
            cycle_timeout_ms: 8_000,
            printers: vec![
                PrinterConfig {
                    name: "minimus".into(),
                    url: "http://127.0.0.1:5000".into(),
                    api_key: String::new(),
                    timeout_ms: default_printer_timeout_ms(),
                },
                PrinterConfig {
                    name: "sprite".into(),
                    url: "http://127.0.0.1:5001".into(),
                    api_key: String::new(),
                    timeout_ms: default_printer_timeout_ms(),
                },
            ],
            weather: WeatherConfig::default(),
            system: SystemConfig::default(),
            hub: HubConfig::default(),
            commands: CommandsConfig::default(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5".into(),
            api_key: String::new(),
            latitude: 44.3091,
            longitude: -78.3197,
            units: "metric".into(),
            ttl_secs: 600,
            timeout_ms: 5_000,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            disk_mount: "/".into(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 4,
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            jog_speed: 3_000,
            timeout_ms: 5_000,
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config =
            toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("validate {}", path.display()))?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize config")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.printers.is_empty() {
            return Err(ConfigError::NoPrinters);
        }
        let mut seen = HashSet::new();
        for p in &self.printers {
            if p.name.is_empty() || p.name.chars().any(char::is_whitespace) {
                return Err(ConfigError::BadPrinterName(p.name.clone()));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(ConfigError::DuplicatePrinter(p.name.clone()));
            }
            if p.timeout_ms == 0 {
                return Err(ConfigError::Zero("printers.timeout_ms"));
            }
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Zero("tick_interval_ms"));
        }
        if self.cycle_timeout_ms == 0 {
            return Err(ConfigError::Zero("cycle_timeout_ms"));
        }
        if self.weather.timeout_ms == 0 {
            return Err(ConfigError::Zero("weather.timeout_ms"));
        }
        if self.hub.subscriber_buffer == 0 {
            return Err(ConfigError::Zero("hub.subscriber_buffer"));
        }
        if self.commands.timeout_ms == 0 {
            return Err(ConfigError::Zero("commands.timeout_ms"));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }
}

impl PrinterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl WeatherConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CommandsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.tick_interval(), Duration::from_secs(2));
        assert_eq!(cfg.weather.ttl(), Duration::from_secs(600));
        assert_eq!(cfg.commands.jog_speed, 3000);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
listen = "127.0.0.1:9000"

[[printers]]
name = "bench"
url = "http://10.0.0.5"
api_key = "secret"

[weather]
api_key = "abc"
ttl_secs = 60
"#
        )
        .unwrap();

        let cfg = Config::load_from(file.path()).unwrap();
        assert_eq!(cfg.listen.port(), 9000);
        assert_eq!(cfg.printers.len(), 1);
        assert_eq!(cfg.printers[0].timeout_ms, 3_000);
        assert_eq!(cfg.weather.ttl_secs, 60);
        assert_eq!(cfg.weather.units, "metric");
        assert_eq!(cfg.tick_interval_ms, 2_000);
    }

    #[test]
    fn toml_round_trip() {
        let cfg = Config::default();
        let text = cfg.to_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.printers.len(), 2);
        assert_eq!(back.listen, cfg.listen);
    }

    #[test]
    fn example_file_parses() {
        let cfg: Config = toml::from_str(include_str!("../../../printdash.example.toml")).unwrap();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.printers[1].name, "sprite");
    }

    #[test]
    fn rejects_duplicate_printers() {
        let mut cfg = Config::default();
        cfg.printers[1].name = "minimus".into();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DuplicatePrinter("minimus".into()))
        );
    }

    #[test]
    fn rejects_zero_interval_and_empty_names() {
        let mut cfg = Config::default();
        cfg.tick_interval_ms = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::Zero("tick_interval_ms")));

        let mut cfg = Config::default();
        cfg.printers[0].name = String::new();
        assert!(matches!(cfg.validate(), Err(ConfigError::BadPrinterName(_))));

        let mut cfg = Config::default();
        cfg.printers.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoPrinters));
    }
}
