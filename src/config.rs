//! Configuration management with validation and defaults
//!
//! TOML file, then `CROUPIER_*` environment overrides, then validation.

use crate::errors::{ConfigurationError, CroupierResult};
use crate::games::lottery::LotteryConfig;
use crate::games::mines::{self, DEFAULT_GRID_SIZE};
use crate::games::settlement::SettlementConfig;
use crate::games::slots::SlotConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Complete croupier configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CroupierConfig {
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub roulette: RouletteConfig,
    #[serde(default)]
    pub mines: MinesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub slots: SlotConfig,
    #[serde(default)]
    pub lottery: LotteryConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouletteConfig {
    /// Spins kept for hot/cold statistics
    pub history_len: usize,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self { history_len: 100 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinesConfig {
    pub grid_size: usize,
}

impl Default for MinesConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json: false,
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> CroupierResult<CroupierConfig> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            CroupierConfig::default()
        };

        apply_overrides(&mut config, |key| env::var(key).ok())?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> CroupierResult<CroupierConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &CroupierConfig) -> CroupierResult<()> {
        let settlement = &config.settlement;
        for (field, value) in [
            ("settlement.debit_timeout_ms", settlement.debit_timeout_ms),
            ("settlement.resolve_timeout_ms", settlement.resolve_timeout_ms),
            ("settlement.balance_timeout_ms", settlement.balance_timeout_ms),
            ("settlement.lock_timeout_ms", settlement.lock_timeout_ms),
            ("settlement.reconcile_interval_ms", settlement.reconcile_interval_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "0", "must be positive"));
            }
        }

        if let Some(dir) = &settlement.pending_dir {
            if dir.trim().is_empty() {
                return Err(ConfigurationError::MissingRequired("settlement.pending_dir".to_string()).into());
            }
        }

        if config.roulette.history_len == 0 {
            return Err(invalid("roulette.history_len", "0", "must be positive"));
        }

        if let Err(e) = mines::validate_grid(config.mines.grid_size) {
            return Err(invalid(
                "mines.grid_size",
                &config.mines.grid_size.to_string(),
                &e.to_string(),
            ));
        }

        config
            .slots
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(format!("slots: {}", e)))?;
        config
            .lottery
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(format!("lottery: {}", e)))?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &CroupierConfig, path: &str) -> CroupierResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::errors::CroupierError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn parse_override<T, F>(lookup: &F, key: &str) -> CroupierResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, &raw, "could not parse value")),
    }
}

/// Apply `CROUPIER_*` overrides read through `lookup`
pub fn apply_overrides<F>(config: &mut CroupierConfig, lookup: F) -> CroupierResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parse_override(&lookup, "CROUPIER_DEBIT_TIMEOUT_MS")? {
        config.settlement.debit_timeout_ms = v;
    }
    if let Some(v) = parse_override(&lookup, "CROUPIER_RESOLVE_TIMEOUT_MS")? {
        config.settlement.resolve_timeout_ms = v;
    }
    if let Some(v) = parse_override(&lookup, "CROUPIER_BALANCE_TIMEOUT_MS")? {
        config.settlement.balance_timeout_ms = v;
    }
    if let Some(v) = parse_override(&lookup, "CROUPIER_LOCK_TIMEOUT_MS")? {
        config.settlement.lock_timeout_ms = v;
    }
    if let Some(v) = parse_override(&lookup, "CROUPIER_RECONCILE_INTERVAL_MS")? {
        config.settlement.reconcile_interval_ms = v;
    }
    if let Some(dir) = lookup("CROUPIER_PENDING_DIR") {
        config.settlement.pending_dir = Some(dir);
    }
    if let Some(v) = parse_override(&lookup, "CROUPIER_JACKPOT_FLOOR")? {
        config.slots.jackpot_floor = v;
    }
    if let Some(v) = parse_override(&lookup, "CROUPIER_LOG_LEVEL")? {
        config.logging.level = v;
    }
    if let Some(v) = parse_override(&lookup, "CROUPIER_LOG_JSON")? {
        config.logging.json = v;
    }
    Ok(())
}

/// Builder pattern for creating configurations
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: CroupierConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settlement(mut self, settlement: SettlementConfig) -> Self {
        self.config.settlement = settlement;
        self
    }

    pub fn slots(mut self, slots: SlotConfig) -> Self {
        self.config.slots = slots;
        self
    }

    pub fn roulette(mut self, roulette: RouletteConfig) -> Self {
        self.config.roulette = roulette;
        self
    }

    pub fn mines(mut self, mines: MinesConfig) -> Self {
        self.config.mines = mines;
        self
    }

    pub fn lottery(mut self, lottery: LotteryConfig) -> Self {
        self.config.lottery = lottery;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    pub fn build(self) -> CroupierConfig {
        self.config
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> CroupierResult<()> {
    let config = CroupierConfig::default();
    let loader = ConfigLoader::new();
    loader.save(&config, path)
}
