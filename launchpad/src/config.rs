//! Layered settings for the `tierpad` tooling.
//!
//! Layers (highest precedence last):
//!   1) Built-in defaults
//!   2) Config file (explicit path, or `tierpad.{toml,yaml,yml,json}` in the working dir)
//!   3) Environment variables: `TIERPAD__SECTION__KEY`
//!
//! Examples:
//!   TIERPAD__LOGGING__JSON=true
//!   TIERPAD__STAKING__PENALTY_BPS=1500
//!   TIERPAD__STAKING__COOLDOWN=30m

use std::path::{Path, PathBuf};
use std::time::Duration;

use config as cfg;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    staking::{StakeParams, DEFAULT_COOLDOWN_SECS, DEFAULT_PENALTY_BPS, MAX_PENALTY_BPS},
    telemetry::LoggingConfig,
    Address, AssetId,
};

const ENV_PREFIX: &str = "TIERPAD";
const DEFAULT_EVENT_CAPACITY: usize = 1_024;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub staking: StakingSettings,
    pub registry: RegistrySettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// RUST_LOG-style directive, e.g. "info,tierpad=debug".
    pub filter: String,
    pub json: bool,
    pub ansi: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingSettings {
    /// Ledger account the stake ledger escrows under.
    pub account: Address,
    pub stake_asset: AssetId,
    /// Penalty recipient; required before a ledger can be built.
    pub treasury: Option<Address>,
    pub penalty_bps: u32,
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    pub event_capacity: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Factory address mixed into every pool identity.
    pub factory: Address,
    pub owner: Address,
    pub event_capacity: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".into(), json: false, ansi: false }
    }
}

impl Default for StakingSettings {
    fn default() -> Self {
        Self {
            account: Address::ZERO,
            stake_asset: AssetId(1),
            treasury: None,
            penalty_bps: DEFAULT_PENALTY_BPS,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self { factory: Address::ZERO, owner: Address::ZERO, event_capacity: DEFAULT_EVENT_CAPACITY }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] cfg::ConfigError),
    #[error("path not found `{0}`")]
    PathNotFound(String),
    #[error("invalid `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { key, reason: reason.into() }
}

impl Settings {
    /// Load defaults → file → environment, then validate.
    pub fn load(explicit_file: Option<&Path>) -> Result<Settings, ConfigError> {
        match discover_config_file(explicit_file)? {
            Some(path) => assemble(Some(cfg::File::from(path))),
            None => assemble(None::<cfg::File<cfg::FileSourceFile, cfg::FileFormat>>),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staking.penalty_bps > MAX_PENALTY_BPS {
            return Err(invalid("staking.penalty_bps", format!("must be <= {MAX_PENALTY_BPS}")));
        }
        if self.staking.treasury.is_some_and(|t| t.is_zero()) {
            return Err(invalid("staking.treasury", "zero address"));
        }
        if self.staking.event_capacity == 0 {
            return Err(invalid("staking.event_capacity", "must be > 0"));
        }
        if self.registry.event_capacity == 0 {
            return Err(invalid("registry.event_capacity", "must be > 0"));
        }
        Ok(())
    }

    /// Initial stake ledger parameters.
    pub fn stake_params(&self) -> Result<StakeParams, ConfigError> {
        let treasury = self.staking.treasury.ok_or_else(|| invalid("staking.treasury", "not set"))?;
        Ok(StakeParams {
            penalty_bps: self.staking.penalty_bps,
            treasury,
            cooldown_secs: self.staking.cooldown.as_secs(),
            paused: false,
        })
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            env_filter: Some(self.logging.filter.clone()),
            json: self.logging.json,
            ansi: self.logging.ansi,
            ..LoggingConfig::default()
        }
    }
}

fn assemble<S>(file: Option<S>) -> Result<Settings, ConfigError>
where
    S: cfg::Source + Send + Sync + 'static,
{
    let d = Settings::default();
    let mut builder = cfg::Config::builder()
        .set_default("logging.filter", d.logging.filter)?
        .set_default("logging.json", d.logging.json)?
        .set_default("logging.ansi", d.logging.ansi)?
        .set_default("staking.account", d.staking.account.to_string())?
        .set_default("staking.stake_asset", d.staking.stake_asset.0)?
        .set_default("staking.penalty_bps", d.staking.penalty_bps)?
        .set_default("staking.cooldown", "1h")?
        .set_default("staking.event_capacity", d.staking.event_capacity as u64)?
        .set_default("registry.factory", d.registry.factory.to_string())?
        .set_default("registry.owner", d.registry.owner.to_string())?
        .set_default("registry.event_capacity", d.registry.event_capacity as u64)?;

    if let Some(file) = file {
        builder = builder.add_source(file);
    }

    // TIERPAD__STAKING__PENALTY_BPS -> staking.penalty_bps
    builder = builder.add_source(
        cfg::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

fn discover_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(p) = explicit {
        if !p.exists() {
            return Err(ConfigError::PathNotFound(p.display().to_string()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    Ok(["tierpad.toml", "tierpad.yaml", "tierpad.yml", "tierpad.json"]
        .into_iter()
        .map(PathBuf::from)
        .find(|c| c.exists()))
}
