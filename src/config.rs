use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FlowError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wall-clock aligned recomputation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub enabled: bool,
    /// Boundary spacing in minutes; must divide an hour (15 matches metering granularity)
    pub interval_minutes: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            path: "config/site.example.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,energy_flow=info".to_string(),
            json: false,
        }
    }
}

/// Configuration error with field path and constraint description
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `FLOW__*` environment variables
    pub fn load() -> Result<Self> {
        let cfg: Config = Self::figment().extract()?;
        cfg.ensure_valid()?;
        Ok(cfg)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("FLOW__").split("__"))
    }

    /// Returns every violated constraint; empty when valid
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let minutes = self.refresh.interval_minutes;
        if minutes == 0 || minutes > 60 || 60 % minutes != 0 {
            errors.push(ConfigError {
                field: "refresh.interval_minutes".into(),
                message: format!("must be a divisor of 60, got {minutes}"),
            });
        }

        if self.site.path.trim().is_empty() {
            errors.push(ConfigError {
                field: "site.path".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }

    pub fn ensure_valid(&self) -> Result<(), FlowError> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(FlowError::InvalidConfig(joined))
    }
}
