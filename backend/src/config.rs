use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rocket::figment::{providers::{Format, Toml}, value::Value, Figment};
use shared::{validation::validate_options, ValidationError, VoteOptions};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "config_file.toml";
pub const DEFAULT_STORE_HOST: &str = "localhost";
pub const DEFAULT_STORE_PORT: u16 = 6379;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_TELEMETRY_BUFFER: usize = 1024;
pub const MAX_TELEMETRY_BUFFER: usize = 1 << 20;

pub mod keys {
    pub const VOTE1: &str = "VOTE1VALUE";
    pub const VOTE2: &str = "VOTE2VALUE";
    pub const TITLE: &str = "TITLE";
    pub const SHOW_HOST: &str = "SHOWHOST";
    pub const STORE_HOST: &str = "REDIS";
    pub const STORE_PASSWORD: &str = "REDIS_PWD";
    pub const STORE_TIMEOUT_MS: &str = "STORE_TIMEOUT_MS";
    pub const STRICT_VOTES: &str = "STRICT_VOTES";
    pub const TELEMETRY_BUFFER: &str = "TELEMETRY_BUFFER";
    pub const METRICS_ADDR: &str = "METRICS_ADDR";
    pub const CONFIG_FILE: &str = "CONFIG_FILE";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration value {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Invalid vote options: {0}")]
    InvalidOptions(#[from] ValidationError),
    #[error("Failed to read configuration file {path}: {reason}")]
    File { path: PathBuf, reason: String },
    #[error("Failed to resolve hostname: {0}")]
    Hostname(#[from] std::io::Error),
}

/// One place a configuration value may come from. Sources are consulted in
/// order and the first one that yields a value wins.
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &str;
    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError>;
}

/// Process environment. Empty values are treated as unset.
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(std::env::var(key).ok().filter(|value| !value.is_empty()))
    }
}

/// Flat TOML file, e.g.
///
/// ```toml
/// TITLE = "Azure Voting App"
/// VOTE1VALUE = "Cats"
/// VOTE2VALUE = "Dogs"
/// SHOWHOST = false
/// ```
///
/// A file that does not exist behaves as an empty source.
pub struct FileSource {
    path: PathBuf,
    figment: Figment,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!("Configuration file {} not found, skipping", path.display());
        }
        Self {
            figment: Figment::from(Toml::file(&path)),
            path,
        }
    }

    pub fn from_toml_str(contents: &str) -> Self {
        Self {
            path: PathBuf::from("<inline>"),
            figment: Figment::from(Toml::string(contents)),
        }
    }
}

impl ConfigSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match self.figment.find_value(key) {
            Ok(value) => value,
            Err(e) if e.missing() => return Ok(None),
            Err(e) => {
                return Err(ConfigError::File {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let text = match value {
            Value::String(_, s) => s,
            Value::Bool(_, b) => b.to_string(),
            other => match other.to_i128() {
                Some(n) => n.to_string(),
                None => {
                    return Err(ConfigError::File {
                        path: self.path.clone(),
                        reason: format!("{} is not a scalar value", key),
                    })
                }
            },
        };

        Ok(Some(text).filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub title: String,
    pub options: VoteOptions,
    pub show_host: bool,
    pub strict_votes: bool,
    pub telemetry_buffer: usize,
    /// Prometheus scrape listener; metrics are not exported when unset.
    pub metrics_addr: Option<SocketAddr>,
    pub store: StoreSettings,
}

pub struct ConfigChain {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigChain {
    pub fn new(sources: Vec<Box<dyn ConfigSource>>) -> Self {
        Self { sources }
    }

    /// Environment first, then the TOML file named by `CONFIG_FILE`.
    pub fn from_env() -> Self {
        let path = EnvSource
            .lookup(keys::CONFIG_FILE)
            .ok()
            .flatten()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        Self::new(vec![Box::new(EnvSource), Box::new(FileSource::open(path))])
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        for source in &self.sources {
            if let Some(value) = source.lookup(key)? {
                debug!(key, source = source.name(), "Resolved configuration value");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key)?.ok_or(ConfigError::Missing(key))
    }

    fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
        match self.get(key)? {
            Some(value) => parse_bool(key, &value),
            None => Ok(false),
        }
    }

    fn number<T: std::str::FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        Ok(self.parsed(key)?.unwrap_or(default))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match self.get(key)? {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue { key, value }),
            None => Ok(None),
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value: value.to_string() }),
    }
}

fn parse_store_host(value: &str) -> Result<(String, u16), ConfigError> {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: keys::STORE_HOST,
                value: value.to_string(),
            })?;
            Ok((host.to_string(), port))
        }
        _ => Ok((value.to_string(), DEFAULT_STORE_PORT)),
    }
}

impl Settings {
    /// Resolves every key against `chain`. `hostname` is only called when
    /// `SHOWHOST` is enabled.
    pub fn resolve<F>(chain: &ConfigChain, hostname: F) -> Result<Self, ConfigError>
    where
        F: FnOnce() -> std::io::Result<String>,
    {
        let options = VoteOptions::new(chain.require(keys::VOTE1)?, chain.require(keys::VOTE2)?);
        validate_options(&options)?;

        let mut title = chain.require(keys::TITLE)?;
        let show_host = chain.flag(keys::SHOW_HOST)?;
        if show_host {
            title = hostname()?;
            info!(%title, "Using hostname as title");
        }

        let host = chain
            .get(keys::STORE_HOST)?
            .unwrap_or_else(|| DEFAULT_STORE_HOST.to_string());
        let (host, port) = parse_store_host(&host)?;

        let timeout_ms = chain.number(keys::STORE_TIMEOUT_MS, DEFAULT_STORE_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: keys::STORE_TIMEOUT_MS,
                value: "0".into(),
            });
        }

        let telemetry_buffer = chain.number(keys::TELEMETRY_BUFFER, DEFAULT_TELEMETRY_BUFFER)?;
        if !(1..=MAX_TELEMETRY_BUFFER).contains(&telemetry_buffer) {
            return Err(ConfigError::InvalidValue {
                key: keys::TELEMETRY_BUFFER,
                value: telemetry_buffer.to_string(),
            });
        }

        Ok(Self {
            title,
            options,
            show_host,
            strict_votes: chain.flag(keys::STRICT_VOTES)?,
            telemetry_buffer,
            metrics_addr: chain.parsed(keys::METRICS_ADDR)?,
            store: StoreSettings {
                host,
                port,
                password: chain.get(keys::STORE_PASSWORD)?,
                timeout: Duration::from_millis(timeout_ms),
            },
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&ConfigChain::from_env(), crate::utils::hostname)
    }
}
