//! SNOV configuration file handling
//!
//! Operator settings in TOML, stored next to the record database
//! (`~/.local/share/snov/config.toml` by default). A commented default
//! file is generated on first run. Durations use humantime notation
//! (`"30s"`, `"24h"`).

use serde::{Deserialize, Serialize};
use snov::chain::DEFAULT_COLLATERAL_SATS;
use snov::crypto::NetworkParams;
use snov::gatekeeper::SweepPolicy;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `[registry] rpc_password`.
pub const REGISTRY_PASSWORD_ENV: &str = "SNOV_REGISTRY_PASSWORD";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_NETWORK: &str = "mainnet";
const DEFAULT_BLOCKBOOK_URL: &str = "https://blockbook.syscoin.org";
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8370";
const DEFAULT_REQUEST_TIMEOUT: &str = "30s";
const DEFAULT_SWEEP_INTERVAL: &str = "24h";
const DEFAULT_RECORD_TIMEOUT: &str = "60s";
const DEFAULT_SWEEP_CONCURRENCY: usize = 4;
const DEFAULT_NOTIFY_TIMEOUT: &str = "2m";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid duration for {field} ('{value}'): {source}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        source: humantime::DurationError,
    },

    #[error("Unknown network '{0}' (expected mainnet or testnet)")]
    UnknownNetwork(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnovConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    pub store: StoreConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// "mainnet" or "testnet"
    #[serde(default = "default_network")]
    pub name: String,
}

/// Blockbook indexer used to resolve collateral transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_blockbook_url")]
    pub blockbook_url: String,

    /// Exact collateral output value, in satoshis.
    #[serde(default = "default_collateral_sats")]
    pub collateral_amount_sats: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

/// Node JSON-RPC endpoint answering `masternode_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    pub rpc_user: Option<String>,

    /// Prefer SNOV_REGISTRY_PASSWORD over storing this in the file.
    pub rpc_password: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding verification records.
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval: String,

    /// Bound on one record's re-validation.
    #[serde(default = "default_record_timeout")]
    pub record_timeout: String,

    #[serde(default = "default_sweep_concurrency")]
    pub concurrency: usize,

    /// Bound on one channel removal; a slower one is retried next sweep.
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout: String,

    /// Run one sweep immediately when the daemon starts.
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_blockbook_url() -> String {
    DEFAULT_BLOCKBOOK_URL.to_string()
}

fn default_collateral_sats() -> u64 {
    DEFAULT_COLLATERAL_SATS
}

fn default_request_timeout() -> String {
    DEFAULT_REQUEST_TIMEOUT.to_string()
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_sweep_interval() -> String {
    DEFAULT_SWEEP_INTERVAL.to_string()
}

fn default_record_timeout() -> String {
    DEFAULT_RECORD_TIMEOUT.to_string()
}

fn default_sweep_concurrency() -> usize {
    DEFAULT_SWEEP_CONCURRENCY
}

fn default_notify_timeout() -> String {
    DEFAULT_NOTIFY_TIMEOUT.to_string()
}

fn default_run_on_start() -> bool {
    true
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            blockbook_url: default_blockbook_url(),
            collateral_amount_sats: default_collateral_sats(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            rpc_user: None,
            rpc_password: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: default_sweep_interval(),
            record_timeout: default_record_timeout(),
            concurrency: default_sweep_concurrency(),
            notify_timeout: default_notify_timeout(),
            run_on_start: default_run_on_start(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration = humantime::parse_duration(value.trim()).map_err(|source| {
        ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
            source,
        }
    })?;
    if duration.is_zero() {
        return Err(ConfigError::Invalid(format!("{} must be greater than zero", field)));
    }
    Ok(duration)
}

impl SnovConfig {
    /// Configuration with defaults and the given database path.
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            network: NetworkConfig::default(),
            chain: ChainConfig::default(),
            registry: RegistryConfig::default(),
            store: StoreConfig { database_path },
            sweep: SweepConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: SnovConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_file(path, &contents)
    }

    /// Check every derived setting once, up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network_params()?;
        self.chain_timeout()?;
        self.registry_timeout()?;
        self.sweep_interval()?;
        self.sweep_policy()?;
        if self.sweep.concurrency == 0 {
            return Err(ConfigError::Invalid("sweep.concurrency must be at least 1".to_string()));
        }
        if self.chain.collateral_amount_sats == 0 {
            return Err(ConfigError::Invalid(
                "chain.collateral_amount_sats must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn network_params(&self) -> Result<NetworkParams, ConfigError> {
        NetworkParams::by_name(&self.network.name)
            .ok_or_else(|| ConfigError::UnknownNetwork(self.network.name.clone()))
    }

    pub fn chain_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("chain.request_timeout", &self.chain.request_timeout)
    }

    pub fn registry_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("registry.request_timeout", &self.registry.request_timeout)
    }

    pub fn sweep_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration("sweep.interval", &self.sweep.interval)
    }

    pub fn sweep_policy(&self) -> Result<SweepPolicy, ConfigError> {
        Ok(SweepPolicy {
            record_timeout: parse_duration("sweep.record_timeout", &self.sweep.record_timeout)?,
            concurrency: self.sweep.concurrency,
            notify_timeout: parse_duration("sweep.notify_timeout", &self.sweep.notify_timeout)?,
        })
    }

    /// Registry RPC password, environment first.
    pub fn registry_password(&self) -> Option<String> {
        std::env::var(REGISTRY_PASSWORD_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .or_else(|| self.registry.rpc_password.clone())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(database_path: &Path) -> String {
        format!(
            r#"# SNOV configuration (sentry node owner verification)
#
# Durations use humantime notation: "30s", "5m", "24h".

[network]
# "mainnet" or "testnet"
name = "{network}"

[chain]
# Blockbook indexer used to look up collateral transactions
blockbook_url = "{blockbook_url}"

# Exact collateral output value in satoshis (100,000 SYS)
collateral_amount_sats = {collateral}

request_timeout = "{request_timeout}"

[registry]
# Syscoin node JSON-RPC endpoint (masternode_list)
rpc_url = "{rpc_url}"
# rpc_user = "snov"
# The password is best supplied via {password_env}
# rpc_password = "..."
request_timeout = "{request_timeout}"

[store]
# SQLite database holding verification records
database_path = "{database_path}"

[sweep]
# How often every verified owner is re-checked
interval = "{interval}"

# Upper bound on checking one owner; slower checks count as errors
record_timeout = "{record_timeout}"

# Owners checked in parallel
concurrency = {concurrency}

# Upper bound on removing one owner from the channel; failures are retried next sweep
notify_timeout = "{notify_timeout}"

# Sweep once at startup instead of waiting a full interval
run_on_start = true

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "{level}"
"#,
            network = DEFAULT_NETWORK,
            blockbook_url = DEFAULT_BLOCKBOOK_URL,
            collateral = DEFAULT_COLLATERAL_SATS,
            request_timeout = DEFAULT_REQUEST_TIMEOUT,
            rpc_url = DEFAULT_RPC_URL,
            password_env = REGISTRY_PASSWORD_ENV,
            database_path = database_path.display(),
            interval = DEFAULT_SWEEP_INTERVAL,
            record_timeout = DEFAULT_RECORD_TIMEOUT,
            concurrency = DEFAULT_SWEEP_CONCURRENCY,
            notify_timeout = DEFAULT_NOTIFY_TIMEOUT,
            level = DEFAULT_LOG_LEVEL,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path, database_path: &Path) -> Result<(), ConfigError> {
        write_file(config_path, &Self::generate_default_toml(database_path))
    }

    /// Load `path` (or the default location), generating a default file first
    /// if none exists.
    pub fn load_or_create(path: Option<String>) -> Result<(Self, PathBuf), ConfigError> {
        let config_path = path.map(PathBuf::from).unwrap_or_else(default_config_path);

        if !config_path.exists() {
            let database_path = config_path
                .parent()
                .map(|dir| dir.join(DATABASE_FILE))
                .unwrap_or_else(default_database_path);
            Self::create_default(&config_path, &database_path)?;
            tracing::info!(path = %config_path.display(), "created default configuration");
        }

        Ok((Self::load(&config_path)?, config_path))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

const DATABASE_FILE: &str = "snov.db";

/// `~/.local/share/snov` on Linux.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snov")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

pub fn default_database_path() -> PathBuf {
    default_data_dir().join(DATABASE_FILE)
}
