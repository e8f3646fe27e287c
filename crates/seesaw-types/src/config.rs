//! Typed runtime configuration.
//!
//! Configuration is read from the environment exactly once, at process
//! start, into plain structs with documented defaults. Components receive
//! the structs; nothing reads an environment variable after startup.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Environment variable naming the update server base URL.
pub const ENV_UPDATE_SERVER: &str = "UPDATE_SERVER";
/// Environment variable holding the poll interval in seconds.
pub const ENV_CHECK_INTERVAL: &str = "CHECK_INTERVAL";

/// Default poll interval: one hour.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3600);
/// Default per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Default update server consulted when `UPDATE_SERVER` is unset.
pub const DEFAULT_UPDATE_SERVER: &str = "https://updates.seesaw.dev/stable/";

/// Update daemon configuration.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Base URL the daemon polls for `latest.json`.
    pub update_server: Url,
    /// Interval between poll cycles.
    pub check_interval: Duration,
    /// Bound applied to every HTTP request so a hung endpoint cannot wedge
    /// the polling loop.
    pub http_timeout: Duration,
    /// Directory under which per-cycle download scratch space is created.
    pub scratch_dir: PathBuf,
    /// PEM file holding the fixed update-signing public key.
    pub public_key_path: PathBuf,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            update_server: Url::parse(DEFAULT_UPDATE_SERVER)
                .expect("default server URL parses"),
            check_interval: DEFAULT_CHECK_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            scratch_dir: PathBuf::from("/var/tmp/seesaw"),
            public_key_path: PathBuf::from("/etc/seesaw/update-key.pem"),
        }
    }
}

impl UpdateConfig {
    /// Build a configuration from the process environment, falling back to
    /// defaults for unset variables. Set-but-invalid values are errors, not
    /// silent fallbacks.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(ENV_UPDATE_SERVER) {
            config.update_server =
                Url::parse(&raw).map_err(|source| ConfigError::InvalidServerUrl {
                    raw: raw.clone(),
                    detail: source.to_string(),
                })?;
        }
        if let Ok(raw) = std::env::var(ENV_CHECK_INTERVAL) {
            let seconds: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidInterval { raw: raw.clone() })?;
            if seconds == 0 {
                return Err(ConfigError::InvalidInterval { raw });
            }
            config.check_interval = Duration::from_secs(seconds);
        }
        Ok(config)
    }
}

/// Boot validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Consecutive boot attempts tolerated before rollback. An attempt
    /// count strictly above this value triggers rollback.
    pub failure_threshold: u32,
    /// Delay applied before the health probe runs, letting the system reach
    /// steady state so a slow service start is not read as a dead network.
    pub startup_delay: Duration,
    /// Address the default reachability probe connects to.
    pub probe_addr: String,
    /// Connect timeout for the reachability probe.
    pub probe_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            startup_delay: Duration::from_secs(30),
            probe_addr: "8.8.8.8:53".to_owned(),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// Error produced when a set environment variable cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `UPDATE_SERVER` is set but not a parseable URL.
    InvalidServerUrl {
        /// The raw environment value.
        raw: String,
        /// Parser detail.
        detail: String,
    },
    /// `CHECK_INTERVAL` is set but not a positive integer number of seconds.
    InvalidInterval {
        /// The raw environment value.
        raw: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidServerUrl { raw, detail } => {
                write!(f, "{ENV_UPDATE_SERVER}={raw:?} is not a valid URL: {detail}")
            }
            Self::InvalidInterval { raw } => {
                write!(
                    f,
                    "{ENV_CHECK_INTERVAL}={raw:?} is not a positive number of seconds"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
