//! Application state for the tz-vertex config directory
//!
//! Resolves `~/.tz-vertex` (or a custom directory), loads `config.toml` and
//! turns it into the [`companion::Config`] the runtime consumes.
//!
//! [`companion::Config`]: crate::companion::Config

use std::{fs, path::PathBuf, time::Duration};

use common::prelude::{BootstrapPeer, TEIA_STARTUP_PIN};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::companion;
use crate::node::{
    DaemonCommand, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, DEFAULT_READINESS_TIMEOUT,
    DEFAULT_RETRY_DELAY,
};

pub const APP_NAME: &str = "tz-vertex";
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Pin list file name inside a custom config directory
pub const PIN_LIST_FILE_NAME: &str = "pinlist.json";
/// Pin list file name in the home directory
pub const HOME_PIN_LIST_FILE_NAME: &str = ".tz-vertex_pinlist.json";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

/// Configuration stored in config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// IPFS (Kubo) binary, looked up on PATH when not absolute
    pub ipfs_bin: PathBuf,
    /// Arguments passed to the binary
    pub daemon_args: Vec<String>,
    /// IPFS repo directory, exported to the daemon as IPFS_PATH
    pub repo_path: Option<PathBuf>,
    /// Kubo RPC API base URL
    pub api_url: String,
    pub readiness_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Bootstrap peer multiaddr, defaults to the Teia node
    pub bootstrap_peer: Option<String>,
    pub bootstrap_attempts: u32,
    pub bootstrap_delay_secs: u64,
    /// Abort startup when the bootstrap peer is unreachable
    pub strict_bootstrap: bool,
    /// CIDs pinned at every startup without being added to the pin list
    pub initial_pins: Vec<String>,
    /// Override for the pin list location
    pub pin_list_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let command = DaemonCommand::default();
        Self {
            ipfs_bin: command.program,
            daemon_args: command.args,
            repo_path: None,
            api_url: DEFAULT_API_URL.to_string(),
            readiness_timeout_secs: DEFAULT_READINESS_TIMEOUT.as_secs(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            bootstrap_peer: None,
            bootstrap_attempts: DEFAULT_MAX_ATTEMPTS,
            bootstrap_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            strict_bootstrap: false,
            initial_pins: vec![TEIA_STARTUP_PIN.to_string()],
            pin_list_path: None,
        }
    }
}

/// Application state representing a tz-vertex config directory
#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the config directory (~/.tz-vertex or custom)
    pub vertex_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Path to the persisted pin list
    pub pin_list_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the config directory path (custom or default ~/.tz-vertex)
    pub fn vertex_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Where the pin list lives when the config does not override it.
    ///
    /// The default directory keeps the historical `~/.tz-vertex_pinlist.json`
    /// location; a custom directory keeps everything inside itself.
    fn default_pin_list_path(custom_path: Option<&PathBuf>) -> Result<PathBuf, StateError> {
        match custom_path {
            Some(dir) => Ok(dir.join(PIN_LIST_FILE_NAME)),
            None => {
                let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
                Ok(home.join(HOME_PIN_LIST_FILE_NAME))
            }
        }
    }

    /// Initialize a new config directory with the given (or default) config
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let vertex_dir = Self::vertex_dir(custom_path.clone())?;
        let config_path = vertex_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            return Err(StateError::AlreadyInitialized(config_path));
        }

        fs::create_dir_all(&vertex_dir)?;

        let config = config.unwrap_or_default();
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        let pin_list_path = match &config.pin_list_path {
            Some(path) => path.clone(),
            None => Self::default_pin_list_path(custom_path.as_ref())?,
        };

        Ok(Self {
            vertex_dir,
            config_path,
            pin_list_path,
            config,
        })
    }

    /// Load state from the config directory. A missing config file yields
    /// the defaults, so running without `init` works.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let vertex_dir = Self::vertex_dir(custom_path.clone())?;
        let config_path = vertex_dir.join(CONFIG_FILE_NAME);

        let config = if config_path.exists() {
            let config_toml = fs::read_to_string(&config_path)?;
            toml::from_str(&config_toml)?
        } else {
            tracing::debug!(
                "no config at {}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        };

        let pin_list_path = match &config.pin_list_path {
            Some(path) => path.clone(),
            None => Self::default_pin_list_path(custom_path.as_ref())?,
        };

        Ok(Self {
            vertex_dir,
            config_path,
            pin_list_path,
            config,
        })
    }

    /// Convert to the runtime config for [`Companion::start`].
    ///
    /// [`Companion::start`]: crate::companion::Companion::start
    pub fn to_companion_config(&self) -> Result<companion::Config, StateError> {
        let config = &self.config;

        let api_url = Url::parse(&config.api_url).map_err(|e| StateError::InvalidConfig {
            field: "api_url",
            reason: e.to_string(),
        })?;

        let bootstrap_peer = match &config.bootstrap_peer {
            Some(address) => {
                BootstrapPeer::parse(address).map_err(|e| StateError::InvalidConfig {
                    field: "bootstrap_peer",
                    reason: e.to_string(),
                })?
            }
            None => BootstrapPeer::teia(),
        };

        if config.bootstrap_attempts == 0 {
            return Err(StateError::InvalidConfig {
                field: "bootstrap_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if config.poll_interval_ms == 0 {
            return Err(StateError::InvalidConfig {
                field: "poll_interval_ms",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(companion::Config {
            daemon: DaemonCommand {
                program: config.ipfs_bin.clone(),
                args: config.daemon_args.clone(),
                repo_path: config.repo_path.clone(),
            },
            api_url,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            readiness_timeout: Duration::from_secs(config.readiness_timeout_secs),
            bootstrap_peer,
            bootstrap_attempts: config.bootstrap_attempts,
            bootstrap_delay: Duration::from_secs(config.bootstrap_delay_secs),
            strict_bootstrap: config.strict_bootstrap,
            pin_list_path: self.pin_list_path.clone(),
            initial_pins: config.initial_pins.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("config already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("invalid config value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_load_without_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let state = AppState::load(Some(dir.path().to_path_buf())).unwrap();

        assert_eq!(state.config, AppConfig::default());
        assert_eq!(state.pin_list_path, dir.path().join(PIN_LIST_FILE_NAME));

        let config = state.to_companion_config().unwrap();
        assert_eq!(config.api_url.as_str(), "http://127.0.0.1:5001/");
        assert_eq!(config.bootstrap_peer, BootstrapPeer::teia());
        assert_eq!(config.bootstrap_attempts, 5);
        assert_eq!(config.bootstrap_delay, Duration::from_secs(5));
        assert_eq!(config.readiness_timeout, Duration::from_secs(120));
        assert_eq!(config.daemon.args, vec!["daemon"]);
        assert_eq!(
            config.initial_pins,
            vec!["bafkreidtuosuw37f5xmn65b3ksdiikajy7pwjjslzj2lxxz2vc4wdy3zku"]
        );
        assert!(!config.strict_bootstrap);
    }

    #[test]
    fn test_init_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let custom = AppConfig {
            api_url: "http://127.0.0.1:15001".to_string(),
            initial_pins: vec!["bafkreidtuosuw37f5xmn65b3ksdiikajy7pwjjslzj2lxxz2vc4wdy3zku".to_string()],
            strict_bootstrap: true,
            ..AppConfig::default()
        };
        AppState::init(Some(dir.path().to_path_buf()), Some(custom.clone())).unwrap();

        let state = AppState::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(state.config, custom);
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        AppState::init(Some(dir.path().to_path_buf()), None).unwrap();
        assert!(matches!(
            AppState::init(Some(dir.path().to_path_buf()), None),
            Err(StateError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "bootstrap_attempts = 2\npin_list_path = \"/tmp/pins.json\"\n",
        )
        .unwrap();

        let state = AppState::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(state.config.bootstrap_attempts, 2);
        assert_eq!(state.config.api_url, DEFAULT_API_URL);
        assert_eq!(state.pin_list_path, PathBuf::from("/tmp/pins.json"));
        assert_eq!(state.config.initial_pins, vec![TEIA_STARTUP_PIN]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState::load(Some(dir.path().to_path_buf())).unwrap();

        state.config.api_url = "not a url".to_string();
        assert!(matches!(
            state.to_companion_config(),
            Err(StateError::InvalidConfig { field: "api_url", .. })
        ));

        state.config.api_url = DEFAULT_API_URL.to_string();
        state.config.bootstrap_peer = Some("/ip4/1.2.3.4/tcp/4001".to_string());
        assert!(matches!(
            state.to_companion_config(),
            Err(StateError::InvalidConfig { field: "bootstrap_peer", .. })
        ));

        state.config.bootstrap_peer = None;
        state.config.bootstrap_attempts = 0;
        assert!(matches!(
            state.to_companion_config(),
            Err(StateError::InvalidConfig { field: "bootstrap_attempts", .. })
        ));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "api_url = [").unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().to_path_buf())),
            Err(StateError::TomlDe(_))
        ));
    }
}
