//! Pipeline configuration.
//!
//! Loaded from TOML, then overridden from `DROPGATE_*` environment variables:
//!
//! ```toml
//! network = "rinkeby"
//! airdrop_id = "airdrop-1"
//! state_dir = "state"
//! base_dir = "."
//! from = "0x…"
//! execute_if_decided = false
//!
//! [networks.rinkeby]
//! chain_id = 4
//! timeout_ms = 60000
//!
//! [[voters]]
//! address = "0x…"
//! support = true
//! ```

use dropgate_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-call ledger timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML of the expected shape
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// An environment override could not be parsed
    #[error("invalid value {value:?} in {var}: {reason}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Parse failure
        reason: String,
    },

    /// The configuration is inconsistent
    #[error("invalid configuration: {}", problems.join("; "))]
    Invalid {
        /// Every problem found
        problems: Vec<String>,
    },
}

/// Settings for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Expected chain id; the state record is keyed by it
    pub chain_id: u64,
    /// Bound on every ledger call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// A holder who votes in the Vote stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterConfig {
    /// Holder account
    pub address: Address,
    /// Vote yea (default) or nay
    #[serde(default = "default_support")]
    pub support: bool,
}

/// Everything a pipeline run needs besides the ledger itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Network to operate on
    pub network: String,
    /// Airdrop identifier; prefix of the airdrop's state keys
    pub airdrop_id: String,
    /// Directory holding `deployed-<network>.json`
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Directory manifest paths in state are relative to
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Sender for transactions
    #[serde(default)]
    pub from: Option<Address>,
    /// Replace a recorded distributor that no longer matches
    #[serde(default)]
    pub force_redeploy: bool,
    /// Votes execute the proposal as soon as it is decided
    #[serde(default)]
    pub execute_if_decided: bool,
    /// Treat already-claimed entitlements as success in `claim_all`
    #[serde(default)]
    pub idempotent_claims: bool,
    /// Holders voting in the Vote stage
    #[serde(default)]
    pub voters: Vec<VoterConfig>,
    /// Per-network settings
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_support() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl PipelineConfig {
    /// Read a TOML config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DROPGATE_*` overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn merge_with_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup("DROPGATE_NETWORK") {
            self.network = network;
        }
        if let Some(from) = lookup("DROPGATE_FROM") {
            let address = from.parse().map_err(|e| ConfigError::InvalidEnv {
                var: "DROPGATE_FROM",
                value: from.clone(),
                reason: format!("{e}"),
            })?;
            self.from = Some(address);
        }
        if let Some(dir) = lookup("DROPGATE_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup("DROPGATE_TIMEOUT_MS") {
            let timeout_ms = timeout.parse().map_err(|e| ConfigError::InvalidEnv {
                var: "DROPGATE_TIMEOUT_MS",
                value: timeout.clone(),
                reason: format!("{e}"),
            })?;
            if let Some(network) = self.networks.get_mut(&self.network) {
                network.timeout_ms = timeout_ms;
            }
        }
        Ok(())
    }

    /// Check the configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.airdrop_id.is_empty() {
            problems.push("airdrop_id is empty".to_string());
        } else if self.airdrop_id.contains('.') {
            problems.push(format!("airdrop_id {:?} must not contain '.'", self.airdrop_id));
        }
        if self.network.is_empty() {
            problems.push("network is empty".to_string());
        } else if !self.networks.contains_key(&self.network) {
            problems.push(format!("network {:?} has no [networks] entry", self.network));
        }
        for (name, network) in &self.networks {
            if network.timeout_ms == 0 {
                problems.push(format!("networks.{name}.timeout_ms must be positive"));
            }
        }
        if self.from.is_none() {
            problems.push("no sender: set `from` or DROPGATE_FROM".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    /// Settings of the selected network.
    pub fn network_config(&self) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(&self.network)
            .ok_or_else(|| ConfigError::Invalid {
                problems: vec![format!("network {:?} has no [networks] entry", self.network)],
            })
    }

    /// Per-call timeout of the selected network.
    pub fn timeout(&self) -> Duration {
        let ms = self
            .networks
            .get(&self.network)
            .map_or(DEFAULT_TIMEOUT_MS, |n| n.timeout_ms);
        Duration::from_millis(ms)
    }

    /// Configured sender.
    pub fn sender(&self) -> Result<Address, ConfigError> {
        self.from.ok_or_else(|| ConfigError::Invalid {
            problems: vec!["no sender: set `from` or DROPGATE_FROM".to_string()],
        })
    }

    /// Resolve a path recorded in state against `base_dir`.
    pub fn resolve(&self, recorded: &str) -> PathBuf {
        self.base_dir.join(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
network = "local"
airdrop_id = "airdrop-1"
from = "0x1111111111111111111111111111111111111111"

[networks.local]
chain_id = 1337

[networks.rinkeby]
chain_id = 4
timeout_ms = 5000

[[voters]]
address = "0x2222222222222222222222222222222222222222"

[[voters]]
address = "0x3333333333333333333333333333333333333333"
support = false
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("state"));
        assert_eq!(config.networks["local"].timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert!(config.voters[0].support);
        assert!(!config.voters[1].support);
        assert!(!config.force_redeploy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        let vars: HashMap<&str, &str> = [
            ("DROPGATE_NETWORK", "rinkeby"),
            ("DROPGATE_TIMEOUT_MS", "250"),
            ("DROPGATE_STATE_DIR", "/var/dropgate"),
            ("DROPGATE_FROM", "0x4444444444444444444444444444444444444444"),
        ]
        .into_iter()
        .collect();
        config
            .merge_with_vars(|name| vars.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.network, "rinkeby");
        assert_eq!(config.network_config().unwrap().chain_id, 4);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.state_dir, PathBuf::from("/var/dropgate"));
        assert_eq!(
            config.sender().unwrap().to_string(),
            "0x4444444444444444444444444444444444444444"
        );
    }

    #[test]
    fn test_bad_env_value() {
        let mut config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        let err = config
            .merge_with_vars(|name| (name == "DROPGATE_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "DROPGATE_TIMEOUT_MS",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        config.airdrop_id = String::new();
        config.network = "mainnet".to_string();
        config.from = None;
        if let Some(local) = config.networks.get_mut("local") {
            local.timeout_ms = 0;
        }

        match config.validate() {
            Err(ConfigError::Invalid { problems }) => assert_eq!(problems.len(), 4),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropgate.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.airdrop_id, "airdrop-1");

        std::fs::write(&path, "network = 3").unwrap();
        assert!(matches!(
            PipelineConfig::load_from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_resolve_against_base_dir() {
        let mut config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        config.base_dir = PathBuf::from("/srv/airdrops");
        assert_eq!(
            config.resolve("merkle/one.json"),
            PathBuf::from("/srv/airdrops/merkle/one.json")
        );
    }
}
