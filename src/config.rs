// Deploy configuration
//
// `deploy.json` describes what to deploy and how, `.env` holds the secret key
// and optionally overrides the node URL.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{Amount, ArgValue, Args, CodecError};
use deployer::operation::MAX_GAS_DEPLOYMENT;
use deployer::rpc::BUILDNET_URL;
use deployer::{ContractData, DeployOptions, KeyError, KeyPair, WaitPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SECRET_KEY_VAR: &str = "WALLET_SECRET_KEY";
pub const NODE_URL_VAR: &str = "JSON_RPC_URL_PUBLIC";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} is not set, add it to .env")]
    MissingVariable(&'static str),
    #[error("Invalid WALLET_SECRET_KEY: {0}")]
    SecretKey(#[from] KeyError),
    #[error("Invalid arguments for {path}: {source}")]
    Args {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("No contracts to deploy")]
    NoContracts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
    pub until_final: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        let policy = WaitPolicy::default();
        Self {
            enabled: true,
            poll_interval_ms: policy.poll_interval.as_millis() as u64,
            timeout_secs: policy.timeout.as_secs(),
            until_final: policy.until_final,
        }
    }
}

impl WaitConfig {
    pub fn policy(&self) -> Option<WaitPolicy> {
        self.enabled.then(|| WaitPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            until_final: self.until_final,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Compiled bytecode, relative to the configuration file
    pub path: PathBuf,
    #[serde(default)]
    pub coins: Amount,
    /// `None` writes no args entry, an empty list writes an empty one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<ArgValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub node_url: String,
    /// Overrides the chain id reported by the node
    pub chain_id: Option<u64>,
    /// Deployer contract bytecode
    pub deployer: PathBuf,
    pub fee: Amount,
    pub max_gas: u64,
    pub wait: WaitConfig,
    pub contracts: Vec<ContractConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        let options = DeployOptions::default();
        Self {
            node_url: BUILDNET_URL.to_string(),
            chain_id: None,
            deployer: PathBuf::from("node_modules/@massalabs/massa-sc-deployer/build/deployer.wasm"),
            fee: options.fee,
            max_gas: MAX_GAS_DEPLOYMENT,
            wait: WaitConfig::default(),
            contracts: vec![ContractConfig {
                path: PathBuf::from("build/main.wasm"),
                coins: Amount::from_raw(100_000_000),
                args: Some(vec![ArgValue::String("Massa".to_string())]),
            }],
        }
    }
}

impl DeployConfig {
    pub fn options(&self) -> DeployOptions {
        DeployOptions {
            fee: self.fee,
            max_gas: self.max_gas,
            chain_id: self.chain_id,
            wait: self.wait.policy(),
        }
    }

    /// Read every contract's bytecode and serialize its arguments.
    /// Relative paths are resolved against `base`.
    pub fn load_contracts(&self, base: &Path) -> Result<Vec<ContractData>, ConfigError> {
        if self.contracts.is_empty() {
            return Err(ConfigError::NoContracts);
        }

        self.contracts
            .iter()
            .map(|contract| {
                let path = base.join(&contract.path);
                let bytecode = fs::read(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;

                let mut data = ContractData::new(bytecode).with_coins(contract.coins);
                if let Some(values) = &contract.args {
                    let args = Args::from_values(values).map_err(|source| ConfigError::Args {
                        path: contract.path.clone(),
                        source,
                    })?;
                    data = data.with_args(args.serialize());
                }
                Ok(data)
            })
            .collect()
    }

    pub fn deployer_path(&self, base: &Path) -> PathBuf {
        base.join(&self.deployer)
    }
}

/// Configuration manager for deploy files
pub struct ConfigManager;

impl ConfigManager {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<DeployConfig, ConfigError> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&config_str)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(config: &DeployConfig, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let mut config_str = serde_json::to_string_pretty(config)?;
        config_str.push('\n');
        fs::write(path, config_str).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    config: DeployConfig,
}

impl ConfigBuilder {
    pub fn node_url(mut self, url: impl Into<String>) -> Self {
        self.config.node_url = url.into();
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.config.chain_id = Some(chain_id);
        self
    }

    pub fn deployer(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.deployer = path.into();
        self
    }

    pub fn fee(mut self, fee: Amount) -> Self {
        self.config.fee = fee;
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.config.wait.enabled = false;
        self
    }

    /// Replace the default contract list
    pub fn contracts(mut self, contracts: Vec<ContractConfig>) -> Self {
        self.config.contracts = contracts;
        self
    }

    pub fn build(self) -> DeployConfig {
        self.config
    }
}

/// Values read from the process environment and `.env`
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub secret_key: Option<String>,
    pub node_url: Option<String>,
}

impl Environment {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_vars(env::var(SECRET_KEY_VAR).ok(), env::var(NODE_URL_VAR).ok())
    }

    /// Blank values count as unset
    pub fn from_vars(secret_key: Option<String>, node_url: Option<String>) -> Self {
        let present = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            secret_key: present(secret_key),
            node_url: present(node_url),
        }
    }

    pub fn keypair(&self) -> Result<KeyPair, ConfigError> {
        let secret = self
            .secret_key
            .as_deref()
            .ok_or(ConfigError::MissingVariable(SECRET_KEY_VAR))?;
        Ok(KeyPair::from_secret_str(secret)?)
    }

    /// The environment wins over the configuration file
    pub fn node_url<'a>(&'a self, config: &'a DeployConfig) -> &'a str {
        self.node_url.as_deref().unwrap_or(&config.node_url)
    }
}
