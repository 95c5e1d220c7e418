use crate::error::{NetworkError, Result};
use crate::provider::ProviderSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static DEFAULT_ECOSYSTEM: &str = "ethereum";
static DATA_FOLDER_NAME: &str = ".netchoice";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_ECOSYSTEM_KEY: &str = "NETCHOICE_DEFAULT_ECOSYSTEM";
const DATA_FOLDER_KEY: &str = "NETCHOICE_DATA_FOLDER";

/// Network selection configuration
///
/// Passed explicitly to the `NetworkManager`; nothing here is global.
/// Loaded from TOML:
///
/// ```toml
/// default_ecosystem = "ethereum"
///
/// [ecosystems.ethereum]
/// default_network = "sepolia"
///
/// [ecosystems.ethereum.networks.sepolia-fork]
/// default_provider = "foundry"
///
/// [ecosystems.ethereum.networks.sepolia.providers.node]
/// uri = "https://ethereum-sepolia-rpc.publicnode.com"
///
/// [[custom_networks]]
/// name = "devnet"
/// ecosystem = "ethereum"
/// chain_id = 424242
/// rpc = ["http://10.0.0.5:8545"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_ecosystem: Option<String>,
    pub data_folder: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub ecosystems: BTreeMap<String, EcosystemConfig>,
    pub custom_networks: Vec<CustomNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcosystemConfig {
    pub default_network: Option<String>,
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub default_provider: Option<String>,
    pub providers: BTreeMap<String, ProviderSettings>,
}

/// A network the bundled chain table does not know about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomNetwork {
    pub name: String,
    pub ecosystem: String,
    pub chain_id: u64,
    #[serde(default)]
    pub rpc: Vec<String>,
    #[serde(default)]
    pub default_provider: Option<String>,
}

impl Config {
    /// Defaults plus environment overrides
    pub fn new() -> Config {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    pub fn from_toml_str(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        Ok(config)
    }

    /// Read a TOML config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| {
            NetworkError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let mut config = Config::from_toml_str(&text)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(ecosystem) = env::var(DEFAULT_ECOSYSTEM_KEY) {
            if !ecosystem.is_empty() {
                self.default_ecosystem = Some(ecosystem);
            }
        }
        if let Ok(folder) = env::var(DATA_FOLDER_KEY) {
            if !folder.is_empty() {
                self.data_folder = Some(PathBuf::from(folder));
            }
        }
    }

    pub fn default_ecosystem(&self) -> &str {
        self.default_ecosystem
            .as_deref()
            .unwrap_or(DEFAULT_ECOSYSTEM)
    }

    /// Where persisted state (running node records) lives
    pub fn data_folder(&self) -> PathBuf {
        match &self.data_folder {
            Some(folder) => folder.clone(),
            None => dirs::home_dir()
                .map(|home| home.join(DATA_FOLDER_NAME))
                .unwrap_or_else(|| PathBuf::from(DATA_FOLDER_NAME)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Configured default network per ecosystem
    pub fn default_networks(&self) -> impl Iterator<Item = (&String, &String)> {
        self.ecosystems.iter().filter_map(|(ecosystem, config)| {
            config
                .default_network
                .as_ref()
                .map(|network| (ecosystem, network))
        })
    }

    pub fn custom_networks(&self) -> &[CustomNetwork] {
        &self.custom_networks
    }

    fn network_config(&self, ecosystem: &str, network: &str) -> Option<&NetworkConfig> {
        self.ecosystems.get(ecosystem)?.networks.get(network)
    }

    pub fn default_provider(&self, ecosystem: &str, network: &str) -> Option<&str> {
        self.network_config(ecosystem, network)?
            .default_provider
            .as_deref()
    }

    /// Configured settings for a provider, empty when none are set
    pub fn provider_settings(
        &self,
        ecosystem: &str,
        network: &str,
        provider: &str,
    ) -> ProviderSettings {
        self.network_config(ecosystem, network)
            .and_then(|config| config.providers.get(provider))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_provider_settings(
        &mut self,
        ecosystem: &str,
        network: &str,
        provider: &str,
        settings: ProviderSettings,
    ) {
        self.ecosystems
            .entry(ecosystem.to_string())
            .or_default()
            .networks
            .entry(network.to_string())
            .or_default()
            .providers
            .insert(provider.to_string(), settings);
    }

    pub fn set_default_provider(&mut self, ecosystem: &str, network: &str, provider: &str) {
        self.ecosystems
            .entry(ecosystem.to_string())
            .or_default()
            .networks
            .entry(network.to_string())
            .or_default()
            .default_provider = Some(provider.to_string());
    }
}
