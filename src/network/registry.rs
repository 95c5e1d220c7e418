use crate::config::{Config, CustomNetwork};
use crate::error::{NetworkError, Result};
use crate::network::choice::{same_uri, Endpoint};
use log::debug;
use std::collections::BTreeMap;

pub const LOCAL_NETWORK_NAME: &str = "local";
pub const CUSTOM_NETWORK_NAME: &str = "custom";
pub const FORK_SUFFIX: &str = "-fork";
pub const DEFAULT_PROVIDER_NAME: &str = "node";
pub const DEFAULT_LOCAL_CHAIN_ID: u64 = 1337;

/// A single chain instance within an ecosystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub name: String,
    pub ecosystem: String,
    pub chain_id: Option<u64>,
    /// Public RPC endpoints, first one is the default
    pub rpc: Vec<String>,
    pub default_provider: Option<String>,
    pub is_local: bool,
    /// Name of the live network this one forks, for `-fork` networks
    pub upstream: Option<String>,
}

impl NetworkInfo {
    pub fn live(ecosystem: &str, name: &str, chain_id: u64, rpc: &[&str]) -> NetworkInfo {
        NetworkInfo {
            name: name.to_string(),
            ecosystem: ecosystem.to_string(),
            chain_id: Some(chain_id),
            rpc: rpc.iter().map(|uri| uri.to_string()).collect(),
            default_provider: Some(DEFAULT_PROVIDER_NAME.to_string()),
            is_local: false,
            upstream: None,
        }
    }

    fn local(ecosystem: &str) -> NetworkInfo {
        NetworkInfo {
            name: LOCAL_NETWORK_NAME.to_string(),
            ecosystem: ecosystem.to_string(),
            chain_id: Some(DEFAULT_LOCAL_CHAIN_ID),
            rpc: vec![],
            default_provider: Some(DEFAULT_PROVIDER_NAME.to_string()),
            is_local: true,
            upstream: None,
        }
    }

    fn custom(ecosystem: &str) -> NetworkInfo {
        NetworkInfo {
            name: CUSTOM_NETWORK_NAME.to_string(),
            ecosystem: ecosystem.to_string(),
            chain_id: None,
            rpc: vec![],
            default_provider: Some(DEFAULT_PROVIDER_NAME.to_string()),
            is_local: false,
            upstream: None,
        }
    }

    fn fork_of(upstream: &NetworkInfo) -> NetworkInfo {
        NetworkInfo {
            name: format!("{}{FORK_SUFFIX}", upstream.name),
            ecosystem: upstream.ecosystem.clone(),
            chain_id: upstream.chain_id,
            rpc: vec![],
            default_provider: None,
            is_local: false,
            upstream: Some(upstream.name.clone()),
        }
    }

    pub fn is_fork(&self) -> bool {
        self.upstream.is_some()
    }

    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_NETWORK_NAME
    }

    /// Live networks can be forked; local, custom and fork networks cannot
    pub fn is_forkable(&self) -> bool {
        !self.is_local && !self.is_fork() && !self.is_custom()
    }

    pub fn fork_name(&self) -> String {
        format!("{}{FORK_SUFFIX}", self.name)
    }

    pub fn serves_endpoint(&self, endpoint: &Endpoint) -> bool {
        match endpoint {
            Endpoint::Http(uri) => self.rpc.iter().any(|known| same_uri(known, uri)),
            Endpoint::Ipc(_) => false,
        }
    }
}

/// A family of compatible networks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ecosystem {
    pub name: String,
    pub default_network: String,
    networks: BTreeMap<String, NetworkInfo>,
}

impl Ecosystem {
    pub fn new(name: &str, default_network: &str) -> Ecosystem {
        let mut networks = BTreeMap::new();
        networks.insert(LOCAL_NETWORK_NAME.to_string(), NetworkInfo::local(name));
        networks.insert(CUSTOM_NETWORK_NAME.to_string(), NetworkInfo::custom(name));
        Ecosystem {
            name: name.to_string(),
            default_network: default_network.to_string(),
            networks,
        }
    }

    pub fn add_network(&mut self, network: NetworkInfo) {
        self.networks.insert(network.name.clone(), network);
    }

    pub fn get_network(&self, name: &str) -> Option<&NetworkInfo> {
        self.networks.get(name)
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkInfo> {
        self.networks.values()
    }

    fn add_fork_networks(&mut self) {
        let forks: Vec<NetworkInfo> = self
            .networks
            .values()
            .filter(|network| network.is_forkable())
            .filter(|network| !self.networks.contains_key(&network.fork_name()))
            .map(NetworkInfo::fork_of)
            .collect();
        for fork in forks {
            self.add_network(fork);
        }
    }
}

/// Known ecosystems and networks
///
/// Built from the bundled chain table plus any custom networks in the
/// config. Every forkable network gets a `<name>-fork` sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRegistry {
    ecosystems: BTreeMap<String, Ecosystem>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NetworkRegistry {
    pub fn empty() -> NetworkRegistry {
        NetworkRegistry {
            ecosystems: BTreeMap::new(),
        }
    }

    /// Registry with the bundled chain table
    pub fn builtin() -> NetworkRegistry {
        let mut registry = NetworkRegistry::empty();

        let mut ethereum = Ecosystem::new("ethereum", LOCAL_NETWORK_NAME);
        ethereum.add_network(NetworkInfo::live(
            "ethereum",
            "mainnet",
            1,
            &[
                "https://ethereum-rpc.publicnode.com",
                "https://eth.llamarpc.com",
            ],
        ));
        ethereum.add_network(NetworkInfo::live(
            "ethereum",
            "sepolia",
            11155111,
            &[
                "https://ethereum-sepolia-rpc.publicnode.com",
                "https://rpc.sepolia.org",
            ],
        ));
        ethereum.add_network(NetworkInfo::live(
            "ethereum",
            "holesky",
            17000,
            &["https://ethereum-holesky-rpc.publicnode.com"],
        ));
        registry.add_ecosystem(ethereum);

        let mut moonbeam = Ecosystem::new("moonbeam", "moonbeam");
        moonbeam.add_network(NetworkInfo::live(
            "moonbeam",
            "moonbeam",
            1284,
            &[
                "https://rpc.api.moonbeam.network",
                "https://moonbeam.api.onfinality.io/public",
            ],
        ));
        moonbeam.add_network(NetworkInfo::live(
            "moonbeam",
            "moonriver",
            1285,
            &[
                "https://rpc.api.moonriver.moonbeam.network",
                "https://moonriver.api.onfinality.io/public",
            ],
        ));
        moonbeam.add_network(NetworkInfo::live(
            "moonbeam",
            "moonbase-alpha",
            1287,
            &["https://rpc.api.moonbase.moonbeam.network"],
        ));
        registry.add_ecosystem(moonbeam);

        let mut arbitrum = Ecosystem::new("arbitrum", "mainnet");
        arbitrum.add_network(NetworkInfo::live(
            "arbitrum",
            "mainnet",
            42161,
            &["https://arb1.arbitrum.io/rpc"],
        ));
        arbitrum.add_network(NetworkInfo::live(
            "arbitrum",
            "sepolia",
            421614,
            &["https://sepolia-rollup.arbitrum.io/rpc"],
        ));
        registry.add_ecosystem(arbitrum);

        let mut optimism = Ecosystem::new("optimism", "mainnet");
        optimism.add_network(NetworkInfo::live(
            "optimism",
            "mainnet",
            10,
            &["https://mainnet.optimism.io"],
        ));
        optimism.add_network(NetworkInfo::live(
            "optimism",
            "sepolia",
            11155420,
            &["https://sepolia.optimism.io"],
        ));
        registry.add_ecosystem(optimism);

        let mut base = Ecosystem::new("base", "mainnet");
        base.add_network(NetworkInfo::live(
            "base",
            "mainnet",
            8453,
            &["https://mainnet.base.org"],
        ));
        base.add_network(NetworkInfo::live(
            "base",
            "sepolia",
            84532,
            &["https://sepolia.base.org"],
        ));
        registry.add_ecosystem(base);

        let mut polygon = Ecosystem::new("polygon", "mainnet");
        polygon.add_network(NetworkInfo::live(
            "polygon",
            "mainnet",
            137,
            &["https://polygon-rpc.com"],
        ));
        polygon.add_network(NetworkInfo::live(
            "polygon",
            "amoy",
            80002,
            &["https://rpc-amoy.polygon.technology"],
        ));
        registry.add_ecosystem(polygon);

        registry.add_fork_networks();
        registry
    }

    /// Bundled table plus the config's custom networks and default overrides
    pub fn from_config(config: &Config) -> Result<NetworkRegistry> {
        let mut registry = NetworkRegistry::builtin();
        for custom in config.custom_networks() {
            registry.add_custom_network(custom)?;
        }
        for (ecosystem, network) in config.default_networks() {
            let entry = registry.ecosystems.get_mut(ecosystem).ok_or_else(|| {
                NetworkError::Config(format!(
                    "Default network set for unknown ecosystem '{ecosystem}'"
                ))
            })?;
            if entry.get_network(network).is_none() {
                return Err(NetworkError::Config(format!(
                    "Default network '{network}' is not part of ecosystem '{ecosystem}'"
                )));
            }
            entry.default_network = network.clone();
        }
        registry.add_fork_networks();
        Ok(registry)
    }

    pub fn add_ecosystem(&mut self, ecosystem: Ecosystem) {
        self.ecosystems.insert(ecosystem.name.clone(), ecosystem);
    }

    pub fn add_custom_network(&mut self, custom: &CustomNetwork) -> Result<()> {
        if custom.name.is_empty() || custom.name.contains(':') {
            return Err(NetworkError::Config(format!(
                "Invalid custom network name '{}'",
                custom.name
            )));
        }
        let ecosystem = self
            .ecosystems
            .entry(custom.ecosystem.clone())
            .or_insert_with(|| Ecosystem::new(&custom.ecosystem, LOCAL_NETWORK_NAME));
        if ecosystem.get_network(&custom.name).is_some() {
            return Err(NetworkError::Config(format!(
                "Custom network '{}:{}' already exists",
                custom.ecosystem, custom.name
            )));
        }

        debug!(
            "Registering custom network {}:{}",
            custom.ecosystem, custom.name
        );
        ecosystem.add_network(NetworkInfo {
            name: custom.name.clone(),
            ecosystem: custom.ecosystem.clone(),
            chain_id: Some(custom.chain_id),
            rpc: custom.rpc.clone(),
            default_provider: Some(
                custom
                    .default_provider
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string()),
            ),
            is_local: false,
            upstream: None,
        });
        Ok(())
    }

    fn add_fork_networks(&mut self) {
        for ecosystem in self.ecosystems.values_mut() {
            ecosystem.add_fork_networks();
        }
    }

    pub fn get_ecosystem(&self, name: &str) -> Result<&Ecosystem> {
        self.ecosystems.get(name).ok_or_else(|| {
            NetworkError::Resolution(format!(
                "No ecosystem named '{name}'. Options: {}",
                self.ecosystem_names().join(", ")
            ))
        })
    }

    pub fn get_network(&self, ecosystem: &str, network: &str) -> Result<&NetworkInfo> {
        self.get_ecosystem(ecosystem)?
            .get_network(network)
            .ok_or_else(|| {
                NetworkError::Resolution(format!(
                    "No network named '{network}' in ecosystem '{ecosystem}'"
                ))
            })
    }

    pub fn ecosystems(&self) -> impl Iterator<Item = &Ecosystem> {
        self.ecosystems.values()
    }

    pub fn ecosystem_names(&self) -> Vec<String> {
        self.ecosystems.keys().cloned().collect()
    }

    /// Every network with the given name, across ecosystems
    pub fn networks_named(&self, name: &str) -> Vec<&NetworkInfo> {
        self.ecosystems
            .values()
            .filter_map(|ecosystem| ecosystem.get_network(name))
            .collect()
    }

    /// Network whose known RPC endpoints include this endpoint
    ///
    /// The preferred ecosystem is searched first.
    pub fn find_by_endpoint(
        &self,
        endpoint: &Endpoint,
        preferred_ecosystem: &str,
    ) -> Option<&NetworkInfo> {
        let preferred = self.ecosystems.get(preferred_ecosystem).into_iter();
        let others = self
            .ecosystems
            .values()
            .filter(|ecosystem| ecosystem.name != preferred_ecosystem);
        preferred
            .chain(others)
            .flat_map(|ecosystem| ecosystem.networks())
            .find(|network| network.serves_endpoint(endpoint))
    }
}
