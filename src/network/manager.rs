use crate::config::Config;
use crate::error::{NetworkError, Result};
use crate::network::choice::{Endpoint, NetworkChoice, ProviderChoice};
use crate::network::context::ProviderContext;
use crate::network::registry::{NetworkInfo, NetworkRegistry, CUSTOM_NETWORK_NAME};
use crate::process::{NodeProcess, ProcessLookup, RunningNodes};
use crate::provider::settings::{IPC_PATH_KEY, URI_KEY};
use crate::provider::{Provider, ProviderRegistry, ProviderSettings, ProviderTarget};
use log::{debug, info};

/// A choice string mapped onto a concrete ecosystem, network and provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChoice {
    pub ecosystem: String,
    pub network: NetworkInfo,
    pub provider: String,
    /// Endpoint named by the choice itself (URL, IPC path or PID record)
    pub endpoint: Option<Endpoint>,
    pub process: Option<NodeProcess>,
}

impl ResolvedChoice {
    /// Normalized `ecosystem:network:provider-or-endpoint` form
    pub fn network_choice(&self) -> String {
        let label = match &self.endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => self.provider.clone(),
        };
        format!("{}:{}:{label}", self.ecosystem, self.network.name)
    }
}

/// Resolves network choice strings into connected providers
///
/// Owns its configuration explicitly; there is no process-wide "current
/// network". Build one per session and pass it where it is needed.
pub struct NetworkManager {
    config: Config,
    registry: NetworkRegistry,
    providers: ProviderRegistry,
    running_nodes: Box<dyn ProcessLookup>,
}

impl NetworkManager {
    pub fn new(
        config: Config,
        registry: NetworkRegistry,
        providers: ProviderRegistry,
        running_nodes: Box<dyn ProcessLookup>,
    ) -> NetworkManager {
        NetworkManager {
            config,
            registry,
            providers,
            running_nodes,
        }
    }

    /// Manager with the bundled networks, the `node` provider and the
    /// running-node records from the config's data folder
    pub fn from_config(config: Config) -> Result<NetworkManager> {
        let registry = NetworkRegistry::from_config(&config)?;
        let providers = ProviderRegistry::with_defaults(config.request_timeout());
        let running_nodes = RunningNodes::open(&config.data_folder())?;
        Ok(NetworkManager::new(
            config,
            registry,
            providers,
            Box::new(running_nodes),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Register additional providers (fork simulators, hosted services)
    pub fn providers_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.providers
    }

    pub fn running_nodes(&self) -> &dyn ProcessLookup {
        self.running_nodes.as_ref()
    }

    /// The choice an empty string resolves to
    pub fn default_network_choice(&self) -> Result<String> {
        Ok(self.resolve(&NetworkChoice::new("", "", ""))?.network_choice())
    }

    /// Resolve and connect; the connection is released when the returned
    /// context is dropped
    pub fn parse_network_choice(&self, choice: &str) -> Result<ProviderContext> {
        let resolved = self.resolve_str(choice)?;
        info!("Connecting to {}", resolved.network_choice());
        let provider = self.create_provider(&resolved)?;
        ProviderContext::connect(provider)
    }

    pub fn resolve_str(&self, choice: &str) -> Result<ResolvedChoice> {
        let parsed: NetworkChoice = choice.parse()?;
        self.resolve(&parsed)
    }

    /// Map a parsed choice onto known names without connecting
    pub fn resolve(&self, choice: &NetworkChoice) -> Result<ResolvedChoice> {
        match choice {
            NetworkChoice::Pid(pid) => self.resolve_pid(*pid),
            NetworkChoice::Segments {
                ecosystem,
                network,
                provider,
            } => self.resolve_segments(ecosystem.as_deref(), network.as_deref(), provider.as_ref()),
        }
    }

    fn resolve_pid(&self, pid: u32) -> Result<ResolvedChoice> {
        let process = self.running_nodes.get_process(pid).ok_or_else(|| {
            NetworkError::Resolution(format!("No running node found with PID {pid}"))
        })?;
        debug!("PID {pid} is a {} node", process.network_choice());

        let network = self
            .registry
            .get_network(&process.ecosystem, &process.network)?
            .clone();
        self.check_provider(&process.provider, &network)?;
        Ok(ResolvedChoice {
            ecosystem: process.ecosystem.clone(),
            network,
            provider: process.provider.clone(),
            endpoint: Some(process.endpoint.clone()),
            process: Some(process),
        })
    }

    fn resolve_segments(
        &self,
        ecosystem: Option<&str>,
        network: Option<&str>,
        provider: Option<&ProviderChoice>,
    ) -> Result<ResolvedChoice> {
        let endpoint = match provider {
            Some(ProviderChoice::Endpoint(endpoint)) => Some(endpoint.clone()),
            _ => None,
        };

        let network = match (ecosystem, network) {
            (Some(ecosystem), Some(network)) => self.registry.get_network(ecosystem, network)?,
            (Some(name), None) if provider.is_none() => self.resolve_single_segment(name)?,
            (Some(ecosystem), None) => self.default_or_endpoint_network(ecosystem, &endpoint, false)?,
            (None, Some(network)) => self
                .registry
                .get_network(self.config.default_ecosystem(), network)?,
            (None, None) => {
                self.default_or_endpoint_network(self.config.default_ecosystem(), &endpoint, true)?
            }
        };

        // A URL or IPC path is handed to the network's default provider
        let provider = match provider {
            Some(ProviderChoice::Named(name)) => name.clone(),
            _ => self.default_provider(network)?,
        };
        self.check_provider(&provider, network)?;

        Ok(ResolvedChoice {
            ecosystem: network.ecosystem.clone(),
            network: network.clone(),
            provider,
            endpoint,
            process: None,
        })
    }

    /// A lone segment names an ecosystem, or else a network unique across
    /// ecosystems
    fn resolve_single_segment(&self, name: &str) -> Result<&NetworkInfo> {
        if let Ok(ecosystem) = self.registry.get_ecosystem(name) {
            return self.registry.get_network(name, &ecosystem.default_network);
        }
        let matches = self.registry.networks_named(name);
        match matches.as_slice() {
            [network] => Ok(*network),
            [] => Err(NetworkError::Resolution(format!(
                "'{name}' is neither an ecosystem nor a known network"
            ))),
            several => Err(NetworkError::Resolution(format!(
                "Network '{name}' is ambiguous; qualify it with an ecosystem ({})",
                several
                    .iter()
                    .map(|network| format!("{}:{}", network.ecosystem, network.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Network for an ecosystem when the choice left it out. An endpoint
    /// that one of the known networks serves selects that network; an
    /// unknown endpoint selects the ecosystem's `custom` network.
    fn default_or_endpoint_network(
        &self,
        ecosystem: &str,
        endpoint: &Option<Endpoint>,
        any_ecosystem: bool,
    ) -> Result<&NetworkInfo> {
        let Some(endpoint) = endpoint else {
            let default = &self.registry.get_ecosystem(ecosystem)?.default_network;
            return self.registry.get_network(ecosystem, default);
        };
        if let Some(network) = self.registry.find_by_endpoint(endpoint, ecosystem) {
            if any_ecosystem || network.ecosystem == ecosystem {
                debug!(
                    "Endpoint {endpoint} belongs to {}:{}",
                    network.ecosystem, network.name
                );
                return Ok(network);
            }
        }
        self.registry.get_network(ecosystem, CUSTOM_NETWORK_NAME)
    }

    fn default_provider(&self, network: &NetworkInfo) -> Result<String> {
        self.config
            .default_provider(&network.ecosystem, &network.name)
            .map(str::to_string)
            .or_else(|| network.default_provider.clone())
            .ok_or_else(|| {
                NetworkError::Resolution(format!(
                    "No default provider for {}:{}. Options: {}",
                    network.ecosystem,
                    network.name,
                    self.providers.names_for(network).join(", ")
                ))
            })
    }

    fn check_provider(&self, provider: &str, network: &NetworkInfo) -> Result<()> {
        let factory = self.providers.get(provider)?;
        if !factory.supports(network) {
            return Err(NetworkError::Resolution(format!(
                "Provider '{provider}' cannot serve {}:{}",
                network.ecosystem, network.name
            )));
        }
        Ok(())
    }

    /// Build (but do not connect) the provider for a resolved choice
    ///
    /// Settings are layered: configured settings for the provider, then the
    /// endpoint from the choice string.
    pub fn create_provider(&self, resolved: &ResolvedChoice) -> Result<Box<dyn Provider>> {
        let mut settings = self.config.provider_settings(
            &resolved.ecosystem,
            &resolved.network.name,
            &resolved.provider,
        );
        if let Some(endpoint) = &resolved.endpoint {
            settings.remove(URI_KEY);
            settings.remove(IPC_PATH_KEY);
            settings.insert(endpoint.settings_key(), endpoint.to_string());
        }

        let target = ProviderTarget {
            ecosystem: resolved.ecosystem.clone(),
            network: resolved.network.clone(),
            provider: resolved.provider.clone(),
            settings,
            explicit_endpoint: resolved.endpoint.clone(),
            process: resolved.process.clone(),
        };
        self.providers.get(&resolved.provider)?.create(target)
    }

    /// Connect to the `-fork` sibling of the provider's network
    ///
    /// The fork provider receives
    /// `{"fork": {ecosystem: {network: {"upstream_provider": uri}}}}`, where
    /// `uri` is the current provider's `uri` setting or, failing that, its
    /// endpoint. `extra` settings are merged on top.
    pub fn fork(
        &self,
        current: &dyn Provider,
        provider_name: Option<&str>,
        extra: Option<ProviderSettings>,
    ) -> Result<ProviderContext> {
        let ecosystem = current.ecosystem_name();
        let upstream = self.registry.get_network(ecosystem, current.network_name())?;
        if upstream.is_fork() {
            return Err(NetworkError::Resolution(format!(
                "{ecosystem}:{} is already a fork",
                upstream.name
            )));
        }
        if !upstream.is_forkable() {
            return Err(NetworkError::Resolution(format!(
                "{ecosystem}:{} cannot be forked",
                upstream.name
            )));
        }
        let fork_network = self.registry.get_network(ecosystem, &upstream.fork_name())?;

        let upstream_uri = current
            .provider_settings()
            .uri()
            .map(str::to_string)
            .or_else(|| current.endpoint().map(|endpoint| endpoint.to_string()))
            .ok_or_else(|| {
                NetworkError::Resolution(format!(
                    "{} has no endpoint to fork from",
                    current.network_choice()
                ))
            })?;

        let provider = match provider_name {
            Some(name) => name.to_string(),
            None => self.default_provider(fork_network)?,
        };
        self.check_provider(&provider, fork_network)?;

        let mut settings =
            self.config
                .provider_settings(ecosystem, &fork_network.name, &provider);
        settings.merge(ProviderSettings::fork(
            ecosystem,
            &upstream.name,
            &upstream_uri,
        ));
        if let Some(extra) = extra {
            settings.merge(extra);
        }

        info!(
            "Forking {ecosystem}:{} from {upstream_uri} with provider '{provider}'",
            upstream.name
        );
        let target = ProviderTarget {
            ecosystem: ecosystem.to_string(),
            network: fork_network.clone(),
            provider: provider.clone(),
            settings,
            explicit_endpoint: None,
            process: None,
        };
        let fork_provider = self.providers.get(&provider)?.create(target)?;
        ProviderContext::connect(fork_provider)
    }
}
