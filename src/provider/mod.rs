//! Providers: the connection implementations that speak to a node
//!
//! A `ProviderRegistry` maps provider names to factories. The resolver hands
//! a factory a `ProviderTarget` describing what to connect to and gets back a
//! boxed `Provider`. The bundled `node` provider speaks JSON-RPC over HTTP(S)
//! or a local IPC socket; anything else (forking simulators, hosted RPC
//! services) plugs in through `ProviderFactory`.

pub mod node;
pub mod settings;
pub mod transport;

use crate::error::{NetworkError, Result};
use crate::network::choice::Endpoint;
use crate::network::registry::NetworkInfo;
use crate::process::NodeProcess;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub use node::{NodeProvider, NodeProviderFactory, DEFAULT_LOCAL_URI};
pub use settings::ProviderSettings;

/// A live or lazily-connecting link to a node
pub trait Provider {
    /// Registered provider name, e.g. `node`
    fn name(&self) -> &str;

    fn ecosystem_name(&self) -> &str;

    fn network_name(&self) -> &str;

    /// URI or IPC path this provider talks to, when it has one
    fn endpoint(&self) -> Option<Endpoint>;

    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;

    fn provider_settings(&self) -> &ProviderSettings;

    fn provider_settings_mut(&mut self) -> &mut ProviderSettings;

    /// Running node record this provider attached to, if any
    fn process(&self) -> Option<&NodeProcess> {
        None
    }

    /// Last segment of `network_choice`: the provider name, or the endpoint
    /// when the choice string named one directly
    fn choice_label(&self) -> String {
        self.name().to_string()
    }

    /// `ecosystem:network:provider` string that resolves back to this provider
    fn network_choice(&self) -> String {
        format!(
            "{}:{}:{}",
            self.ecosystem_name(),
            self.network_name(),
            self.choice_label()
        )
    }

    /// Send a JSON-RPC request and return its `result`
    fn request(&mut self, method: &str, params: Value) -> Result<Value>;

    fn chain_id(&mut self) -> Result<u64> {
        let result = self.request("eth_chainId", Value::Array(vec![]))?;
        parse_quantity(&result)
    }
}

/// Parse a JSON-RPC quantity (`"0x539"` or a plain number)
pub fn parse_quantity(value: &Value) -> Result<u64> {
    if let Some(number) = value.as_u64() {
        return Ok(number);
    }
    let text = value.as_str().ok_or_else(|| {
        NetworkError::Serialization(format!("Expected a hex quantity, got {value}"))
    })?;
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(|| NetworkError::Serialization(format!("Quantity '{text}' lacks 0x prefix")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| NetworkError::Serialization(format!("Invalid quantity '{text}': {e}")))
}

/// Everything a factory needs to build a provider
#[derive(Debug, Clone)]
pub struct ProviderTarget {
    pub ecosystem: String,
    pub network: NetworkInfo,
    pub provider: String,
    pub settings: ProviderSettings,
    /// Endpoint given directly in the choice string
    pub explicit_endpoint: Option<Endpoint>,
    pub process: Option<NodeProcess>,
}

impl ProviderTarget {
    pub fn choice_label(&self) -> String {
        match &self.explicit_endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => self.provider.clone(),
        }
    }
}

/// Builds providers for a registered name
pub trait ProviderFactory {
    fn create(&self, target: ProviderTarget) -> Result<Box<dyn Provider>>;

    /// Whether this provider can serve the given network
    fn supports(&self, _network: &NetworkInfo) -> bool {
        true
    }
}

/// Provider name to factory
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Box<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> ProviderRegistry {
        Self::default()
    }

    /// Registry with the bundled `node` provider
    pub fn with_defaults(request_timeout: Duration) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(
            node::NODE_PROVIDER_NAME,
            Box::new(NodeProviderFactory::new(request_timeout)),
        );
        registry
    }

    /// Register a factory, replacing any previous one with the same name
    pub fn register(&mut self, name: &str, factory: Box<dyn ProviderFactory>) {
        debug!("Registering provider '{name}'");
        self.factories.insert(name.to_string(), factory);
    }

    pub fn get(&self, name: &str) -> Result<&dyn ProviderFactory> {
        self.factories
            .get(name)
            .map(|factory| factory.as_ref())
            .ok_or_else(|| {
                NetworkError::Resolution(format!(
                    "No provider named '{name}'. Options: {}",
                    self.names().join(", ")
                ))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Providers able to serve a network
    pub fn names_for(&self, network: &NetworkInfo) -> Vec<String> {
        self.factories
            .iter()
            .filter(|(_, factory)| factory.supports(network))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
