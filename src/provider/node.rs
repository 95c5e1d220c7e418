use crate::error::{NetworkError, Result};
use crate::network::choice::Endpoint;
use crate::network::registry::NetworkInfo;
use crate::process::NodeProcess;
use crate::provider::transport::{HttpTransport, RpcRequest, Transport};
use crate::provider::{Provider, ProviderFactory, ProviderSettings, ProviderTarget};
use log::{debug, info};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

pub const NODE_PROVIDER_NAME: &str = "node";
pub const DEFAULT_LOCAL_URI: &str = "http://127.0.0.1:8545";

/// JSON-RPC provider for a regular node, over HTTP(S) or IPC
///
/// The endpoint is taken from the `ipc_path` setting, then `uri`, then the
/// network's first public RPC endpoint (or the default local URI for local
/// networks). Settings stay mutable, so the endpoint is re-read on connect.
pub struct NodeProvider {
    name: String,
    ecosystem: String,
    network: String,
    settings: ProviderSettings,
    fallback_uri: Option<String>,
    explicit_endpoint: Option<Endpoint>,
    process: Option<NodeProcess>,
    timeout: Duration,
    transport: Option<Transport>,
    next_id: u64,
}

impl NodeProvider {
    pub fn new(target: ProviderTarget, timeout: Duration) -> NodeProvider {
        let fallback_uri = fallback_uri(&target.network);
        NodeProvider {
            name: target.provider,
            ecosystem: target.ecosystem,
            network: target.network.name,
            settings: target.settings,
            fallback_uri,
            explicit_endpoint: target.explicit_endpoint,
            process: target.process,
            timeout,
            transport: None,
            next_id: 1,
        }
    }

    fn resolve_endpoint(&self) -> Result<Endpoint> {
        if let Some(path) = self.settings.ipc_path() {
            return Ok(Endpoint::Ipc(PathBuf::from(path)));
        }
        if let Some(uri) = self.settings.uri() {
            return Endpoint::parse(uri);
        }
        match &self.fallback_uri {
            Some(uri) => Endpoint::parse(uri),
            None => Err(NetworkError::Provider(format!(
                "No endpoint configured for {}:{}; set the 'uri' provider setting",
                self.ecosystem, self.network
            ))),
        }
    }
}

fn fallback_uri(network: &NetworkInfo) -> Option<String> {
    if network.is_local {
        return Some(DEFAULT_LOCAL_URI.to_string());
    }
    network.rpc.first().cloned()
}

impl Provider for NodeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn ecosystem_name(&self) -> &str {
        &self.ecosystem
    }

    fn network_name(&self) -> &str {
        &self.network
    }

    fn endpoint(&self) -> Option<Endpoint> {
        self.resolve_endpoint().ok()
    }

    fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    fn connect(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Ok(());
        }
        let endpoint = self.resolve_endpoint()?;
        let transport = match &endpoint {
            Endpoint::Http(_) => {
                let url = endpoint.url().ok_or_else(|| {
                    NetworkError::Provider(format!("Invalid URL '{endpoint}'"))
                })?;
                Transport::Http(HttpTransport::new(url, self.timeout)?)
            }
            #[cfg(unix)]
            Endpoint::Ipc(path) => Transport::Ipc(
                crate::provider::transport::IpcTransport::connect(path, self.timeout)?,
            ),
            #[cfg(not(unix))]
            Endpoint::Ipc(path) => {
                return Err(NetworkError::Provider(format!(
                    "IPC endpoint {} needs a Unix platform",
                    path.display()
                )))
            }
        };
        self.transport = Some(transport);
        info!("Connected to {} via {endpoint}", self.network_choice());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        match self.transport.take() {
            #[cfg(unix)]
            Some(Transport::Ipc(ipc)) => {
                // The peer may already be gone
                if let Err(e) = ipc.shutdown() {
                    debug!("Ignoring IPC shutdown error: {e}");
                }
            }
            Some(_) => {}
            None => return Ok(()),
        }
        info!("Disconnected from {}", self.network_choice());
        Ok(())
    }

    fn provider_settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn provider_settings_mut(&mut self) -> &mut ProviderSettings {
        &mut self.settings
    }

    fn process(&self) -> Option<&NodeProcess> {
        self.process.as_ref()
    }

    fn choice_label(&self) -> String {
        match &self.explicit_endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => self.name.clone(),
        }
    }

    fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let transport = self.transport.as_mut().ok_or_else(|| {
            NetworkError::Provider(format!(
                "Not connected to {}:{}",
                self.ecosystem, self.network
            ))
        })?;
        transport.send(&RpcRequest::new(id, method, params))
    }
}

/// Factory for the bundled `node` provider
pub struct NodeProviderFactory {
    timeout: Duration,
}

impl NodeProviderFactory {
    pub fn new(timeout: Duration) -> NodeProviderFactory {
        NodeProviderFactory { timeout }
    }
}

impl ProviderFactory for NodeProviderFactory {
    fn create(&self, target: ProviderTarget) -> Result<Box<dyn Provider>> {
        Ok(Box::new(NodeProvider::new(target, self.timeout)))
    }

    fn supports(&self, network: &NetworkInfo) -> bool {
        !network.is_fork()
    }
}
