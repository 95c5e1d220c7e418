//! Test utilities for network resolution testing

use crate::config::Config;
use crate::error::{NetworkError, Result};
use crate::network::choice::Endpoint;
use crate::network::registry::{NetworkInfo, NetworkRegistry};
use crate::network::NetworkManager;
use crate::process::{NodeProcess, RunningNodes};
use crate::provider::{Provider, ProviderFactory, ProviderRegistry, ProviderSettings, ProviderTarget};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Manager with the bundled networks, the `node` provider and no recorded nodes
pub fn test_manager() -> NetworkManager {
    test_manager_with_nodes(vec![])
}

/// Manager whose in-memory running-node records hold `processes`
pub fn test_manager_with_nodes(processes: Vec<NodeProcess>) -> NetworkManager {
    let mut running_nodes = RunningNodes::in_memory();
    for process in processes {
        running_nodes
            .register(process)
            .expect("in-memory records never touch disk");
    }
    NetworkManager::new(
        Config::default(),
        NetworkRegistry::builtin(),
        ProviderRegistry::with_defaults(Duration::from_secs(5)),
        Box::new(running_nodes),
    )
}

/// A local ethereum `node` record listening on an IPC path
pub fn node_process(pid: u32, ipc_path: &str) -> NodeProcess {
    NodeProcess {
        pid,
        ecosystem: "ethereum".to_string(),
        network: "local".to_string(),
        provider: "node".to_string(),
        endpoint: Endpoint::Ipc(PathBuf::from(ipc_path)),
    }
}

/// PID of a process that has already exited
pub fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true")
        .spawn()
        .expect("spawn `true`");
    let pid = child.id();
    child.wait().expect("wait for `true`");
    pid
}

/// Shared connect/disconnect counters for `MockProvider`
#[derive(Debug, Clone, Default)]
pub struct ProviderLog {
    connects: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

impl ProviderLog {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

/// In-memory provider that answers `eth_chainId` with 1337
pub struct MockProvider {
    name: String,
    ecosystem: String,
    network: String,
    settings: ProviderSettings,
    connected: bool,
    fail_connect: bool,
    log: ProviderLog,
}

impl MockProvider {
    pub fn new(ecosystem: &str, network: &str, log: &ProviderLog) -> MockProvider {
        MockProvider {
            name: "mock".to_string(),
            ecosystem: ecosystem.to_string(),
            network: network.to_string(),
            settings: ProviderSettings::new(),
            connected: false,
            fail_connect: false,
            log: log.clone(),
        }
    }

    pub fn from_target(target: ProviderTarget, log: &ProviderLog) -> MockProvider {
        MockProvider {
            name: target.provider,
            ecosystem: target.ecosystem,
            network: target.network.name,
            settings: target.settings,
            connected: false,
            fail_connect: false,
            log: log.clone(),
        }
    }

    pub fn failing_connect(mut self) -> MockProvider {
        self.fail_connect = true;
        self
    }
}

impl Provider for MockProvider {
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
        None
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(NetworkError::Provider("mock refused".to_string()));
        }
        self.connected = true;
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn provider_settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn provider_settings_mut(&mut self) -> &mut ProviderSettings {
        &mut self.settings
    }

    fn request(&mut self, method: &str, _params: Value) -> Result<Value> {
        match method {
            "eth_chainId" if self.connected => Ok(json!("0x539")),
            "eth_chainId" => Err(NetworkError::Provider("not connected".to_string())),
            other => Err(NetworkError::Provider(format!("unsupported {other}"))),
        }
    }
}

/// Fork provider factory that records every target it is asked to build
#[derive(Clone, Default)]
pub struct ForkRecorder {
    calls: Arc<Mutex<Vec<ProviderTarget>>>,
    log: ProviderLog,
}

impl ForkRecorder {
    pub fn calls(&self) -> Vec<ProviderTarget> {
        self.calls.lock().expect("recorder lock").clone()
    }

    pub fn log(&self) -> &ProviderLog {
        &self.log
    }
}

impl ProviderFactory for ForkRecorder {
    fn create(&self, target: ProviderTarget) -> Result<Box<dyn Provider>> {
        self.calls.lock().expect("recorder lock").push(target.clone());
        Ok(Box::new(MockProvider::from_target(target, &self.log)))
    }

    fn supports(&self, network: &NetworkInfo) -> bool {
        network.is_fork()
    }
}

/// Removes the socket file when the test is done
pub struct IpcNode {
    path: PathBuf,
}

impl IpcNode {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IpcNode {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Serve newline-delimited JSON-RPC on a Unix socket, answering
/// `eth_chainId` with `chain_id`
#[cfg(unix)]
pub fn spawn_ipc_node(path: &Path, chain_id: u64) -> IpcNode {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixListener;
    use std::thread;

    let listener = UnixListener::bind(path).expect("bind IPC socket");
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            thread::spawn(move || {
                let reader = BufReader::new(&stream);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    let Ok(request) = serde_json::from_str::<Value>(&line) else {
                        break;
                    };
                    let response = match request["method"].as_str() {
                        Some("eth_chainId") => json!({
                            "jsonrpc": "2.0",
                            "id": request["id"],
                            "result": format!("{chain_id:#x}"),
                        }),
                        _ => json!({
                            "jsonrpc": "2.0",
                            "id": request["id"],
                            "error": {"code": -32601, "message": "method not found"},
                        }),
                    };
                    let mut writer = &stream;
                    if writer
                        .write_all(format!("{response}\n").as_bytes())
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
    });
    IpcNode {
        path: path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_pid_is_dead() {
        assert!(!crate::process::is_process_alive(dead_pid()));
    }

    #[test]
    fn test_mock_provider_chain_id() {
        let log = ProviderLog::default();
        let mut provider = MockProvider::new("ethereum", "local", &log);
        assert!(provider.chain_id().is_err());
        provider.connect().unwrap();
        assert_eq!(provider.chain_id().unwrap(), 1337);
    }

    #[test]
    fn test_fork_recorder_only_serves_forks() {
        let registry = NetworkRegistry::builtin();
        let recorder = ForkRecorder::default();
        assert!(recorder.supports(registry.get_network("ethereum", "mainnet-fork").unwrap()));
        assert!(!recorder.supports(registry.get_network("ethereum", "mainnet").unwrap()));
    }
}
