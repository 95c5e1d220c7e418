use crate::error::{NetworkError, Result};
use crate::network::choice::Endpoint;
use crate::provider::Provider;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const RUNNING_NODES_FILE: &str = "running_nodes.json";

/// A node process started outside this crate, recorded so later sessions
/// can attach to it with `pid://<pid>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProcess {
    pub pid: u32,
    pub ecosystem: String,
    pub network: String,
    pub provider: String,
    pub endpoint: Endpoint,
}

impl NodeProcess {
    pub fn network_choice(&self) -> String {
        format!("{}:{}:{}", self.ecosystem, self.network, self.endpoint)
    }
}

/// Finds running node processes
pub trait ProcessLookup {
    /// PIDs of live nodes launched for the same ecosystem, network and endpoint
    fn lookup_processes<'a>(&'a self, provider: &dyn Provider)
        -> Box<dyn Iterator<Item = u32> + 'a>;

    /// The record for a PID, only if that process is still alive
    fn get_process(&self, pid: u32) -> Option<NodeProcess>;
}

/// Whether a process with this PID exists
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // 0 and values past i32::MAX would address process groups
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return false,
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_alive(pid: u32) -> bool {
    pid != 0
}

/// Record of running node processes, persisted as JSON in the data folder
#[derive(Debug, Default)]
pub struct RunningNodes {
    path: Option<PathBuf>,
    nodes: BTreeMap<u32, NodeProcess>,
}

impl RunningNodes {
    /// Records that are never written to disk
    pub fn in_memory() -> RunningNodes {
        RunningNodes::default()
    }

    /// Load `running_nodes.json` from the data folder (empty if missing)
    pub fn open(data_folder: &Path) -> Result<RunningNodes> {
        let path = data_folder.join(RUNNING_NODES_FILE);
        let nodes = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let records: Vec<NodeProcess> = serde_json::from_str(&text).map_err(|e| {
                NetworkError::Serialization(format!("Corrupt {}: {e}", path.display()))
            })?;
            records
                .into_iter()
                .map(|record| (record.pid, record))
                .collect()
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} running node record(s)", nodes.len());
        Ok(RunningNodes {
            path: Some(path),
            nodes,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&self) -> Result<()> {
        self.write(&self.nodes)
    }

    fn write(&self, nodes: &BTreeMap<u32, NodeProcess>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let records: Vec<&NodeProcess> = nodes.values().collect();
        let text = serde_json::to_string_pretty(&records)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Persist `nodes` and only then adopt them, so a failed write leaves
    /// the records as they were
    fn commit(&mut self, nodes: BTreeMap<u32, NodeProcess>) -> Result<()> {
        self.write(&nodes)?;
        self.nodes = nodes;
        Ok(())
    }

    /// Record a node; replaces an older record with the same PID
    pub fn register(&mut self, process: NodeProcess) -> Result<()> {
        info!(
            "Registering node PID {} at {}",
            process.pid,
            process.network_choice()
        );
        let mut nodes = self.nodes.clone();
        nodes.insert(process.pid, process);
        self.commit(nodes)
    }

    pub fn unregister(&mut self, pid: u32) -> Result<Option<NodeProcess>> {
        let mut nodes = self.nodes.clone();
        let removed = nodes.remove(&pid);
        if removed.is_some() {
            self.commit(nodes)?;
            info!("Unregistered node PID {pid}");
        }
        Ok(removed)
    }

    /// Raw record lookup, alive or not
    pub fn get(&self, pid: u32) -> Option<&NodeProcess> {
        self.nodes.get(&pid)
    }

    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.keys().copied()
    }

    pub fn processes(&self) -> impl Iterator<Item = &NodeProcess> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop records whose processes are gone; returns the removed PIDs
    pub fn cache_cleanup(&mut self) -> Result<Vec<u32>> {
        let dead: Vec<u32> = self
            .nodes
            .keys()
            .copied()
            .filter(|pid| !is_process_alive(*pid))
            .collect();
        if !dead.is_empty() {
            let mut nodes = self.nodes.clone();
            for pid in &dead {
                warn!("Removing record of dead node PID {pid}");
                nodes.remove(pid);
            }
            self.commit(nodes)?;
        }
        Ok(dead)
    }
}

impl ProcessLookup for RunningNodes {
    fn lookup_processes<'a>(
        &'a self,
        provider: &dyn Provider,
    ) -> Box<dyn Iterator<Item = u32> + 'a> {
        let ecosystem = provider.ecosystem_name().to_string();
        let network = provider.network_name().to_string();
        let endpoint = provider.endpoint();
        Box::new(
            self.nodes
                .values()
                .filter(move |process| {
                    process.ecosystem == ecosystem
                        && process.network == network
                        && endpoint
                            .as_ref()
                            .is_some_and(|endpoint| endpoint.matches(&process.endpoint))
                })
                .map(|process| process.pid)
                .filter(|pid| is_process_alive(*pid)),
        )
    }

    fn get_process(&self, pid: u32) -> Option<NodeProcess> {
        self.nodes
            .get(&pid)
            .filter(|process| is_process_alive(process.pid))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{dead_pid, node_process, test_manager};
    use tempfile::tempdir;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
        assert!(!is_process_alive(0));
    }

    #[test]
    fn test_register_and_get() {
        let mut nodes = RunningNodes::in_memory();
        let process = node_process(std::process::id(), "/tmp/geth.ipc");
        nodes.register(process.clone()).unwrap();

        assert_eq!(nodes.get(process.pid), Some(&process));
        assert_eq!(nodes.get_process(process.pid), Some(process));
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_get_process_skips_dead_pids() {
        let mut nodes = RunningNodes::in_memory();
        let pid = dead_pid();
        nodes.register(node_process(pid, "/tmp/gone.ipc")).unwrap();
        assert!(nodes.get(pid).is_some());
        assert!(nodes.get_process(pid).is_none());
    }

    #[test]
    fn test_persists_across_open() {
        let dir = tempdir().unwrap();
        let process = node_process(std::process::id(), "/tmp/geth.ipc");
        {
            let mut nodes = RunningNodes::open(dir.path()).unwrap();
            assert!(nodes.is_empty());
            nodes.register(process.clone()).unwrap();
        }

        let nodes = RunningNodes::open(dir.path()).unwrap();
        assert_eq!(nodes.get(process.pid), Some(&process));
        assert!(dir.path().join(RUNNING_NODES_FILE).exists());
    }

    #[test]
    fn test_unregister() {
        let dir = tempdir().unwrap();
        let mut nodes = RunningNodes::open(dir.path()).unwrap();
        let pid = std::process::id();
        nodes.register(node_process(pid, "/tmp/geth.ipc")).unwrap();

        assert!(nodes.unregister(pid).unwrap().is_some());
        assert!(nodes.unregister(pid).unwrap().is_none());
        assert!(RunningNodes::open(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_cache_cleanup_removes_dead() {
        let dir = tempdir().unwrap();
        let mut nodes = RunningNodes::open(dir.path()).unwrap();
        let alive = std::process::id();
        let dead = dead_pid();
        nodes.register(node_process(alive, "/tmp/a.ipc")).unwrap();
        nodes.register(node_process(dead, "/tmp/b.ipc")).unwrap();

        assert_eq!(nodes.cache_cleanup().unwrap(), vec![dead]);
        assert_eq!(nodes.pids().collect::<Vec<_>>(), vec![alive]);
        assert_eq!(RunningNodes::open(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_records() {
        let dir = tempdir().unwrap();
        let pid = std::process::id();
        let mut nodes = RunningNodes::open(dir.path()).unwrap();
        // A directory where the records file should go makes every write fail
        fs::create_dir(dir.path().join(RUNNING_NODES_FILE)).unwrap();

        assert!(nodes.register(node_process(pid, "/tmp/geth.ipc")).is_err());
        assert!(nodes.is_empty());
        assert!(nodes.get(pid).is_none());
    }

    #[test]
    fn test_failed_write_keeps_unregistered_record() {
        let dir = tempdir().unwrap();
        let pid = std::process::id();
        let mut nodes = RunningNodes::open(dir.path()).unwrap();
        nodes.register(node_process(pid, "/tmp/geth.ipc")).unwrap();

        let path = dir.path().join(RUNNING_NODES_FILE);
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(nodes.unregister(pid).is_err());
        assert!(nodes.get(pid).is_some());
    }

    #[test]
    fn test_lookup_ignores_trailing_slash() {
        let pid = std::process::id();
        let mut nodes = RunningNodes::in_memory();
        nodes
            .register(NodeProcess {
                endpoint: Endpoint::Http("http://127.0.0.1:8545/".to_string()),
                ..node_process(pid, "/unused.ipc")
            })
            .unwrap();

        let manager = test_manager();
        let provider = manager
            .create_provider(
                &manager
                    .resolve_str("ethereum:local:http://127.0.0.1:8545")
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(
            nodes.lookup_processes(provider.as_ref()).collect::<Vec<_>>(),
            vec![pid]
        );
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(RUNNING_NODES_FILE), "not json").unwrap();
        let result = RunningNodes::open(dir.path());
        assert!(matches!(result, Err(NetworkError::Serialization(_))));
    }
}
