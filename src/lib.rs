//! # netchoice - Network Selection for Blockchain Development
//!
//! Picks which blockchain network to talk to and connects to it.
//!
//! ## What It Does
//! - **Choice strings**: `ecosystem:network:provider`, `ecosystem:network`,
//!   an alias, a bare HTTP(S) URL or IPC path, or `pid://<pid>`
//! - **Resolution**: maps a choice onto a known ecosystem, network and
//!   provider, failing loudly on anything unknown
//! - **Scoped connections**: `ProviderContext` disconnects when dropped
//! - **Forking**: hands a fork provider the upstream endpoint of a live network
//! - **Running nodes**: records node processes so later sessions can attach
//!   to them by PID
//!
//! ## How the Code Is Organized
//! - `network/`: choice grammar, network registry, the resolver and the
//!   connection guard
//! - `provider/`: the `Provider` trait, the provider registry, settings and
//!   the bundled JSON-RPC `node` provider
//! - `process/`: running node records and process lookup
//! - `config/`: the configuration object handed to the resolver
//! - `cli/`: command-line interface
//!
//! ## Example
//! ```no_run
//! use netchoice::{Config, NetworkManager};
//!
//! let manager = NetworkManager::from_config(Config::new())?;
//! let mut provider = manager.parse_network_choice("moonbeam:moonriver")?;
//! assert_eq!(provider.network_choice(), "moonbeam:moonriver:node");
//! let _chain_id = provider.chain_id()?;
//! # Ok::<(), netchoice::NetworkError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod process;
pub mod provider;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, CustomNetwork};
pub use error::{NetworkError, Result};
pub use network::{
    Endpoint, NetworkChoice, NetworkInfo, NetworkManager, NetworkRegistry, ProviderChoice,
    ProviderContext, ResolvedChoice,
};
pub use process::{is_process_alive, NodeProcess, ProcessLookup, RunningNodes};
pub use provider::{
    NodeProvider, NodeProviderFactory, Provider, ProviderFactory, ProviderRegistry,
    ProviderSettings, ProviderTarget,
};
