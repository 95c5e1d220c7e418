//! Configuration management
//!
//! This module handles the configuration object threaded through network
//! resolution: default ecosystem and networks, per-provider settings,
//! custom networks and the data folder.

pub mod settings;

pub use settings::{Config, CustomNetwork, EcosystemConfig, NetworkConfig};
