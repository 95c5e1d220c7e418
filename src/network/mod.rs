//! Network selection
//!
//! This module turns network choice strings into connected providers:
//! parsing the choice grammar, looking up ecosystems and networks, and
//! resolving, connecting and forking through the `NetworkManager`.

pub mod choice;
pub mod context;
pub mod manager;
pub mod registry;

pub use choice::{Endpoint, NetworkChoice, ProviderChoice, PID_SCHEME};
pub use context::ProviderContext;
pub use manager::{NetworkManager, ResolvedChoice};
pub use registry::{
    Ecosystem, NetworkInfo, NetworkRegistry, CUSTOM_NETWORK_NAME, DEFAULT_PROVIDER_NAME,
    LOCAL_NETWORK_NAME,
};
