use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const URI_KEY: &str = "uri";
pub const IPC_PATH_KEY: &str = "ipc_path";
pub const FORK_KEY: &str = "fork";
pub const UPSTREAM_PROVIDER_KEY: &str = "upstream_provider";

/// Per-provider settings, string keys to arbitrary values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSettings {
    inner: BTreeMap<String, Value>,
}

impl ProviderSettings {
    pub fn new() -> ProviderSettings {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// String value of a key, `None` when missing or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.insert(key.into(), value.into())
    }

    /// Removing a key that was never set is a no-op
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.inner.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }

    /// Layer `other` on top of these settings
    ///
    /// Nested objects are merged key by key; everything else is replaced.
    pub fn merge(&mut self, other: ProviderSettings) {
        for (key, value) in other.inner {
            match self.inner.get_mut(&key) {
                Some(existing) => merge_value(existing, value),
                None => {
                    self.inner.insert(key, value);
                }
            }
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.get_str(URI_KEY)
    }

    pub fn ipc_path(&self) -> Option<&str> {
        self.get_str(IPC_PATH_KEY)
    }

    /// `{"fork": {ecosystem: {network: {"upstream_provider": upstream}}}}`
    pub fn fork(ecosystem: &str, network: &str, upstream_provider: &str) -> ProviderSettings {
        let mut network_settings = Map::new();
        network_settings.insert(
            UPSTREAM_PROVIDER_KEY.to_string(),
            Value::String(upstream_provider.to_string()),
        );
        let mut ecosystem_settings = Map::new();
        ecosystem_settings.insert(network.to_string(), Value::Object(network_settings));
        let mut fork = Map::new();
        fork.insert(ecosystem.to_string(), Value::Object(ecosystem_settings));

        let mut settings = ProviderSettings::new();
        settings.insert(FORK_KEY, Value::Object(fork));
        settings
    }

    /// The fork block for one upstream network, if present
    pub fn fork_settings(&self, ecosystem: &str, network: &str) -> Option<&Value> {
        self.get(FORK_KEY)?.get(ecosystem)?.get(network)
    }

    pub fn upstream_provider(&self, ecosystem: &str, network: &str) -> Option<&str> {
        self.fork_settings(ecosystem, network)?
            .get(UPSTREAM_PROVIDER_KEY)?
            .as_str()
    }
}

fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (existing, incoming) => *existing = incoming,
    }
}

impl From<BTreeMap<String, Value>> for ProviderSettings {
    fn from(inner: BTreeMap<String, Value>) -> Self {
        ProviderSettings { inner }
    }
}
