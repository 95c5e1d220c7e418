use crate::error::{NetworkError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

pub const PID_SCHEME: &str = "pid://";
const SEGMENT_SEPARATOR: char = ':';

/// Where a provider talks to its node
///
/// The original text is kept so a URL survives a display/parse round trip
/// byte for byte (the `url` crate normalizes, e.g. adds a trailing slash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum Endpoint {
    Http(String),
    Ipc(PathBuf),
}

impl Endpoint {
    /// Parse an HTTP(S) URL or an IPC path
    pub fn parse(text: &str) -> Result<Endpoint> {
        if is_http_url(text) {
            let url = Url::parse(text)?;
            if url.host_str().is_none() {
                return Err(NetworkError::InvalidChoice(format!(
                    "URL '{text}' has no host"
                )));
            }
            return Ok(Endpoint::Http(text.to_string()));
        }
        if is_ipc_path(text) {
            return Ok(Endpoint::Ipc(PathBuf::from(text)));
        }
        Err(NetworkError::InvalidChoice(format!(
            "'{text}' is neither an HTTP(S) URL nor an IPC path"
        )))
    }

    /// Parsed URL for HTTP endpoints
    pub fn url(&self) -> Option<Url> {
        match self {
            Endpoint::Http(text) => Url::parse(text).ok(),
            Endpoint::Ipc(_) => None,
        }
    }

    pub fn ipc_path(&self) -> Option<&Path> {
        match self {
            Endpoint::Http(_) => None,
            Endpoint::Ipc(path) => Some(path),
        }
    }

    /// Same node: URLs compare without case or a trailing slash
    pub fn matches(&self, other: &Endpoint) -> bool {
        match (self, other) {
            (Endpoint::Http(a), Endpoint::Http(b)) => same_uri(a, b),
            (Endpoint::Ipc(a), Endpoint::Ipc(b)) => a == b,
            _ => false,
        }
    }

    /// Provider-settings key this endpoint is stored under
    pub fn settings_key(&self) -> &'static str {
        match self {
            Endpoint::Http(_) => "uri",
            Endpoint::Ipc(_) => "ipc_path",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Http(text) => write!(f, "{text}"),
            Endpoint::Ipc(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Whether a string should be read as an endpoint instead of a name
pub fn looks_like_endpoint(text: &str) -> bool {
    is_http_url(text) || is_ipc_path(text)
}

pub(crate) fn same_uri(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}

fn is_http_url(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_ipc_path(text: &str) -> bool {
    text.starts_with('/') || (text.ends_with(".ipc") && !text.contains(SEGMENT_SEPARATOR))
}

/// The provider segment of a choice string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderChoice {
    Named(String),
    Endpoint(Endpoint),
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderChoice::Named(name) => write!(f, "{name}"),
            ProviderChoice::Endpoint(endpoint) => write!(f, "{endpoint}"),
        }
    }
}

/// A parsed network choice string
///
/// Forms: `ecosystem:network:provider`, `ecosystem:network`, `alias`,
/// a bare endpoint, or `pid://<pid>`. `None` segments fall back to the
/// configured defaults when resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkChoice {
    Pid(u32),
    Segments {
        ecosystem: Option<String>,
        network: Option<String>,
        provider: Option<ProviderChoice>,
    },
}

impl NetworkChoice {
    pub fn new(ecosystem: &str, network: &str, provider: &str) -> NetworkChoice {
        NetworkChoice::Segments {
            ecosystem: non_empty(ecosystem),
            network: non_empty(network),
            provider: non_empty(provider).map(ProviderChoice::Named),
        }
    }

    /// Endpoint carried directly in the choice, if any
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            NetworkChoice::Segments {
                provider: Some(ProviderChoice::Endpoint(endpoint)),
                ..
            } => Some(endpoint),
            _ => None,
        }
    }
}

fn non_empty(segment: &str) -> Option<String> {
    let segment = segment.trim();
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

impl FromStr for NetworkChoice {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(pid) = s.strip_prefix(PID_SCHEME) {
            let pid = pid.parse::<u32>().map_err(|e| {
                NetworkError::InvalidChoice(format!("Invalid PID '{pid}' in '{s}': {e}"))
            })?;
            return Ok(NetworkChoice::Pid(pid));
        }

        // Up to two name segments, then whatever is left is the provider.
        // An endpoint may start at any position and can itself contain ':'.
        let mut names: Vec<Option<String>> = Vec::with_capacity(2);
        let mut rest = s;
        while names.len() < 2 && !rest.is_empty() && !looks_like_endpoint(rest) {
            match rest.split_once(SEGMENT_SEPARATOR) {
                Some((head, tail)) => {
                    names.push(non_empty(head));
                    rest = tail;
                }
                None => {
                    names.push(non_empty(rest));
                    rest = "";
                }
            }
        }

        let provider = if rest.trim().is_empty() {
            None
        } else if looks_like_endpoint(rest) {
            Some(ProviderChoice::Endpoint(Endpoint::parse(rest)?))
        } else if rest.contains(SEGMENT_SEPARATOR) {
            return Err(NetworkError::InvalidChoice(format!(
                "Too many segments in '{s}'"
            )));
        } else {
            Some(ProviderChoice::Named(rest.trim().to_string()))
        };

        let mut names = names.into_iter();
        Ok(NetworkChoice::Segments {
            ecosystem: names.next().flatten(),
            network: names.next().flatten(),
            provider,
        })
    }
}

impl fmt::Display for NetworkChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkChoice::Pid(pid) => write!(f, "{PID_SCHEME}{pid}"),
            NetworkChoice::Segments {
                ecosystem,
                network,
                provider,
            } => {
                let ecosystem = ecosystem.as_deref().unwrap_or_default();
                let network = network.as_deref().unwrap_or_default();
                match provider {
                    Some(provider) => write!(f, "{ecosystem}:{network}:{provider}"),
                    None => write!(f, "{ecosystem}:{network}"),
                }
            }
        }
    }
}
