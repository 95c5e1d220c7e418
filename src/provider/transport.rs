use crate::error::{NetworkError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> RpcRequest<'a> {
        RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn into_result(self) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(NetworkError::Provider(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// How a node provider reaches its node
pub enum Transport {
    Http(HttpTransport),
    #[cfg(unix)]
    Ipc(IpcTransport),
}

impl Transport {
    pub fn send(&mut self, request: &RpcRequest<'_>) -> Result<Value> {
        debug!("-> {} (id {})", request.method, request.id);
        let response = match self {
            Transport::Http(http) => http.send(request)?,
            #[cfg(unix)]
            Transport::Ipc(ipc) => ipc.send(request)?,
        };
        response.into_result()
    }
}

/// JSON-RPC over HTTP(S); the client connects lazily on the first request
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(url: Url, timeout: Duration) -> Result<HttpTransport> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpTransport { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn send(&self, request: &RpcRequest<'_>) -> Result<RpcResponse> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()?
            .error_for_status()?;
        Ok(response.json::<RpcResponse>()?)
    }
}

/// Newline-delimited JSON-RPC over a Unix domain socket
///
/// Replies are matched to requests by `id`; anything else on the socket,
/// such as the late answer to a request that timed out, is skipped.
#[cfg(unix)]
pub struct IpcTransport {
    path: PathBuf,
    stream: UnixStream,
    reader: BufReader<UnixStream>,
    // Partial line left over from a read that timed out
    pending: String,
}

#[cfg(unix)]
impl IpcTransport {
    pub fn connect(path: &Path, timeout: Duration) -> Result<IpcTransport> {
        let stream = UnixStream::connect(path).map_err(|e| {
            NetworkError::Network(format!("Failed to connect to {}: {e}", path.display()))
        })?;
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| NetworkError::Network(format!("Failed to set read timeout: {e}")))?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(|e| NetworkError::Network(format!("Failed to set write timeout: {e}")))?;
        let reader = stream
            .try_clone()
            .map_err(|e| NetworkError::Network(format!("Failed to clone socket: {e}")))?;
        Ok(IpcTransport {
            path: path.to_path_buf(),
            stream,
            reader: BufReader::new(reader),
            pending: String::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&mut self, request: &RpcRequest<'_>) -> Result<RpcResponse> {
        serde_json::to_writer(&self.stream, request).map_err(ipc_error)?;
        self.stream
            .write_all(b"\n")
            .and_then(|()| self.stream.flush())
            .map_err(|e| NetworkError::Network(format!("Failed to send request: {e}")))?;

        let expected = Value::from(request.id);
        loop {
            let response = self.read_response()?;
            if response.id == expected {
                return Ok(response);
            }
            debug!(
                "Skipping reply with id {} while waiting for {expected}",
                response.id
            );
        }
    }

    fn read_response(&mut self) -> Result<RpcResponse> {
        loop {
            let read = self.reader.read_line(&mut self.pending).map_err(|e| {
                NetworkError::Network(format!(
                    "Failed to read from {}: {e}",
                    self.path.display()
                ))
            })?;
            if read == 0 {
                return Err(NetworkError::Network(format!(
                    "{} closed the connection",
                    self.path.display()
                )));
            }
            let line = std::mem::take(&mut self.pending);
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line).map_err(ipc_error);
        }
    }

    pub fn shutdown(&self) -> Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both)?;
        Ok(())
    }
}

/// Socket failures surface as network errors, malformed replies as
/// serialization errors
#[cfg(unix)]
fn ipc_error(err: serde_json::Error) -> NetworkError {
    if err.is_io() {
        NetworkError::Network(err.to_string())
    } else {
        NetworkError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope() {
        let request = RpcRequest::new(7, "eth_chainId", json!([]));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": []})
        );
    }

    #[test]
    fn test_response_result() {
        let response: RpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": "0x1"})).unwrap();
        assert_eq!(response.into_result().unwrap(), json!("0x1"));
    }

    #[test]
    fn test_response_error() {
        let response: RpcResponse = serde_json::from_value(
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "method not found"}}),
        )
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, NetworkError::Provider(msg) if msg.contains("-32601")));
    }

    #[cfg(unix)]
    #[test]
    fn test_ipc_round_trip() {
        use crate::testnet::spawn_ipc_node;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.ipc");
        let _node = spawn_ipc_node(&path, 1337);

        let mut transport = IpcTransport::connect(&path, Duration::from_secs(5)).unwrap();
        let result = Transport::Ipc(IpcTransport::connect(&path, Duration::from_secs(5)).unwrap())
            .send(&RpcRequest::new(1, "eth_chainId", json!([])))
            .unwrap();
        assert_eq!(result, json!("0x539"));

        let response = transport
            .send(&RpcRequest::new(2, "eth_chainId", json!([])))
            .unwrap();
        assert_eq!(response.into_result().unwrap(), json!("0x539"));
        transport.shutdown().unwrap();
    }

    /// Node that answers `answer-for-<method>`, holding the first reply back
    /// for `delay`
    #[cfg(unix)]
    fn spawn_slow_ipc_node(path: &Path, delay: Duration) {
        use std::os::unix::net::UnixListener;

        let listener = UnixListener::bind(path).unwrap();
        std::thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let reader = BufReader::new(&stream);
            for (index, line) in reader.lines().enumerate() {
                let Ok(line) = line else { break };
                let request: Value = serde_json::from_str(&line).unwrap();
                if index == 0 {
                    std::thread::sleep(delay);
                }
                let method = request["method"].as_str().unwrap_or_default();
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "result": format!("answer-for-{method}"),
                });
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

    #[cfg(unix)]
    #[test]
    fn test_ipc_late_reply_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.ipc");
        spawn_slow_ipc_node(&path, Duration::from_millis(400));

        let mut transport = Transport::Ipc(
            IpcTransport::connect(&path, Duration::from_millis(200)).unwrap(),
        );
        let first = transport.send(&RpcRequest::new(1, "eth_chainId", json!([])));
        assert!(matches!(first, Err(NetworkError::Network(_))), "{first:?}");

        // Let the late reply to id 1 land on the socket
        std::thread::sleep(Duration::from_millis(600));
        let second = transport
            .send(&RpcRequest::new(2, "eth_blockNumber", json!([])))
            .unwrap();
        assert_eq!(second, json!("answer-for-eth_blockNumber"));
    }

    #[cfg(unix)]
    #[test]
    fn test_ipc_error_classes() {
        let io = serde_json::Error::io(std::io::Error::from(std::io::ErrorKind::WouldBlock));
        assert!(matches!(ipc_error(io), NetworkError::Network(_)));
        let syntax = serde_json::from_str::<Value>("{").unwrap_err();
        assert!(matches!(ipc_error(syntax), NetworkError::Serialization(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_ipc_connect_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let result = IpcTransport::connect(&dir.path().join("nope.ipc"), Duration::from_secs(1));
        assert!(matches!(result, Err(NetworkError::Network(_))));
    }
}
