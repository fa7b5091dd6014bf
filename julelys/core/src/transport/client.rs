//! Control Socket Client
//!
//! One request per connection: connect, write the request, half-close, read
//! the response until EOF.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use super::TransportError;
use crate::protocol::Request;

/// Client for the control socket
#[derive(Clone, Debug)]
pub struct ControlClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl ControlClient {
    /// Client for the socket at `socket_path` with a 10 second call timeout
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the socket path
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send `request` and return the raw JSON response
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is unreachable, the call times out,
    /// or the response is not JSON.
    pub async fn send(&self, request: &Request) -> Result<serde_json::Value, TransportError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;

        let bytes = tokio::time::timeout(self.timeout, self.round_trip(&payload))
            .await
            .map_err(|_| TransportError::Timeout)??;
        debug!(cmd = ?request.cmd, response_len = bytes.len(), "Control call finished");

        serde_json::from_slice(&bytes).map_err(|e| TransportError::SerializationError(e.to_string()))
    }

    /// Send `request` and decode the response as `T`
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus a serialization error if the response
    /// does not have the shape of `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: &Request) -> Result<T, TransportError> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| TransportError::SerializationError(e.to_string()))
    }

    async fn round_trip(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            TransportError::ConnectionFailed(format!("{}: {e}", self.socket_path.display()))
        })?;
        stream.write_all(payload).await?;
        stream.shutdown().await?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok(response)
    }
}
