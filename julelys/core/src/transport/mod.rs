//! Control Channel Transport
//!
//! Local IPC over a Unix domain socket, one connection per command:
//!
//! ```text
//! ┌─────────────────┐                      ┌─────────────────┐
//! │  ControlClient  │  connect             │  ControlServer  │
//! │                 ├─────────────────────►│                 │
//! │  Request JSON ─►│                      │─► dispatch()    │
//! │  ◄─ Response    │◄─────────────────────┤   close         │
//! └─────────────────┘  read until closed   └─────────────────┘
//! ```
//!
//! # Security
//!
//! - Socket files are created with 0600 permissions
//! - Request size is capped before parsing
//!
//! There is no authentication beyond file permissions; on Linux the peer
//! UID is read with `SO_PEERCRED` for the connection log only.

mod client;
mod server;

pub use client::ControlClient;
pub use server::{ConnectionStats, ControlServer, ServerSettings};

use std::fmt;
use std::path::PathBuf;

/// Default control socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/julelys.sock";

/// Default socket location
#[must_use]
pub fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

/// Unique identifier for one control connection
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Generate a new connection ID from a random 128-bit value
    #[must_use]
    pub fn new() -> Self {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self(format!("conn_{}", hex::encode(bytes)))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during transport operations
#[derive(Debug)]
pub enum TransportError {
    /// Connection to peer failed
    ConnectionFailed(String),
    /// Peer did not send or answer in time
    Timeout,
    /// Response serialization/deserialization error
    SerializationError(String),
    /// IO error from underlying transport
    IoError(std::io::Error),
    /// Transport not in expected state
    InvalidState(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => write!(f, "Connection failed: {msg}"),
            Self::Timeout => write!(f, "Timed out"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}
