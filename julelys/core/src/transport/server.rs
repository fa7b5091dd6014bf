//! Control Socket Server
//!
//! Accepts connections on a Unix socket and spawns one short-lived handler
//! task per connection. A handler reads exactly one request, dispatches it,
//! writes the response and closes.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn, Instrument};

use super::{ConnectionId, TransportError};
use crate::config::JulelysConfig;
use crate::controller::Controller;
use crate::protocol::{
    dispatch, encode_response, ProtocolError, RequestDecoder, Response, DEFAULT_MAX_REQUEST_SIZE,
};

/// How long the accept loop waits before re-checking the shutdown flag
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Per-connection limits
#[derive(Clone, Debug)]
pub struct ServerSettings {
    /// Largest accepted request in bytes
    pub max_request_size: usize,
    /// Time allowed for the whole request to arrive
    pub read_timeout: Duration,
    /// Wall-clock limit for preview renders
    pub preview_timeout: Duration,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            read_timeout: Duration::from_secs(5),
            preview_timeout: Duration::from_secs(5),
            max_connections: 32,
        }
    }
}

impl From<&JulelysConfig> for ServerSettings {
    fn from(config: &JulelysConfig) -> Self {
        Self {
            max_request_size: config.max_request_size,
            preview_timeout: config.preview_timeout,
            ..Self::default()
        }
    }
}

/// Connection state tracking
struct ConnectionState {
    /// When the connection was established
    connected_at: Instant,
    /// Remote peer UID (from `SO_PEERCRED`)
    peer_uid: Option<u32>,
    /// Handle to abort the connection task
    abort_handle: tokio::task::AbortHandle,
}

/// Statistics for a single connection
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// Connection id
    pub conn_id: ConnectionId,
    /// Peer UID
    pub peer_uid: Option<u32>,
    /// Time since accept
    pub age: Duration,
}

/// Serves the control channel
pub struct ControlServer {
    socket_path: PathBuf,
    controller: Arc<Controller>,
    settings: ServerSettings,
    listener: Option<UnixListener>,
    connections: Arc<DashMap<ConnectionId, ConnectionState>>,
}

impl ControlServer {
    /// Create a server for `controller` at `socket_path`
    pub fn new(socket_path: impl Into<PathBuf>, controller: Arc<Controller>, settings: ServerSettings) -> Self {
        Self {
            socket_path: socket_path.into(),
            controller,
            settings,
            listener: None,
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Get the socket path
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether [`listen`](Self::listen) has bound the socket
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Get number of active connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Per-connection statistics
    #[must_use]
    pub fn connection_stats(&self) -> Vec<ConnectionStats> {
        self.connections
            .iter()
            .map(|entry| ConnectionStats {
                conn_id: entry.key().clone(),
                peer_uid: entry.value().peer_uid,
                age: entry.value().connected_at.elapsed(),
            })
            .collect()
    }

    /// Prepare the socket path (create directory, remove stale socket)
    fn prepare_socket(&self) -> Result<(), TransportError> {
        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    TransportError::IoError(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create socket directory {parent:?}: {e}"),
                    ))
                })?;
                info!(path = ?parent, "Created socket directory");
            }
        }

        if self.socket_path.exists() {
            warn!(path = ?self.socket_path, "Removing stale socket file");
            fs::remove_file(&self.socket_path).map_err(|e| {
                TransportError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to remove stale socket {:?}: {e}", self.socket_path),
                ))
            })?;
        }
        Ok(())
    }

    /// Bind the socket with owner-only permissions
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be prepared or bound.
    pub async fn listen(&mut self) -> Result<(), TransportError> {
        self.prepare_socket()?;
        let listener = UnixListener::bind(&self.socket_path)?;
        tokio::fs::set_permissions(&self.socket_path, fs::Permissions::from_mode(0o600)).await?;
        self.listener = Some(listener);
        info!(path = ?self.socket_path, "Listening for control connections");
        Ok(())
    }

    /// Get peer credentials from Unix socket
    #[cfg(target_os = "linux")]
    fn peer_uid(stream: &UnixStream) -> Option<u32> {
        use std::os::unix::io::AsRawFd;

        let fd = stream.as_raw_fd();
        let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
        let result = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                &mut cred as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        (result == 0).then_some(cred.uid)
    }

    /// Peer credentials are unavailable off Linux
    #[cfg(not(target_os = "linux"))]
    fn peer_uid(_stream: &UnixStream) -> Option<u32> {
        None
    }

    /// Accept connections until `shutdown` is raised
    ///
    /// Binds the socket first if [`listen`](Self::listen) has not been
    /// called. On return the socket file is removed and every open
    /// connection aborted.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or removed.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<(), TransportError> {
        if self.listener.is_none() {
            self.listen().await?;
        }

        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested, stopping accept loop");
                break;
            }

            let listener = self
                .listener
                .as_ref()
                .ok_or_else(|| TransportError::InvalidState("Not listening".to_string()))?;

            // Accept with timeout to allow checking shutdown flag
            let stream = match tokio::time::timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, _addr))) => stream,
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                    continue;
                }
                Err(_) => continue,
            };

            if let Err(e) = self.accept(stream) {
                warn!(error = %e, "Connection rejected");
            }
        }

        self.shutdown().await
    }

    /// Register `stream` and spawn its handler
    fn accept(&self, stream: UnixStream) -> Result<(), TransportError> {
        if self.connections.len() >= self.settings.max_connections {
            return Err(TransportError::InvalidState(format!(
                "connection limit of {} reached",
                self.settings.max_connections
            )));
        }

        let peer_uid = Self::peer_uid(&stream);

        let conn_id = ConnectionId::new();
        debug!(
            conn_id = %conn_id,
            peer_uid = ?peer_uid,
            active_connections = self.connections.len() + 1,
            "New connection accepted"
        );

        // The handler waits until its entry is registered, so its own
        // removal can never run first.
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let connections = Arc::clone(&self.connections);
        let controller = Arc::clone(&self.controller);
        let settings = self.settings.clone();
        let id = conn_id.clone();
        let task = tokio::spawn(
            async move {
                if registered_rx.await.is_err() {
                    return;
                }
                if let Err(e) = handle_connection(stream, &controller, &settings).await {
                    debug!(error = %e, "Connection ended with error");
                }
                connections.remove(&id);
                debug!("Connection closed");
            }
            .instrument(tracing::info_span!("connection", %conn_id)),
        );

        self.connections.insert(
            conn_id,
            ConnectionState {
                connected_at: Instant::now(),
                peer_uid,
                abort_handle: task.abort_handle(),
            },
        );
        let _ = registered_tx.send(());
        Ok(())
    }

    /// Abort open connections and remove the socket file
    ///
    /// # Errors
    ///
    /// Returns an error if the socket file cannot be removed.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        let conn_ids: Vec<ConnectionId> =
            self.connections.iter().map(|entry| entry.key().clone()).collect();
        for conn_id in conn_ids {
            if let Some((_, state)) = self.connections.remove(&conn_id) {
                debug!(conn_id = %conn_id, "Aborting connection");
                state.abort_handle.abort();
            }
        }

        self.listener = None;
        match tokio::fs::remove_file(&self.socket_path).await {
            Ok(()) => info!(path = ?self.socket_path, "Socket file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Read one request, answer it, close
async fn handle_connection(
    mut stream: UnixStream,
    controller: &Arc<Controller>,
    settings: &ServerSettings,
) -> Result<(), TransportError> {
    let decoded = tokio::time::timeout(settings.read_timeout, read_request(&mut stream, settings))
        .await
        .map_err(|_| TransportError::Timeout)??;

    let response = match decoded {
        Ok(request) => dispatch(controller, request, settings.preview_timeout).await,
        Err(ProtocolError::Empty) => {
            debug!("Peer closed without sending a request");
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "Malformed request");
            Response::invalid_request(&e)
        }
    };

    let bytes =
        encode_response(&response).map_err(|e| TransportError::SerializationError(e.to_string()))?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read until one complete request or EOF
///
/// The outer result is the transport; the inner one is the request itself.
async fn read_request(
    stream: &mut UnixStream,
    settings: &ServerSettings,
) -> Result<Result<crate::protocol::Request, ProtocolError>, TransportError> {
    let mut decoder = RequestDecoder::new(settings.max_request_size);
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(decoder.finish());
        }
        if let Err(e) = decoder.push(&buf[..n]) {
            return Ok(Err(e));
        }
        match decoder.decode() {
            Ok(Some(request)) => return Ok(Ok(request)),
            Ok(None) => continue,
            Err(e) => return Ok(Err(e)),
        }
    }
}
