//! TCP server implementation.

use crate::error::ServerError;
use crate::handler::SyscallHandler;
use crate::session::{Session, SessionState};
use remcall_protocol::call::Call;
use remcall_protocol::wire::{FrameReader, FrameWriter};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", remcall_protocol::DEFAULT_PORT)
                .parse()
                .unwrap(),
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub calls_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for remcall.
///
/// Owns the listening socket from bind time, so teardown is an explicit,
/// testable path: [`Server::shutdown`] stops the accept loop and is
/// broadcast to every live connection task rather than abandoning them.
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Binds the listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            config,
            listener,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        })
    }

    /// Returns the bound address (useful when binding to port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until shutdown.
    ///
    /// Every accepted connection gets its own task with its own session
    /// and file table; a connection fault never affects the listener or
    /// sibling connections.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", self.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let stats = self.stats.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    stats.clone(),
                                    &mut conn_shutdown,
                                )
                                .await;

                                match result {
                                    Ok(()) => tracing::info!("Client disconnected: {}", addr),
                                    Err(e) => {
                                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                        tracing::warn!("Connection {} failed: {}", addr, e);
                                    }
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Runs one connection's dispatch loop.
    ///
    /// `Ok(())` means the peer closed cleanly at a call boundary; any
    /// error is a faulted termination of this connection only.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        stats: Arc<ServerStats>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        let mut reader = FrameReader::new(BufReader::new(read_half));
        let mut writer = FrameWriter::new(BufWriter::new(write_half));

        let mut session = Session::new(addr);
        tracing::info!(session = %session.id, "Client connected: {}", addr);

        loop {
            session.set_state(SessionState::AwaitingCall);

            let next = tokio::select! {
                result = Call::read_from(&mut reader) => result,
                _ = shutdown.recv() => {
                    tracing::debug!(session = %session.id, "Shutdown signal received");
                    session.set_state(SessionState::Failed);
                    return Err(ServerError::ShuttingDown);
                }
            };

            match next {
                Ok(None) => {
                    session.set_state(SessionState::Closed);
                    tracing::debug!(
                        session = %session.id,
                        calls = session.calls_handled(),
                        "Connection closed by client"
                    );
                    return Ok(());
                }
                Ok(Some(call)) => {
                    session.set_state(SessionState::Dispatching);
                    session.record_call();
                    stats.calls_total.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(session = %session.id, "Call: {}", call.code());

                    if let Err(e) = SyscallHandler::dispatch(call, &mut session, &mut writer).await
                    {
                        session.set_state(SessionState::Failed);
                        return Err(e);
                    }
                }
                Err(e) => {
                    session.set_state(SessionState::Failed);
                    return Err(ServerError::Protocol(e));
                }
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
