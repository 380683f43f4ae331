//! WebSocket Game Server
//!
//! Async WebSocket server for pong clients. The handshake path picks the
//! route: match play, matchmaking, or a record snapshot.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::{self, Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::network::config::ServerConfig;
use crate::network::groups::{ConnectionId, GroupRegistry};
use crate::network::matchmaking::Matchmaker;
use crate::network::protocol::{PaddleUpdate, ServerMessage};
use crate::network::route::Route;
use crate::network::session::{outbox, InputOutcome, SessionError, SessionManager};
use crate::store::{GameStateStore, InMemoryMatchRepository, MatchRepository};

/// Capacity of each connection's outbound queue.
const OUTBOX_CAPACITY: usize = 256;

/// How long a closing connection may spend flushing its queue.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Sent to every connection when the server stops.
pub const SHUTDOWN_MESSAGE: &str = "server shutting down";

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket handshake failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Match refused the connection.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Request path matched no route.
    #[error("Unknown route: {0}")]
    UnknownRoute(String),
}

/// Connected client bookkeeping.
#[derive(Debug, Clone)]
struct ConnectedClient {
    addr: SocketAddr,
    route: Route,
}

/// One event from a match connection's select loop.
#[derive(Debug)]
enum Inbound {
    /// Well-formed paddle update.
    Paddle(PaddleUpdate),
    /// Text frame that is not a paddle update.
    Malformed(serde_json::Error),
    /// Frame with nothing to act on (binary, ping, pong).
    Noise,
    /// Peer closed or the socket failed.
    Closed,
    /// Server is stopping.
    Shutdown,
}

impl Inbound {
    fn from_frame(frame: Option<Result<Message, tungstenite::Error>>) -> Self {
        match frame {
            Some(Ok(Message::Text(text))) => match PaddleUpdate::from_json(&text) {
                Ok(update) => Inbound::Paddle(update),
                Err(e) => Inbound::Malformed(e),
            },
            Some(Ok(Message::Close(_))) | None => Inbound::Closed,
            Some(Err(e)) => {
                debug!("WebSocket read failed: {}", e);
                Inbound::Closed
            }
            Some(Ok(_)) => Inbound::Noise,
        }
    }
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    store: Arc<GameStateStore>,
    sessions: Arc<SessionManager>,
    matchmaker: Arc<Matchmaker>,
    clients: Arc<RwLock<BTreeMap<ConnectionId, ConnectedClient>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server with an in-memory match repository.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_repository(config, Arc::new(InMemoryMatchRepository::new()))
    }

    /// Create a server over the given match repository.
    pub fn with_repository(config: ServerConfig, repository: Arc<dyn MatchRepository>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let store = Arc::new(GameStateStore::new());
        let sessions = Arc::new(SessionManager::new(
            config.session_config(),
            store.clone(),
            Arc::new(GroupRegistry::new()),
            repository.clone(),
        ));
        let matchmaker = Arc::new(Matchmaker::new(repository, config.waiting_timeout));

        Self {
            config,
            store,
            sessions,
            matchmaker,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let cleanup_handle = tokio::spawn(Self::run_cleanup_loop(
            self.store.clone(),
            self.sessions.clone(),
            self.matchmaker.clone(),
            self.config.clone(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.sessions.stop_all().await;
        cleanup_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let sessions = self.sessions.clone();
        let matchmaker = self.matchmaker.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let result =
                Self::serve_connection(stream, addr, clients, sessions, matchmaker, shutdown_rx).await;
            match result {
                Ok(()) => {}
                Err(GameServerError::WebSocket(e)) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                }
                Err(e) => warn!("Connection from {} refused: {}", addr, e),
            }
        });
    }

    /// Run one connection from handshake to close.
    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        clients: Arc<RwLock<BTreeMap<ConnectionId, ConnectedClient>>>,
        sessions: Arc<SessionManager>,
        matchmaker: Arc<Matchmaker>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let mut target = None;
        let capture_target = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            target = Some(request.uri().to_string());
            Ok(response)
        };

        let ws_stream = accept_hdr_async(stream, capture_target).await?;

        let route = Route::parse(target.as_deref().unwrap_or("/"));
        let connection_id = Uuid::new_v4();
        debug!(%connection_id, ?route, "Routed connection from {}", addr);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = outbox(OUTBOX_CAPACITY);

        clients.write().await.insert(connection_id, ConnectedClient {
            addr,
            route: route.clone(),
        });

        // Drain the outbox into the socket, then close it
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
            let _ = ws_sender.send(Message::Close(None)).await;
        });

        let outcome = match route {
            Route::Game(match_id) => match sessions.connect(match_id, connection_id, msg_tx.clone()).await {
                Ok(session) => {
                    loop {
                        let event = tokio::select! {
                            frame = ws_receiver.next() => Inbound::from_frame(frame),
                            _ = shutdown_rx.recv() => Inbound::Shutdown,
                        };

                        match event {
                            Inbound::Paddle(update) => {
                                if session.handle_input(update).await == InputOutcome::RateLimited {
                                    trace!(%connection_id, "Dropped rate-limited input");
                                }
                            }
                            Inbound::Malformed(e) => {
                                debug!(%connection_id, "Dropped malformed input: {}", e);
                            }
                            Inbound::Noise => {}
                            Inbound::Closed => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Inbound::Shutdown => {
                                let _ = msg_tx.send(ServerMessage::info(SHUTDOWN_MESSAGE)).await;
                                break;
                            }
                        }
                    }

                    session.disconnect().await;
                    Ok(())
                }
                Err(e) => {
                    let _ = msg_tx.send(ServerMessage::error(e.to_string())).await;
                    Err(GameServerError::Session(e))
                }
            },
            Route::Matchmaking => {
                let reply = match matchmaker.request_match().await {
                    Ok(ticket) => ServerMessage::Ticket(ticket),
                    Err(e) => {
                        error!("Matchmaking failed: {}", e);
                        ServerMessage::error(e.to_string())
                    }
                };
                let _ = msg_tx.send(reply).await;
                Ok(())
            }
            Route::Snapshot(match_id) => {
                let reply = match matchmaker.snapshot(match_id) {
                    Ok(snapshot) => ServerMessage::State(snapshot),
                    Err(e) => ServerMessage::error(e.to_string()),
                };
                let _ = msg_tx.send(reply).await;
                Ok(())
            }
            Route::Unknown(path) => {
                let error = GameServerError::UnknownRoute(path);
                let _ = msg_tx.send(ServerMessage::error(error.to_string())).await;
                Err(error)
            }
        };

        drop(msg_tx);
        Self::finish_connection(&clients, connection_id, sender_task).await;
        outcome
    }

    /// Flush the outbox, then forget the client.
    async fn finish_connection(
        clients: &RwLock<BTreeMap<ConnectionId, ConnectedClient>>,
        connection_id: ConnectionId,
        mut sender_task: tokio::task::JoinHandle<()>,
    ) {
        if tokio::time::timeout(FLUSH_TIMEOUT, &mut sender_task).await.is_err() {
            sender_task.abort();
        }

        if let Some(client) = clients.write().await.remove(&connection_id) {
            info!("Client {} cleaned up", client.addr);
        }
    }

    /// Periodically purge abandoned match states and stale matchmaking slots.
    async fn run_cleanup_loop(
        store: Arc<GameStateStore>,
        sessions: Arc<SessionManager>,
        matchmaker: Arc<Matchmaker>,
        config: ServerConfig,
    ) {
        let mut interval = interval(config.cleanup_interval);
        interval.tick().await;

        loop {
            interval.tick().await;
            let now = Instant::now();

            let active = sessions.active_matches().await;
            let purged = store.purge_idle(config.state_ttl, now, &active).await;
            if !purged.is_empty() {
                info!(count = purged.len(), "Purged idle match states");
            }

            if let Some(match_id) = matchmaker.expire_waiting(now).await {
                info!(match_id, "Expired waiting match");
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Number of connections currently on a match route.
    pub async fn player_connection_count(&self) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| matches!(c.route, Route::Game(_)))
            .count()
    }
}
