//! Relay server: HTTP listener, routes, and shared connection state

use crate::ws::handle_connection;
use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

pub struct RelayConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 9400,
        }
    }
}

/// One registered connection. Kept only for the client count and logs.
pub struct ClientInfo {
    pub addr: SocketAddr,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

/// Shared state for all relay connections.
pub struct RelayState {
    pub clients: DashMap<Uuid, ClientInfo>,
    /// Fan-out channel. Every connection subscribes; frames are relayed
    /// as the raw text they arrived as.
    pub broadcast_tx: broadcast::Sender<String>,
    pub started_at: std::time::Instant,
}

impl RelayState {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel::<String>(1024);
        Self {
            clients: DashMap::new(),
            broadcast_tx,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn client_count(&self) -> u32 {
        self.clients.len() as u32
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound-but-not-yet-serving relay. Binding first lets callers ask for
/// port 0 and read back the assigned address.
pub struct Relay {
    listener: tokio::net::TcpListener,
    state: Arc<RelayState>,
}

impl Relay {
    pub async fn bind(config: &RelayConfig) -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(RelayState::new()),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> Arc<RelayState> {
        self.state.clone()
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = self.listener.local_addr()?;

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
            .with_state(self.state);

        info!("GazeSync Relay v{} starting", env!("CARGO_PKG_VERSION"));
        info!("  Listening on: {}", addr);
        info!("  WebSocket: ws://{}/ws", addr);

        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, addr, state))
}

async fn health_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "clients": state.client_count(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    })
    .to_string()
}
