use anyhow::{Context, Result};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::models::{Envelope, HistorySnapshot, ResultsSnapshot};
use crate::store::Store;

/// HTTP front for the store: JSON queries and a WebSocket push feed.
#[derive(Clone)]
pub struct ApiServer {
    store: Arc<Store>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    pub fn new(store: Arc<Store>, port: u16) -> Self {
        Self { store, port, static_dir: None }
    }

    /// Serves files from `dir` for any path not matched by the API.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/api/results", get(get_results))
            .route("/api/history", get(get_history))
            .route("/ws", get(ws_handler));
        let router = match &self.static_dir {
            Some(dir) => router.fallback_service(ServeDir::new(dir)),
            None => router,
        };
        router.with_state(Arc::clone(&self.store))
    }

    pub async fn serve(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind API port {}", self.port))?;
        self.serve_with_listener(listener).await
    }

    pub async fn serve_with_listener(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("Listener has no local address")?;
        info!("Dashboard: http://localhost:{}", addr.port());
        axum::serve(listener, self.router())
            .await
            .context("API server stopped")
    }
}

pub async fn get_results(State(store): State<Arc<Store>>) -> Json<ResultsSnapshot> {
    Json(store.get_results().await)
}

pub async fn get_history(State(store): State<Arc<Store>>) -> Json<HistorySnapshot> {
    Json(store.get_history().await)
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(store): State<Arc<Store>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, store))
}

async fn handle_socket(socket: WebSocket, store: Arc<Store>) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = store.subscribe().await;
    debug!(subscriber = ?subscription.id, "Live feed client connected");

    let initial = [
        Envelope::Results(Arc::new(store.get_results().await)),
        Envelope::History(Arc::new(store.get_history().await)),
    ];
    for envelope in &initial {
        if send_envelope(&mut sender, envelope).await.is_err() {
            store.remove_subscriber(subscription.id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(error = %e, "Live feed receive error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            pushed = subscription.receiver.recv() => match pushed {
                Some(envelope) => {
                    if send_envelope(&mut sender, &envelope).await.is_err() {
                        break;
                    }
                }
                // The store dropped this feed.
                None => break,
            },
        }
    }

    store.remove_subscriber(subscription.id).await;
    debug!(subscriber = ?subscription.id, "Live feed client disconnected");
}

async fn send_envelope<S>(sender: &mut S, envelope: &Envelope) -> Result<()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(envelope).context("Failed to serialize envelope")?;
    if let Err(e) = sender.send(Message::Text(json.into())).await {
        warn!(error = %e, kind = envelope.kind(), "Failed to push envelope");
        return Err(e.into());
    }
    Ok(())
}
