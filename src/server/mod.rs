//! HTTP/WebSocket façade over the lock store.
//!
//! A thin collaborator: every route delegates to [`LockStore`] and the
//! store's conflict rule stays the single source of truth. Mutating
//! routes broadcast a [`LockEvent`] so WebSocket subscribers can refresh
//! without polling.
//!
//! All handlers receive an explicit [`ServerContext`] through axum state;
//! there is no process-global store handle.

mod handlers;

use crate::error::{Result, ViseError};
use crate::locks::LockStore;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Change notifications fanned out to WebSocket subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LockEvent {
    LockCreated { file_path: String, user_name: String },
    LockRemoved { file_path: String },
    LocksCleaned { removed_count: usize },
}

/// Shared state handed to every handler.
pub struct ServerContext {
    store: LockStore,
    events: broadcast::Sender<LockEvent>,
}

impl ServerContext {
    pub fn new(store: LockStore) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self { store, events })
    }

    pub fn store(&self) -> &LockStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.events.subscribe()
    }

    /// Publish an event. Nobody listening is fine.
    fn publish(&self, event: LockEvent) {
        let _ = self.events.send(event);
    }
}

/// The full route table.
pub fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/locks",
            get(handlers::list_locks).post(handlers::create_lock),
        )
        .route(
            "/locks/{*path}",
            get(handlers::get_lock).delete(handlers::delete_lock),
        )
        .route("/cleanup", post(handlers::cleanup))
        .route("/stats", get(handlers::stats))
        .route("/ws", get(handlers::ws_upgrade))
        .with_state(ctx)
}

/// Bind and serve until the process is terminated.
pub async fn serve(ctx: Arc<ServerContext>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ViseError::Io(format!("cannot bind {}: {}", addr, e)))?;

    log::info!("serving on http://{}", addr);

    axum::serve(listener, router(ctx))
        .await
        .map_err(|e| ViseError::Io(format!("server error: {}", e)))
}
