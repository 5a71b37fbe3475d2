use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    broadcast::Broadcaster, cli::RelayConfig, error::SessionError, registry::Registry,
    session::Session,
};

/// Path clients upgrade on.
pub const WS_PATH: &str = "/ws";

pub struct Relay {
    listener: TcpListener,
    state: RelayState,
}

#[derive(Clone)]
struct RelayState {
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    config: RelayConfig,
}

impl Relay {
    pub fn new(listener: TcpListener, config: RelayConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        Self {
            listener,
            state: RelayState {
                registry,
                broadcaster,
                config,
            },
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the membership, mainly for inspection.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.state.registry)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(WS_PATH, get(upgrade))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serves until `shutdown` resolves. Sessions that are already live are
    /// not drained.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("relay shutting down");
            })
            .await
            .context("relay listener failed")
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

// Origins are not checked; any page may connect.
async fn upgrade(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    let RelayState {
        registry,
        broadcaster,
        config,
    } = state;

    ws.max_message_size(config.max_message_size)
        .on_failed_upgrade(|error: axum::Error| {
            let err = SessionError::Upgrade(error);
            warn!(error = %err, "dropping connection");
        })
        .on_upgrade(move |socket| Session::accept(socket, registry, broadcaster))
}
