use std::convert::Infallible;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use patchrss_core::{PatchConfig, PatchError, CACHE_CONTROL};
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{handle_root, handle_rss, health, AppState};

/// Routes plus middleware.
///
/// - `GET /`: redirect to the documentation page
/// - `GET /rss?url=`: the patched feed
/// - `GET /health`: health check
///
/// Only `/rss` carries the request timeout and the shared cache hint, so
/// the 408 a timeout produces is cacheable like every other feed answer.
pub fn router(state: AppState) -> Router {
    let rss = get(handle_rss)
        .layer::<_, Infallible>(TimeoutLayer::new(state.config.request_timeout()))
        .layer::<_, Infallible>(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL),
        ));

    Router::new()
        .route("/", get(handle_root))
        .route("/rss", rss)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The patchrss HTTP server.
pub struct PatchServer {
    state: AppState,
    addr: String,
}

impl PatchServer {
    pub fn new(config: &PatchConfig) -> Result<Self, PatchError> {
        Ok(Self {
            state: AppState::new(config)?,
            addr: config.server.bind_addr(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr().context("Listener has no local address")?;
        tracing::info!(
            "patchrss listening on {} (self host {})",
            local,
            self.state.config.self_host
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("patchrss stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
