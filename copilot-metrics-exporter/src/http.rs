//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::collector::SharedCollector;
use crate::exposition;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
    metrics_path: String,
}

/// Create the HTTP router.
fn create_router(collector: SharedCollector, metrics_path: &str) -> Router {
    let state = AppState {
        collector,
        metrics_path: metrics_path.to_string(),
    };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/", get(index_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.collector.collect().await;

    match exposition::encode(state.collector.describe(), snapshot) {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, exposition::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    if state.collector.is_ready() {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no metrics snapshot yet\n",
        )
            .into_response()
    }
}

/// Handler for the landing page.
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>GitHub Copilot Metrics Exporter</title></head>\n\
         <body>\n\
         <h1>GitHub Copilot Metrics Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        path = state.metrics_path
    ))
}

/// Bind the metrics listener.
pub async fn bind(listen_addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(listen_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", listen_addr, e))
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: SharedCollector,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(collector: SharedCollector, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = bind(self.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let router = create_router(self.collector, &self.metrics_path);
        let addr = listener.local_addr()?;

        info!(addr = %addr, path = %self.metrics_path, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
