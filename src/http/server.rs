//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router serving the static site
//! - Wire up middleware (tracing, timeout, request ID, observation)
//! - Bind server to listener
//! - Stop accepting on the shutdown signal

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::middleware::{observe_response, ErrorReporter};
use crate::http::request::{propagate_request_id, set_request_id};
use crate::shipping::SequencedLogShipper;

/// Application state injected into middleware.
#[derive(Clone)]
pub struct AppState {
    /// `None` when shipping is disabled.
    pub reporter: Option<ErrorReporter>,
}

/// HTTP server for the web application.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig, shipper: Option<Arc<SequencedLogShipper>>) -> Self {
        let state = AppState {
            reporter: shipper.map(|s| ErrorReporter::new(s, &config.reporting)),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let root = Path::new(&config.static_files.root);
        let index = root.join(&config.static_files.index);

        Router::new()
            .route_service("/", ServeFile::new(index))
            .fallback_service(ServeDir::new(root))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id())
                    .layer(axum::middleware::from_fn_with_state(state, observe_response))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            static_root = %self.config.static_files.root,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
