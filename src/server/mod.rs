//! HTTP surface for the poll contract
//!
//! A thin axum router over [`AvailabilityService`]; it adds no behavior of
//! its own beyond parsing the source and date.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::service::AvailabilityService;

pub use api::{create_router, AvailabilityQuery, ErrorResponse};

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AvailabilityService>,

    /// Server start time
    pub start_time: Instant,
}

// ============================================================================
// Server
// ============================================================================

pub struct CampwatchServer {
    config: ServerConfig,
    bind_address: SocketAddr,
    state: AppState,
}

impl CampwatchServer {
    pub fn new(service: Arc<AvailabilityService>, config: ServerConfig, bind_address: SocketAddr) -> Self {
        Self {
            config,
            bind_address,
            state: AppState {
                service,
                start_time: Instant::now(),
            },
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Build the router with all routes and the configured layers
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        tracing::info!(address = %self.bind_address, "campwatch server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        self.state.service.shutdown();
        tracing::info!("campwatch server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum ServerError {
    #[error("Failed to bind: {0}")]
    Bind(String),

    #[error("Server error: {0}")]
    Serve(String),
}
