//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Build the validated pipeline for the shared state
//! - Bind to a listener with peer-address connect info
//! - Run the background sweeper next to the server
//! - Stop accepting on shutdown, drain, then close the database

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::http::pipeline::{build_router, PipelineError, PipelinePlan};
use crate::http::AppState;
use crate::lifecycle::{Shutdown, Sweeper};

/// HTTP server for the API.
pub struct ApiServer {
    router: Router,
    state: AppState,
}

impl ApiServer {
    /// Create a server with the standard pipeline for the state's settings.
    pub fn new(state: AppState) -> Result<Self, PipelineError> {
        let plan = PipelinePlan::standard(&state.settings);
        Self::with_plan(state, &plan)
    }

    pub fn with_plan(state: AppState, plan: &PipelinePlan) -> Result<Self, PipelineError> {
        let router = build_router(plan, state.clone())?;
        Ok(Self { router, state })
    }

    /// The assembled router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` fires, then drain in-flight requests, stop the
    /// background tasks and close the database.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = %self.state.settings.mode,
            "HTTP server starting"
        );

        let sweeper = Sweeper::new(
            self.state.sessions.store().clone(),
            self.state.rate_limiter.clone(),
            self.state.settings.session_sweep_interval,
        );
        let sweeper = tokio::spawn(sweeper.run(shutdown.subscribe()));

        let mut stop = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop.wait().await;
                tracing::info!("No longer accepting connections");
            })
            .await;

        // The server may also stop on its own (listener error).
        shutdown.trigger();
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Sweeper task ended abnormally");
        }

        self.state.database.close().await;
        tracing::info!("Database connection closed");

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
