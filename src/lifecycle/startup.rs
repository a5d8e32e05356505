//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve settings and initialize logging and metrics
//! - Build the database and shared state
//! - Bind the listener last, so traffic only arrives when ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ApiConfig, Settings};
use crate::db::MemoryDatabase;
use crate::http::{ApiServer, AppState, PipelineError};
use crate::lifecycle::{spawn_signal_listener, Shutdown};
use crate::observability::{init_logging, init_metrics};
use crate::security::cors::PatternError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid CORS allow-list: {0}")]
    Cors(#[from] PatternError),

    #[error("invalid pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The database the binary runs against.
///
/// Outside production the demo account and listings are seeded.
pub fn database_for(settings: &Settings) -> MemoryDatabase {
    if settings.is_production() {
        MemoryDatabase::new()
    } else {
        MemoryDatabase::with_demo_data()
    }
}

/// Start everything and serve until a termination signal arrives.
pub async fn run(config: ApiConfig) -> Result<(), StartupError> {
    let settings = Settings::from_config(&config);
    init_logging(&settings)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %settings.mode,
        bind_address = %settings.bind_address,
        rate_limit_max = settings.rate_limit_max,
        rate_limit_window_ms = settings.rate_limit_window.as_millis() as u64,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let database = database_for(&settings);
    let bind_address = settings.bind_address.clone();
    let state = AppState::in_memory(settings, database)?;
    let server = ApiServer::new(state)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = spawn_signal_listener(shutdown.clone());
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
