//! Property API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ error handler ─▶ CORS ─▶ security headers
//!                                                             │
//!            ┌────────────────────────────────────────────────┘
//!            ▼
//!       rate limit ─▶ cookies ─▶ body limit ─▶ session ─▶ request log
//!                                                             │
//!            ┌────────────────────────────────────────────────┘
//!            ▼
//!       fixed endpoints ──or── token ─▶ remember ─▶ user ─▶ /api/* routers
//!                                                             │
//!                                                     not found fallback
//!
//!     Cross-cutting: config, observability, lifecycle (signals, sweeper)
//! ```

use std::path::PathBuf;

use clap::Parser;

use property_api::config::load_config;
use property_api::lifecycle::startup;

#[derive(Parser)]
#[command(name = "property-api", version, about = "Property listings HTTP API")]
struct Cli {
    /// Path to a TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "PROPERTY_API_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    startup::run(config).await?;
    Ok(())
}
